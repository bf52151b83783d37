//! End-to-end lifecycle scenarios driven through the pure state machine,
//! with an in-memory turn list standing in for the turns table. Turn
//! numbering and typing here follow exactly what the transactional layer
//! does: next number is last + 1, next type comes from the previous turn.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use skate_backend::clock;
use skate_backend::engine::{
    apply_judgment, apply_respond, apply_submit, next_turn_type, resolve_expiry, JudgeOutcome,
};
use skate_backend::error::AppError;
use skate_backend::ladder::LADDER;
use skate_backend::model::{MatchModel, TurnModel};
use skate_backend::schema::{ForfeitReason, Judgment, MatchStatus, TurnType};

struct Battle {
    m: MatchModel,
    turns: Vec<TurnModel>,
    now: DateTime<Utc>,
}

impl Battle {
    fn new() -> Self {
        let now = Utc::now();
        let m = MatchModel {
            id: Uuid::new_v4(),
            challenger_id: Uuid::new_v4(),
            opponent_id: Uuid::new_v4(),
            status: MatchStatus::Pending,
            current_turn_holder: None,
            current_turn_deadline: None,
            challenger_letters: String::new(),
            opponent_letters: String::new(),
            winner_id: None,
            forfeit_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        Self {
            m,
            turns: Vec::new(),
            now,
        }
    }

    fn tick(&mut self) {
        self.now += Duration::minutes(5);
    }

    fn respond(&mut self, responder: Uuid, accept: bool) -> Result<(), AppError> {
        self.tick();
        resolve_expiry(&mut self.m, self.now);
        apply_respond(&mut self.m, responder, accept, self.now)
    }

    fn submit(&mut self, submitter: Uuid) -> Result<usize, AppError> {
        self.tick();
        resolve_expiry(&mut self.m, self.now);
        apply_submit(&mut self.m, submitter, self.now)?;
        let last = self.turns.last();
        let turn = TurnModel {
            id: Uuid::new_v4(),
            match_id: self.m.id,
            submitter_id: submitter,
            turn_number: last.map_or(0, |t| t.turn_number) + 1,
            turn_type: next_turn_type(last.map(|t| t.turn_type)),
            media_ref: "clip://trick".into(),
            thumbnail_ref: None,
            description: None,
            judgment: None,
            judged_at: None,
            judged_by: None,
            deadline: clock::compute_deadline(self.now),
            created_at: self.now,
        };
        self.turns.push(turn);
        Ok(self.turns.len() - 1)
    }

    fn judge(&mut self, idx: usize, judge: Uuid, judgment: Judgment) -> Result<JudgeOutcome, AppError> {
        self.tick();
        resolve_expiry(&mut self.m, self.now);
        apply_judgment(&mut self.m, &mut self.turns[idx], judge, judgment, self.now)
    }
}

// Scenario A
#[test]
fn declining_a_challenge_forfeits_it_to_the_challenger() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, false).unwrap();

    assert_eq!(b.m.status, MatchStatus::Forfeited);
    assert_eq!(b.m.winner_id, Some(a));
    assert_eq!(b.m.forfeit_reason, Some(ForfeitReason::Declined));
    assert!(b.m.completed_at.is_some());
}

// Scenario B
#[test]
fn a_full_set_match_cycle_without_misses_keeps_initiative() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();
    assert_eq!(b.m.current_turn_holder, Some(a));

    let set = b.submit(a).unwrap();
    assert_eq!(b.turns[set].turn_type, TurnType::Set);
    assert_eq!(b.m.current_turn_holder, Some(o));

    b.judge(set, o, Judgment::Made).unwrap();
    assert_eq!(b.m.current_turn_holder, Some(o));

    let attempt = b.submit(o).unwrap();
    assert_eq!(b.turns[attempt].turn_type, TurnType::Match);

    let out = b.judge(attempt, a, Judgment::Made).unwrap();
    assert_eq!(out, JudgeOutcome::Advanced { letter_added: false });

    // matching it kept the floor with the matcher
    assert_eq!(b.m.current_turn_holder, Some(o));
    assert_eq!(b.m.challenger_letters, "");
    assert_eq!(b.m.opponent_letters, "");
    assert_eq!(b.m.status, MatchStatus::Active);
}

// Scenario C
#[test]
fn missing_a_match_turn_costs_exactly_one_letter() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();
    let set = b.submit(a).unwrap();
    b.judge(set, o, Judgment::Made).unwrap();
    let attempt = b.submit(o).unwrap();

    let out = b.judge(attempt, a, Judgment::Missed).unwrap();
    assert_eq!(out, JudgeOutcome::Advanced { letter_added: true });
    assert_eq!(b.m.opponent_letters, "S");
    assert_eq!(b.m.challenger_letters, "");
    // the miss hands the floor back to the setter
    assert_eq!(b.m.current_turn_holder, Some(a));
}

// Scenario D
#[test]
fn five_misses_eliminate_and_complete_the_match() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();

    for round in 0..LADDER.len() {
        let set = b.submit(a).unwrap();
        b.judge(set, o, Judgment::Made).unwrap();
        let attempt = b.submit(o).unwrap();
        let out = b.judge(attempt, a, Judgment::Missed).unwrap();

        if round + 1 < LADDER.len() {
            assert_eq!(out, JudgeOutcome::Advanced { letter_added: true });
            assert_eq!(b.m.opponent_letters, LADDER[..round + 1]);
        } else {
            assert_eq!(out, JudgeOutcome::Eliminated);
        }
    }

    assert_eq!(b.m.status, MatchStatus::Completed);
    assert_eq!(b.m.opponent_letters, LADDER);
    assert_eq!(b.m.winner_id, Some(a));
    assert_eq!(b.m.current_turn_holder, None);
    assert_eq!(b.m.current_turn_deadline, None);

    // turn numbers are a gapless 1..N sequence
    let numbers: Vec<i32> = b.turns.iter().map(|t| t.turn_number).collect();
    assert_eq!(numbers, (1..=numbers.len() as i32).collect::<Vec<_>>());
}

// Scenario E
#[test]
fn an_overdue_match_is_forfeited_before_the_requested_action_runs() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();
    // a holds the first turn and never submits
    b.now = b.m.current_turn_deadline.unwrap() + Duration::minutes(1);

    // a's own late submission runs into the already-applied forfeiture
    let err = b.submit(a).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(b.m.status, MatchStatus::Forfeited);
    assert_eq!(b.m.winner_id, Some(o));
    assert_eq!(b.m.forfeit_reason, Some(ForfeitReason::Timeout));
}

#[test]
fn lazy_expiry_yields_the_same_state_on_repeated_access() {
    let mut b = Battle::new();
    let o = b.m.opponent_id;

    b.respond(o, true).unwrap();
    b.now = b.m.current_turn_deadline.unwrap() + Duration::minutes(1);

    assert!(resolve_expiry(&mut b.m, b.now));
    let first = b.m.clone();
    assert!(!resolve_expiry(&mut b.m, b.now + Duration::hours(2)));
    assert_eq!(b.m, first);
}

#[test]
fn terminal_matches_are_immutable() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, false).unwrap();

    assert!(matches!(b.respond(o, true), Err(AppError::InvalidState(_))));
    assert!(matches!(b.submit(a), Err(AppError::InvalidState(_))));
}

#[test]
fn turn_types_alternate_and_restart_on_set_after_a_match_turn() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();

    let t1 = b.submit(a).unwrap();
    b.judge(t1, o, Judgment::Made).unwrap();
    let t2 = b.submit(o).unwrap();
    b.judge(t2, a, Judgment::Made).unwrap();
    // o kept initiative, so o sets next
    let t3 = b.submit(o).unwrap();

    assert_eq!(b.turns[t1].turn_type, TurnType::Set);
    assert_eq!(b.turns[t2].turn_type, TurnType::Match);
    assert_eq!(b.turns[t3].turn_type, TurnType::Set);
}

#[test]
fn letters_never_shrink_and_never_pass_the_ladder() {
    let mut b = Battle::new();
    let (a, o) = (b.m.challenger_id, b.m.opponent_id);

    b.respond(o, true).unwrap();

    let mut prev_len = 0;
    for _ in 0..LADDER.len() {
        let set = b.submit(a).unwrap();
        b.judge(set, o, Judgment::Made).unwrap();
        let attempt = b.submit(o).unwrap();
        let _ = b.judge(attempt, a, Judgment::Missed).unwrap();

        let len = b.m.opponent_letters.len();
        assert!(len >= prev_len);
        assert!(len <= LADDER.len());
        prev_len = len;

        if b.m.status != MatchStatus::Active {
            break;
        }
    }
    assert_eq!(b.m.status, MatchStatus::Completed);
}
