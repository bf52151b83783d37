//! Match lifecycle engine.
//!
//! The game rules live in pure functions over row snapshots so they can be
//! exercised without a database. The async operations below wrap them in a
//! single transaction per call: lock the match row, lazily resolve any
//! overdue deadline, validate, write, commit. Notifications go out only
//! after a successful commit.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::{
    clock,
    crud::{
        crud_create_match, crud_get_last_turn, crud_get_match_for_update, crud_get_turn,
        crud_get_turns, crud_insert_turn, crud_set_judgment, crud_update_match,
    },
    error::{AppError, Result},
    ladder,
    model::{MatchModel, TurnModel},
    notify::{EventKind, Notifier},
    schema::{ForfeitReason, Judgment, MatchStatus, TurnType},
};

/// How many times a lost optimistic write is retried before the caller sees
/// `InvalidState`. A conflict usually means another caller already advanced
/// the match, so the retried attempt re-validates against fresh state.
const MAX_CONFLICT_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Pure state machine
// ---------------------------------------------------------------------------

/// Outcome of judging a turn, for the caller to pick notifications from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeOutcome {
    /// The judging deadline had already passed; the match was forfeited to
    /// the turn's submitter and the judgment was rejected.
    TooLate,
    /// Judgment recorded, match still active.
    Advanced { letter_added: bool },
    /// Judgment recorded and the miss completed the loser's ladder.
    Eliminated,
}

fn forfeit(m: &mut MatchModel, winner: Uuid, reason: ForfeitReason, now: DateTime<Utc>) {
    m.status = MatchStatus::Forfeited;
    m.winner_id = Some(winner);
    m.forfeit_reason = Some(reason);
    m.current_turn_holder = None;
    m.current_turn_deadline = None;
    m.completed_at = Some(now);
}

fn complete(m: &mut MatchModel, winner: Uuid, now: DateTime<Utc>) {
    m.status = MatchStatus::Completed;
    m.winner_id = Some(winner);
    m.current_turn_holder = None;
    m.current_turn_deadline = None;
    m.completed_at = Some(now);
}

/// Lazy expiry resolution: if the match is active and the current turn
/// holder's deadline has passed, the match is forfeited to the other
/// participant. Returns whether anything changed, so callers know to persist.
/// A second call on the now-terminal match is a no-op.
pub fn resolve_expiry(m: &mut MatchModel, now: DateTime<Utc>) -> bool {
    if m.status != MatchStatus::Active {
        return false;
    }
    let (Some(holder), Some(deadline)) = (m.current_turn_holder, m.current_turn_deadline) else {
        return false;
    };
    if !clock::is_expired(deadline, now) {
        return false;
    }
    let winner = m.other_participant(holder);
    forfeit(m, winner, ForfeitReason::Timeout, now);
    true
}

/// Turn type is determined solely by the previous turn: the first turn of a
/// match sets, a turn after a `match` sets, and a turn after a `set` matches.
/// Two consecutive `match` turns never occur.
pub fn next_turn_type(prev: Option<TurnType>) -> TurnType {
    match prev {
        None | Some(TurnType::Match) => TurnType::Set,
        Some(TurnType::Set) => TurnType::Match,
    }
}

/// Opponent accepts or declines a pending challenge.
pub fn apply_respond(
    m: &mut MatchModel,
    responder: Uuid,
    accept: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if m.status != MatchStatus::Pending {
        return Err(AppError::InvalidState("challenge has already been responded to"));
    }
    if responder != m.opponent_id {
        return Err(AppError::Forbidden);
    }
    if accept {
        m.status = MatchStatus::Active;
        // challenger always takes the first set turn
        m.current_turn_holder = Some(m.challenger_id);
        m.current_turn_deadline = Some(clock::compute_deadline(now));
    } else {
        forfeit(m, m.challenger_id, ForfeitReason::Declined, now);
    }
    Ok(())
}

/// Validates a turn submission and flips the match to the other side. The
/// turn row itself is built by the caller, which knows the previous turn.
pub fn apply_submit(m: &mut MatchModel, submitter: Uuid, now: DateTime<Utc>) -> Result<()> {
    if m.status != MatchStatus::Active {
        return Err(AppError::InvalidState("match is not active"));
    }
    if !m.has_participant(submitter) || m.current_turn_holder != Some(submitter) {
        return Err(AppError::Forbidden);
    }
    m.current_turn_holder = Some(m.other_participant(submitter));
    m.current_turn_deadline = Some(clock::compute_deadline(now));
    Ok(())
}

/// Records a judgment on `turn` and advances the match.
///
/// A letter is accrued only for a `match` turn judged `missed`. A `match`
/// turn judged `made` keeps the floor with its submitter; every other
/// judgment hands the floor to the judge. A judgment arriving after the
/// turn's own deadline forfeits the match to the submitter instead.
pub fn apply_judgment(
    m: &mut MatchModel,
    turn: &mut TurnModel,
    judge: Uuid,
    judgment: Judgment,
    now: DateTime<Utc>,
) -> Result<JudgeOutcome> {
    if m.status != MatchStatus::Active {
        return Err(AppError::InvalidState("match is not active"));
    }
    if turn.judgment.is_some() {
        return Err(AppError::InvalidState("turn has already been judged"));
    }
    if !m.has_participant(judge) || judge == turn.submitter_id {
        return Err(AppError::Forbidden);
    }

    if clock::is_expired(turn.deadline, now) {
        forfeit(m, turn.submitter_id, ForfeitReason::Timeout, now);
        return Ok(JudgeOutcome::TooLate);
    }

    turn.judgment = Some(judgment);
    turn.judged_at = Some(now);
    turn.judged_by = Some(judge);

    let letter_added = turn.turn_type == TurnType::Match && judgment == Judgment::Missed;
    if letter_added {
        let letters = ladder::add_letter(m.letters_of(turn.submitter_id));
        m.set_letters_of(turn.submitter_id, letters);
        if ladder::is_eliminated(m.letters_of(turn.submitter_id)) {
            let winner = m.other_participant(turn.submitter_id);
            complete(m, winner, now);
            return Ok(JudgeOutcome::Eliminated);
        }
    }

    // successfully matching keeps the floor; everything else hands it to
    // the judge
    let next_holder = if turn.turn_type == TurnType::Match && judgment == Judgment::Made {
        turn.submitter_id
    } else {
        m.other_participant(turn.submitter_id)
    };
    m.current_turn_holder = Some(next_holder);
    m.current_turn_deadline = Some(clock::compute_deadline(now));

    Ok(JudgeOutcome::Advanced { letter_added })
}

// ---------------------------------------------------------------------------
// Transactional orchestration
// ---------------------------------------------------------------------------

async fn with_retries<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Err(AppError::StoreConflict) if attempts + 1 < MAX_CONFLICT_RETRIES => {
                attempts += 1;
            }
            Err(AppError::StoreConflict) => {
                return Err(AppError::InvalidState(
                    "match was updated concurrently, please retry",
                ))
            }
            other => return other,
        }
    }
}

fn notify_forfeit(notifier: &Notifier, m: &MatchModel) {
    let payload = json!({
        "match_id": m.id,
        "winner_id": m.winner_id,
        "forfeit_reason": m.forfeit_reason,
    });
    notifier.notify(m.challenger_id, EventKind::MatchForfeited, payload.clone());
    notifier.notify(m.opponent_id, EventKind::MatchForfeited, payload);
}

/// Challenger opens a match against an opponent.
pub async fn create_match(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    challenger_id: Uuid,
    opponent_id: Uuid,
) -> Result<MatchModel> {
    if challenger_id == opponent_id {
        return Err(AppError::InvalidChallenge("cannot challenge yourself"));
    }
    let m = crud_create_match(db, challenger_id, opponent_id).await?;
    info!(match_id = %m.id, challenger = %challenger_id, "match created");
    notifier.notify(
        opponent_id,
        EventKind::ChallengeReceived,
        json!({ "match_id": m.id, "challenger_id": challenger_id }),
    );
    Ok(m)
}

pub async fn respond_to_match(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
    responder_id: Uuid,
    accept: bool,
) -> Result<MatchModel> {
    with_retries(|| respond_once(db, notifier, match_id, responder_id, accept)).await
}

async fn respond_once(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
    responder_id: Uuid,
    accept: bool,
) -> Result<MatchModel> {
    let now = Utc::now();
    let mut tx = db.begin().await?;
    let mut m = crud_get_match_for_update(&mut tx, match_id).await?;
    let read_status = m.status;

    if resolve_expiry(&mut m, now) {
        let m = crud_update_match(&mut tx, &m, read_status).await?;
        tx.commit().await?;
        notify_forfeit(notifier, &m);
        return Err(AppError::InvalidState("match is no longer active"));
    }

    apply_respond(&mut m, responder_id, accept, now)?;
    let m = crud_update_match(&mut tx, &m, read_status).await?;
    tx.commit().await?;

    if accept {
        info!(match_id = %m.id, "challenge accepted");
        notifier.notify(
            m.challenger_id,
            EventKind::ChallengeAccepted,
            json!({ "match_id": m.id }),
        );
    } else {
        info!(match_id = %m.id, "challenge declined");
        notifier.notify(
            m.challenger_id,
            EventKind::ChallengeDeclined,
            json!({ "match_id": m.id }),
        );
    }
    Ok(m)
}

pub async fn submit_turn(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
    submitter_id: Uuid,
    media_ref: String,
    thumbnail_ref: Option<String>,
    description: Option<String>,
) -> Result<TurnModel> {
    with_retries(|| {
        submit_once(
            db,
            notifier,
            match_id,
            submitter_id,
            media_ref.clone(),
            thumbnail_ref.clone(),
            description.clone(),
        )
    })
    .await
}

async fn submit_once(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
    submitter_id: Uuid,
    media_ref: String,
    thumbnail_ref: Option<String>,
    description: Option<String>,
) -> Result<TurnModel> {
    let now = Utc::now();
    let mut tx = db.begin().await?;
    let mut m = crud_get_match_for_update(&mut tx, match_id).await?;
    let read_status = m.status;

    if resolve_expiry(&mut m, now) {
        let m = crud_update_match(&mut tx, &m, read_status).await?;
        tx.commit().await?;
        notify_forfeit(notifier, &m);
        return Err(AppError::InvalidState("match is no longer active"));
    }

    apply_submit(&mut m, submitter_id, now)?;

    // next number and type come from the last turn, read under the same
    // match lock that serializes racing submitters
    let last = crud_get_last_turn(&mut tx, match_id).await?;
    let turn = TurnModel {
        id: Uuid::new_v4(),
        match_id,
        submitter_id,
        turn_number: last.as_ref().map_or(0, |t| t.turn_number) + 1,
        turn_type: next_turn_type(last.map(|t| t.turn_type)),
        media_ref,
        thumbnail_ref,
        description,
        judgment: None,
        judged_at: None,
        judged_by: None,
        deadline: clock::compute_deadline(now),
        created_at: now,
    };
    let turn = crud_insert_turn(&mut tx, &turn).await?;
    let m = crud_update_match(&mut tx, &m, read_status).await?;
    tx.commit().await?;

    info!(
        match_id = %match_id,
        turn_number = turn.turn_number,
        turn_type = ?turn.turn_type,
        "turn submitted"
    );
    notifier.notify(
        m.other_participant(submitter_id),
        EventKind::TurnSubmitted,
        json!({ "match_id": match_id, "turn_id": turn.id }),
    );
    Ok(turn)
}

pub async fn judge_turn(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    turn_id: Uuid,
    judge_id: Uuid,
    judgment: Judgment,
) -> Result<MatchModel> {
    with_retries(|| judge_once(db, notifier, turn_id, judge_id, judgment)).await
}

async fn judge_once(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    turn_id: Uuid,
    judge_id: Uuid,
    judgment: Judgment,
) -> Result<MatchModel> {
    let now = Utc::now();
    let mut tx = db.begin().await?;

    // locate the owning match, then re-read the turn under the match lock
    let turn = crud_get_turn(&mut tx, turn_id).await?;
    let mut m = crud_get_match_for_update(&mut tx, turn.match_id).await?;
    let mut turn = crud_get_turn(&mut tx, turn_id).await?;
    let read_status = m.status;

    if resolve_expiry(&mut m, now) {
        let m = crud_update_match(&mut tx, &m, read_status).await?;
        tx.commit().await?;
        notify_forfeit(notifier, &m);
        return Err(AppError::InvalidState("match is no longer active"));
    }

    match apply_judgment(&mut m, &mut turn, judge_id, judgment, now)? {
        JudgeOutcome::TooLate => {
            let m = crud_update_match(&mut tx, &m, read_status).await?;
            tx.commit().await?;
            info!(match_id = %m.id, turn_id = %turn_id, "judgment too late, match forfeited");
            notify_forfeit(notifier, &m);
            Err(AppError::DeadlineExpired)
        }
        outcome => {
            crud_set_judgment(&mut tx, &turn).await?;
            let m = crud_update_match(&mut tx, &m, read_status).await?;
            tx.commit().await?;

            info!(
                match_id = %m.id,
                turn_id = %turn_id,
                judgment = ?judgment,
                outcome = ?outcome,
                "turn judged"
            );
            notifier.notify(
                turn.submitter_id,
                EventKind::TurnJudged,
                json!({ "match_id": m.id, "turn_id": turn_id, "judgment": judgment }),
            );
            if outcome == JudgeOutcome::Eliminated {
                let payload = json!({ "match_id": m.id, "winner_id": m.winner_id });
                notifier.notify(m.challenger_id, EventKind::MatchCompleted, payload.clone());
                notifier.notify(m.opponent_id, EventKind::MatchCompleted, payload);
            }
            Ok(m)
        }
    }
}

/// Single-match read. Applies lazy expiry resolution before returning, so a
/// caller who "just missed" a timeout sees the match already forfeited.
pub async fn get_match(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
) -> Result<(MatchModel, Vec<TurnModel>)> {
    let m = with_retries(|| get_match_once(db, notifier, match_id)).await?;
    let turns = crud_get_turns(db, match_id).await?;
    Ok((m, turns))
}

async fn get_match_once(
    db: &Pool<Postgres>,
    notifier: &Notifier,
    match_id: Uuid,
) -> Result<MatchModel> {
    let now = Utc::now();
    let mut tx = db.begin().await?;
    let mut m = crud_get_match_for_update(&mut tx, match_id).await?;
    let read_status = m.status;

    if resolve_expiry(&mut m, now) {
        let m = crud_update_match(&mut tx, &m, read_status).await?;
        tx.commit().await?;
        notify_forfeit(notifier, &m);
        return Ok(m);
    }
    tx.commit().await?;
    Ok(m)
}
