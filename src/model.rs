use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::schema::{ForfeitReason, Judgment, MatchStatus, TurnType};

// For sqlx
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MatchModel {
    pub id: Uuid,
    pub challenger_id: Uuid,
    pub opponent_id: Uuid,
    pub status: MatchStatus,
    pub current_turn_holder: Option<Uuid>,
    pub current_turn_deadline: Option<DateTime<Utc>>,
    pub challenger_letters: String,
    pub opponent_letters: String,
    pub winner_id: Option<Uuid>,
    pub forfeit_reason: Option<ForfeitReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MatchModel {
    /// The participant on the other side of `who`. Callers must have already
    /// checked that `who` is one of the two participants.
    pub fn other_participant(&self, who: Uuid) -> Uuid {
        if who == self.challenger_id {
            self.opponent_id
        } else {
            self.challenger_id
        }
    }

    pub fn has_participant(&self, who: Uuid) -> bool {
        who == self.challenger_id || who == self.opponent_id
    }

    /// Letters accumulated by the given participant.
    pub fn letters_of(&self, who: Uuid) -> &str {
        if who == self.challenger_id {
            &self.challenger_letters
        } else {
            &self.opponent_letters
        }
    }

    pub fn set_letters_of(&mut self, who: Uuid, letters: String) {
        if who == self.challenger_id {
            self.challenger_letters = letters;
        } else {
            self.opponent_letters = letters;
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TurnModel {
    pub id: Uuid,
    pub match_id: Uuid,
    pub submitter_id: Uuid,
    pub turn_number: i32,
    pub turn_type: TurnType,
    pub media_ref: String,
    pub thumbnail_ref: Option<String>,
    pub description: Option<String>,
    pub judgment: Option<Judgment>,
    pub judged_at: Option<DateTime<Utc>>,
    pub judged_by: Option<Uuid>,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
