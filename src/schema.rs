use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use crate::model::{MatchModel, TurnModel};

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
    Forfeited,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Forfeited)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "turn_type", rename_all = "lowercase")]
pub enum TurnType {
    Set,
    Match,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "judgment", rename_all = "lowercase")]
pub enum Judgment {
    Made,
    Missed,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "forfeit_reason", rename_all = "lowercase")]
pub enum ForfeitReason {
    Declined,
    Timeout,
}

#[derive(Deserialize, Debug)]
pub struct CreateMatchSchema {
    pub opponent_id: Uuid,
}

#[derive(Deserialize, Debug)]
pub struct RespondSchema {
    pub accept: bool,
}

#[derive(Deserialize, Debug)]
pub struct SubmitTurnSchema {
    pub media_ref: String,
    pub thumbnail_ref: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct JudgeTurnSchema {
    pub judgment: Judgment,
}

// For json response
#[derive(Debug, Serialize)]
pub struct GetMatchSchema {
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

impl From<&MatchModel> for GetMatchSchema {
    fn from(m: &MatchModel) -> Self {
        Self {
            id: m.id,
            challenger_id: m.challenger_id,
            opponent_id: m.opponent_id,
            status: m.status,
            current_turn_holder: m.current_turn_holder,
            current_turn_deadline: m.current_turn_deadline,
            challenger_letters: m.challenger_letters.clone(),
            opponent_letters: m.opponent_letters.clone(),
            winner_id: m.winner_id,
            forfeit_reason: m.forfeit_reason,
            created_at: m.created_at,
            updated_at: m.updated_at,
            completed_at: m.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetTurnSchema {
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

impl From<&TurnModel> for GetTurnSchema {
    fn from(t: &TurnModel) -> Self {
        Self {
            id: t.id,
            match_id: t.match_id,
            submitter_id: t.submitter_id,
            turn_number: t.turn_number,
            turn_type: t.turn_type,
            media_ref: t.media_ref.clone(),
            thumbnail_ref: t.thumbnail_ref.clone(),
            description: t.description.clone(),
            judgment: t.judgment,
            judged_at: t.judged_at,
            judged_by: t.judged_by,
            deadline: t.deadline,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchDetailSchema {
    #[serde(rename = "match")]
    pub match_: GetMatchSchema,
    pub turns: Vec<GetTurnSchema>,
}
