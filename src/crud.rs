//! Match record store: every helper that reads or writes `matches`/`turns`.
//!
//! Mutations always run inside a caller-owned transaction. The match row is
//! locked with `SELECT ... FOR UPDATE`, the match update carries a
//! status-guard `WHERE` clause, and turn insertion is protected by the
//! `UNIQUE (match_id, turn_number)` constraint. A lost race surfaces as
//! [`AppError::StoreConflict`] so the engine can retry.

use sqlx::{query, query_as, PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    model::{MatchModel, TurnModel},
    schema::MatchStatus,
};

/// Postgres `unique_violation` and `serialization_failure` both mean another
/// writer got there first.
fn conflict_from(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code == "23505" || code == "40001" {
                return AppError::StoreConflict;
            }
        }
    }
    AppError::Database(e)
}

/// Locks the match row for the remainder of the transaction, so concurrent
/// writers on the same match serialize instead of interleaving.
pub async fn crud_get_match_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<MatchModel> {
    query_as(r#"SELECT * FROM matches WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Matches where the caller is either participant, most recently updated
/// first.
pub async fn crud_get_matches_for(
    db: &Pool<Postgres>,
    participant: Uuid,
) -> Result<Vec<MatchModel>> {
    let matches = query_as(
        r#"
        SELECT * FROM matches
        WHERE challenger_id = $1 OR opponent_id = $1
        ORDER BY updated_at DESC
        "#,
    )
    .bind(participant)
    .fetch_all(db)
    .await?;

    Ok(matches)
}

pub async fn crud_create_match(
    db: &Pool<Postgres>,
    challenger_id: Uuid,
    opponent_id: Uuid,
) -> Result<MatchModel> {
    let m: MatchModel = query_as(
        r#"
        INSERT INTO matches (id, challenger_id, opponent_id, status)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(challenger_id)
    .bind(opponent_id)
    .bind(MatchStatus::Pending)
    .fetch_one(db)
    .await?;

    Ok(m)
}

/// Writes back every mutable match field, guarded on the status the row had
/// when it was read. Zero rows updated means a concurrent writer advanced the
/// match first. Returns the authoritative post-update row.
pub async fn crud_update_match(
    conn: &mut PgConnection,
    m: &MatchModel,
    expected_status: MatchStatus,
) -> Result<MatchModel> {
    query_as(
        r#"
        UPDATE matches
        SET status = $2,
            current_turn_holder = $3,
            current_turn_deadline = $4,
            challenger_letters = $5,
            opponent_letters = $6,
            winner_id = $7,
            forfeit_reason = $8,
            completed_at = $9,
            updated_at = now()
        WHERE id = $1 AND status = $10
        RETURNING *
        "#,
    )
    .bind(m.id)
    .bind(m.status)
    .bind(m.current_turn_holder)
    .bind(m.current_turn_deadline)
    .bind(&m.challenger_letters)
    .bind(&m.opponent_letters)
    .bind(m.winner_id)
    .bind(m.forfeit_reason)
    .bind(m.completed_at)
    .bind(expected_status)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::StoreConflict)
}

pub async fn crud_get_turn(conn: &mut PgConnection, id: Uuid) -> Result<TurnModel> {
    query_as(r#"SELECT * FROM turns WHERE id = $1"#)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// The highest-numbered turn of a match, if any.
pub async fn crud_get_last_turn(
    conn: &mut PgConnection,
    match_id: Uuid,
) -> Result<Option<TurnModel>> {
    let turn = query_as(
        r#"
        SELECT * FROM turns
        WHERE match_id = $1
        ORDER BY turn_number DESC
        LIMIT 1
        "#,
    )
    .bind(match_id)
    .fetch_optional(conn)
    .await?;

    Ok(turn)
}

pub async fn crud_get_turns(db: &Pool<Postgres>, match_id: Uuid) -> Result<Vec<TurnModel>> {
    let turns = query_as(
        r#"SELECT * FROM turns WHERE match_id = $1 ORDER BY turn_number ASC"#,
    )
    .bind(match_id)
    .fetch_all(db)
    .await?;

    Ok(turns)
}

/// Inserts a fully-formed turn row. A `(match_id, turn_number)` collision
/// from a racing submitter comes back as `StoreConflict`, never as a skipped
/// or duplicated number.
pub async fn crud_insert_turn(conn: &mut PgConnection, t: &TurnModel) -> Result<TurnModel> {
    let turn: TurnModel = query_as(
        r#"
        INSERT INTO turns
            (id, match_id, submitter_id, turn_number, turn_type,
             media_ref, thumbnail_ref, description, deadline)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(t.id)
    .bind(t.match_id)
    .bind(t.submitter_id)
    .bind(t.turn_number)
    .bind(t.turn_type)
    .bind(&t.media_ref)
    .bind(&t.thumbnail_ref)
    .bind(&t.description)
    .bind(t.deadline)
    .fetch_one(conn)
    .await
    .map_err(conflict_from)?;

    Ok(turn)
}

/// Records a judgment exactly once; the `judgment IS NULL` guard rejects a
/// second judge racing on the same turn.
pub async fn crud_set_judgment(conn: &mut PgConnection, t: &TurnModel) -> Result<()> {
    let res = query(
        r#"
        UPDATE turns
        SET judgment = $2, judged_at = $3, judged_by = $4
        WHERE id = $1 AND judgment IS NULL
        "#,
    )
    .bind(t.id)
    .bind(t.judgment)
    .bind(t.judged_at)
    .bind(t.judged_by)
    .execute(conn)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::StoreConflict);
    }
    Ok(())
}
