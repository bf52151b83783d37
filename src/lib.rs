pub mod clock;
pub mod crud;
pub mod engine;
pub mod error;
pub mod handler;
pub mod ladder;
pub mod model;
pub mod notify;
pub mod schema;

use sqlx::postgres;

use crate::notify::Notifier;

pub struct AppState {
    pub db: postgres::PgPool,
    pub notifier: Notifier,
}
