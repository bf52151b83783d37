use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use skate_backend::handler::{
    create_match_handler, get_match_handler, get_my_matches_handler, judge_turn_handler,
    respond_to_match_handler, submit_turn_handler,
};
use skate_backend::notify::Notifier;
use skate_backend::AppState;
use sqlx::postgres;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_connection_str = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // set up connection pool
    let pool = postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&db_connection_str)
        .await
        .expect("can't connect to database");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE]);

    let trace_layer =
        TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    // build our application with some routes
    let app = Router::new()
        .route(
            "/api/matches",
            get(get_my_matches_handler).post(create_match_handler),
        )
        .route("/api/matches/:match_id", get(get_match_handler))
        .route("/api/matches/:match_id/respond", post(respond_to_match_handler))
        .route("/api/matches/:match_id/turns", post(submit_turn_handler))
        .route("/api/turns/:turn_id/judge", post(judge_turn_handler))
        .layer(cors)
        .layer(trace_layer)
        .with_state(Arc::new(AppState {
            db: pool.clone(),
            notifier: Notifier::spawn(),
        }));

    // run it with hyper
    let listener = TcpListener::bind("127.0.0.1:8000").await.unwrap();
    tracing::debug!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}
