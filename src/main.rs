mod auth;
mod db;
mod errors;
mod models;
mod realtime;
mod routes;
mod service;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthService;
use crate::db::conversation_repository::ConversationRepository;
use crate::db::message_repository::MessageRepository;
use crate::db::user_repository::UserRepository;
use crate::realtime::registry::SessionRegistry;
use crate::routes::auth_routes::{login_handler, register_handler};
use crate::routes::chat_routes::{create_chat_handler, get_chat_handler, list_chats_handler};
use crate::routes::user_routes::{get_profile_handler, list_users_handler, update_profile_handler};
use crate::routes::ws_routes::ws_handler;
use crate::service::chat_service::ChatService;
use crate::service::user_service::UserService;

/// Shared handler state: the identity verifier, both services and the
/// session registry.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: UserService,
    pub chat: ChatService,
    pub registry: Arc<SessionRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skillswap_hub=debug,tower_http=debug".into()),
        )
        .init();

    // ── Database ──────────────────────────────────────────────────────────────
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set (copy .env.example to .env)");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    info!("Database connection established and migrations applied");

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let user_repo = UserRepository::new(pool.clone());
    let conversation_repo = ConversationRepository::new(pool.clone());
    let message_repo = MessageRepository::new(pool.clone());

    let state = AppState {
        auth: AuthService::new(&jwt_secret),
        users: UserService::new(user_repo.clone()),
        chat: ChatService::new(conversation_repo, message_repo, user_repo),
        registry: Arc::new(SessionRegistry::new()),
    };

    // ── Router ────────────────────────────────────────────────────────────────
    let app = Router::new()
        .route("/", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/users/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/api/users", get(list_users_handler))
        .route("/api/chat", get(list_chats_handler).post(create_chat_handler))
        .route("/api/chat/{chat_id}", get(get_chat_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // ── Listen ────────────────────────────────────────────────────────────────
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3002);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "SkillSwap Hub API is running" }))
}
