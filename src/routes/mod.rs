pub mod auth_routes;
pub mod chat_routes;
pub mod user_routes;
pub mod ws_routes;
