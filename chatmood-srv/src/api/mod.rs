//! HTTP API handlers for chatmood-srv

pub mod chat;
pub mod health;
pub mod stream;

pub use chat::chat_routes;
pub use health::health_routes;
pub use stream::stream_routes;
