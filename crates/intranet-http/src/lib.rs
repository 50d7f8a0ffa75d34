//! HTTP and WebSocket implementations of the `intranet-chat` collaborators.

pub mod files;
pub mod gateway;
pub mod rest;
pub mod session;

pub use files::HttpFileStorage;
pub use gateway::{GatewayError, PushGateway, gateway_url};
pub use rest::RestMessageService;
pub use session::TokenSession;
