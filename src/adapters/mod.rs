pub mod api_handler;
pub mod downstream;
pub mod health_handler;
pub mod rate_limit;
pub mod session_registry;
pub mod tool_handler;
