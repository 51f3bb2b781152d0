pub mod rate_limit;
pub mod router;
pub mod server;
pub mod signature;
pub mod state;
pub mod webhook;

pub use rate_limit::RateLimiter;
pub use server::GatewayServer;
pub use state::AppState;
