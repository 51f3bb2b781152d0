pub mod loader;
pub mod model;

pub use loader::load_config;
pub use model::{AppConfig, GatewayConfig, OracleConfig, RateLimitConfig, StorageConfig, TwilioConfig};
