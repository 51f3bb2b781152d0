use std::path::Path;

use ammi_common::{Error, Result};
use tracing::debug;

use crate::model::AppConfig;

/// Load configuration: start from the optional YAML file, then apply
/// environment variable overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?
        }
        Some(path) => {
            debug!("config file {} not found, using defaults", path.display());
            AppConfig::default()
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = std::env::var("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = v;
    }
    if let Ok(v) = std::env::var("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = v;
    }
    if let Ok(v) = std::env::var("TWILIO_WHATSAPP_NUMBER") {
        config.twilio.whatsapp_number = v;
    }
    if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
        config.oracle.api_key = v;
    }
    if let Ok(v) = std::env::var("ANTHROPIC_MODEL") {
        config.oracle.model = v;
    }
    if let Ok(v) = std::env::var("AMMI_DATA_DIR") {
        config.storage.data_dir = v;
    }
    if let Ok(v) = std::env::var("PORT")
        && let Ok(port) = v.parse()
    {
        config.gateway.port = port;
    }
    if let Ok(v) = std::env::var("PUBLIC_URL") {
        config.gateway.public_url = Some(v);
    }
    if let Ok(v) = std::env::var("APP_ENV") {
        config.env = v;
    }
    if let Ok(v) = std::env::var("DEFAULT_TIMEZONE") {
        config.timezone = v;
    }
}
