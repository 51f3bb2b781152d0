use serde::{Deserialize, Serialize};

/// Top-level application configuration.
///
/// Loaded from an optional YAML file with environment variable overrides;
/// see `loader`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub twilio: TwilioConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    /// Deployment environment: "development" relaxes credential checks and
    /// skips webhook signature verification.
    pub env: String,
    /// Default timezone recorded on new users.
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender in `whatsapp:+NNN` form.
    pub whatsapp_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the sqlite database files.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    /// Externally visible base URL, used when verifying webhook signatures.
    pub public_url: Option<String>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per sender within one window.
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twilio: TwilioConfig::default(),
            oracle: OracleConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            env: "development".to_string(),
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            whatsapp_number: "whatsapp:+14155238886".to_string(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 4096,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            public_url: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Report missing or malformed settings. Returns the list of problems;
    /// callers decide whether a problem is fatal (production) or a warning
    /// (development).
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.twilio.account_sid.is_empty() {
            problems.push("TWILIO_ACCOUNT_SID is not set".to_string());
        } else if !self.twilio.account_sid.starts_with("AC") {
            problems.push("TWILIO_ACCOUNT_SID should start with AC".to_string());
        }

        if self.twilio.auth_token.is_empty() {
            problems.push("TWILIO_AUTH_TOKEN is not set".to_string());
        }

        if self.oracle.api_key.is_empty() {
            problems.push("ANTHROPIC_API_KEY is not set".to_string());
        } else if !self.oracle.api_key.starts_with("sk-ant-") {
            problems.push("ANTHROPIC_API_KEY should start with sk-ant-".to_string());
        }

        problems
    }
}
