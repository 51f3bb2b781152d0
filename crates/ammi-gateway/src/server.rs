use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ammi_assistant::MessageHandler;
use ammi_channels::{MediaFetcher, TwilioSender};
use ammi_common::{Error, Result};
use ammi_config::AppConfig;
use ammi_db::{RecordStore, UserStore};
use ammi_oracle::{AnthropicProvider, Oracle};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::rate_limit::RateLimiter;
use crate::router::build_router;
use crate::state::AppState;

/// How often expired rate-limit windows are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct GatewayServer {
    config: AppConfig,
    state: AppState,
}

impl GatewayServer {
    /// Wire up stores, oracle, sender, and the intent router from config.
    pub fn new(config: AppConfig) -> Result<Self> {
        for problem in config.validate() {
            if config.is_production() {
                return Err(Error::Config(problem));
            }
            warn!("configuration problem: {problem}");
        }

        let data_dir = Path::new(&config.storage.data_dir);
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Config(format!("cannot create data dir: {e}")))?;

        let users = Arc::new(Mutex::new(UserStore::open(&data_dir.join("users.db"))?));
        let records = Arc::new(Mutex::new(RecordStore::open(&data_dir.join("records.db"))?));

        let provider = Arc::new(AnthropicProvider::new(config.oracle.api_key.clone()));
        let oracle = Arc::new(Oracle::new(
            provider,
            config.oracle.model.clone(),
            config.oracle.max_tokens,
        ));

        let sender = Arc::new(TwilioSender::new(
            config.twilio.account_sid.clone(),
            config.twilio.auth_token.clone(),
            config.twilio.whatsapp_number.clone(),
        ));
        let fetcher = Arc::new(MediaFetcher::new(
            config.twilio.account_sid.clone(),
            config.twilio.auth_token.clone(),
        )?);

        let handler = Arc::new(MessageHandler::new(
            users,
            records,
            oracle,
            sender,
            fetcher,
            config.timezone.clone(),
        ));

        let limiter = Arc::new(RateLimiter::new(
            config.gateway.rate_limit.max_requests,
            Duration::from_secs(config.gateway.rate_limit.window_secs),
        ));

        let skip_signature_check = !config.is_production();
        if skip_signature_check {
            warn!("development mode: webhook signature verification disabled");
        }

        let state = AppState {
            handler,
            limiter,
            auth_token: config.twilio.auth_token.clone(),
            public_url: config.gateway.public_url.clone(),
            skip_signature_check,
        };

        Ok(Self { config, state })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until ctrl-c. Spawns the rate-limit sweeper alongside.
    pub async fn run(self) -> Result<()> {
        spawn_sweeper(self.state.limiter.clone());

        let router = build_router(self.state);
        let addr = format!("0.0.0.0:{}", self.config.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("cannot bind {addr}: {e}")))?;

        info!("ammi gateway listening on http://{addr}");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Config(format!("server error: {e}")))?;

        info!("gateway shut down");
        Ok(())
    }
}

fn spawn_sweeper(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.sweep();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    } else {
        info!("shutdown signal received");
    }
}
