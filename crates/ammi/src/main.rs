use std::path::PathBuf;

use ammi_channels::{MessageSender, TwilioSender};
use ammi_config::load_config;
use ammi_gateway::GatewayServer;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ammi", version, about = "Ammi - a WhatsApp health assistant")]
struct Cli {
    /// Path to a YAML config file. Environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook gateway.
    Serve,
    /// Send a one-off WhatsApp message (useful for checking credentials).
    Send {
        /// Recipient phone number, e.g. +15551234567
        to: String,
        /// Message text
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve => {
            info!("starting ammi gateway");
            let server = GatewayServer::new(config).context("failed to initialize gateway")?;
            server.run().await.context("gateway exited with an error")?;
        }
        Commands::Send { to, message } => {
            let sender = TwilioSender::new(
                config.twilio.account_sid,
                config.twilio.auth_token,
                config.twilio.whatsapp_number,
            );
            let delivered = sender
                .send_message(&to, &message, None)
                .await
                .context("send failed")?;
            if delivered {
                println!("message sent to {to}");
            } else {
                anyhow::bail!("message to {to} was rejected by Twilio");
            }
        }
    }

    Ok(())
}
