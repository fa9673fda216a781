use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simcha::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simcha=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init().await,
        Commands::Serve { host, port } => commands::serve(cli.config, host, port).await,
        Commands::Migrate => commands::migrate(cli.config).await,
        Commands::CreateUser { email } => commands::create_user(cli.config, &email).await,
        Commands::RevokeSessions { email } => {
            commands::revoke_sessions(cli.config, &email).await
        }
    }
}
