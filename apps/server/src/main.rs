use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sendiz_config::{load as load_config, AppConfig};
use sendiz_database::{prepare_database, run_migrations, ChatRepository, MemberRepository, MemberRole};
use sendiz_gateway::{create_router, GatewayState};
use sendiz_runtime::{shutdown_signal, telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "sendiz")]
#[command(about = "Sendiz chat backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create a chat and add members to it
    SeedChat {
        #[arg(long)]
        name: String,
        /// User id to add; repeat for several members. The first one owns the chat.
        #[arg(long = "member", required = true)]
        members: Vec<i64>,
    },
    /// Sign a bearer token for local testing
    IssueToken {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::SeedChat { name, members } => seed_chat(config, &name, &members).await,
        Commands::IssueToken { user, ttl_secs } => issue_token(config, user, ttl_secs),
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Sendiz backend");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::from_config(services.engine.clone(), &config)
        .map_err(|error| anyhow::anyhow!("{error}"))?;
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    let hub_services = services.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Close live sessions before the listener drains.
            hub_services.shutdown().await;
        })
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn migrate(config: AppConfig) -> anyhow::Result<()> {
    let pool = prepare_database(&config.database).await?;
    run_migrations(&pool).await?;

    println!("Migrations applied to {}", config.database.url);
    Ok(())
}

async fn seed_chat(config: AppConfig, name: &str, members: &[i64]) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let chat = ChatRepository::new(services.db_pool.clone())
        .create(name)
        .await
        .context("failed to create chat")?;

    let repo = MemberRepository::new(services.db_pool.clone());
    for (index, user_id) in members.iter().enumerate() {
        let role = if index == 0 {
            MemberRole::Owner
        } else {
            MemberRole::Member
        };
        repo.add(chat.id, *user_id, role)
            .await
            .with_context(|| format!("failed to add member {user_id}"))?;
    }

    println!("Created chat {} ({}) with members {:?}", chat.id, chat.name, members);
    Ok(())
}

fn issue_token(config: AppConfig, user_id: i64, ttl_secs: u64) -> anyhow::Result<()> {
    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .filter(|secret| !secret.is_empty())
        .context("auth.jwt_secret must be configured")?;

    let verifier = sendiz_gateway::JwtVerifier::new(secret, config.auth.issuer.clone());
    let token = verifier
        .issue(user_id, Duration::from_secs(ttl_secs))
        .map_err(|error| anyhow::anyhow!("{error}"))?;

    println!("{token}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["sendiz"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn seed_chat_collects_repeated_members() {
        let cli =
            Cli::try_parse_from(["sendiz", "seed-chat", "--name", "ops", "--member", "1", "--member", "2"])
                .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::SeedChat {
                name: "ops".into(),
                members: vec![1, 2],
            })
        );
    }

    #[test]
    fn seed_chat_requires_a_member() {
        assert!(Cli::try_parse_from(["sendiz", "seed-chat", "--name", "ops"]).is_err());
    }

    #[test]
    fn issue_token_defaults_to_an_hour() {
        let cli = Cli::try_parse_from(["sendiz", "issue-token", "--user", "7"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::IssueToken {
                user: 7,
                ttl_secs: 3600
            })
        );
    }
}
