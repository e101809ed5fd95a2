mod cli;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, TokenArgs};
use projecthub_core::{logging, AppConfig, ConfigOverrides};
use projecthub_domain::{AuthenticatedPrincipal, ScrumBoardService};
use projecthub_persistence::SqliteStore;
use projecthub_server::{build_router, AppState, JwtKeys};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "projecthub", &mut std::io::stdout());
        }
        Commands::Token(args) => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            config.apply_overrides(ConfigOverrides {
                jwt_secret: cli.jwt_secret,
                ..Default::default()
            });
            print_token(&config, args)?;
        }
        Commands::Serve(args) => {
            logging::init("info,sqlx=warn")?;
            let mut config = AppConfig::load(cli.config.as_deref())?;
            config.apply_overrides(ConfigOverrides {
                bind: args.bind,
                database_url: args.database_url,
                jwt_secret: cli.jwt_secret,
            });
            serve(config).await?;
        }
    }

    Ok(())
}

fn print_token(config: &AppConfig, args: TokenArgs) -> anyhow::Result<()> {
    let principal = AuthenticatedPrincipal::new(args.user, args.name, args.roles);
    let token = JwtKeys::from_config(config)?.issue(&principal)?;
    println!("{}", token);
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let keys = JwtKeys::from_config(&config)?;

    let store = Arc::new(SqliteStore::with_max_connections(
        config.database.url.clone(),
        config.database.max_connections,
    ));
    store.connect().await?;

    let state = AppState::new(
        ScrumBoardService::new(store.clone()),
        keys,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        "ProjectHub {} ({}) listening on {}",
        env!("CARGO_PKG_VERSION"),
        projecthub_server::routes::health::COMMIT,
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
