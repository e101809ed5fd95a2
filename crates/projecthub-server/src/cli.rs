use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "projecthub")]
#[command(about = "Scrum board API server for ProjectHub", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE", env = "PROJECTHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Secret used to sign and verify bearer tokens
    #[arg(long, global = true, env = "PROJECTHUB_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Print a signed bearer token for local development
    Token(TokenArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "PROJECTHUB_BIND")]
    pub bind: Option<String>,

    /// SQLite database URL, e.g. sqlite://projecthub.db
    #[arg(long, env = "PROJECTHUB_DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Args)]
pub struct TokenArgs {
    /// User id placed in the `sub` claim
    #[arg(long)]
    pub user: Uuid,

    /// Display name of the user
    #[arg(long)]
    pub name: String,

    /// Role to grant; repeat for several
    #[arg(long = "role")]
    pub roles: Vec<String>,
}
