use anyhow::Result;
use clap::{Parser, Subcommand};
use keiko::config::Config;
use keiko::identity::{IdentityStore, SqliteIdentityStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keiko")]
#[command(about = "Messenger webhook relay for a Pandorabots persona")]
#[command(version)]
struct Cli {
    /// Config file (default: $KEIKO_CONFIG, ./config/default.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook gateway (default)
    Gateway {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides gateway.port / PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Inspect stored sender → conversation links
    Identities {
        #[command(subcommand)]
        command: IdentityCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Load and validate configuration, then print the non-secret values
    Check,
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Print every stored identity mapping
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Gateway {
        host: None,
        port: None,
    }) {
        Commands::Gateway { host, port } => {
            let config = Config::load(config_path)?;
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            keiko::gateway::run_gateway(&host, port, config).await
        }
        Commands::Config {
            command: ConfigCommands::Check,
        } => check_config(config_path),
        Commands::Identities {
            command: IdentityCommands::List,
        } => {
            let config = Config::load_unchecked(config_path)?;
            let store = SqliteIdentityStore::open(&config.identity.database_path)?;
            let mappings = store.list().await?;
            if mappings.is_empty() {
                println!("No identity mappings in {}", config.identity.database_path.display());
            }
            for mapping in mappings {
                println!(
                    "{}\t{}\t{}",
                    mapping.platform_sender_id,
                    mapping.backend_conversation_id,
                    mapping.created_at.to_rfc3339()
                );
            }
            Ok(())
        }
    }
}

fn check_config(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load_unchecked(config_path)?;
    fn set(value: &str) -> &'static str {
        if value.trim().is_empty() {
            "missing"
        } else {
            "set"
        }
    }

    match &config.config_path {
        Some(path) => println!("Config file:        {}", path.display()),
        None => println!("Config file:        (none, environment only)"),
    }
    println!("App secret:         {}", set(&config.messenger.app_secret));
    println!("Validation token:   {}", set(&config.messenger.validation_token));
    println!("Page access token:  {}", set(&config.messenger.page_access_token));
    println!("Send API URL:       {}", config.messenger.send_api_url);
    println!("Server URL:         {}", config.gateway.server_url);
    println!("Listen:             {}:{}", config.gateway.host, config.gateway.port);
    println!("Public dir:         {}", config.gateway.public_dir.display());
    println!("Unsigned webhooks:  {}", config.webhook.allow_unsigned);
    println!("Backend:            {} (bot {})", config.backend.url, config.backend.bot_id);
    println!("Identity database:  {}", config.identity.database_path.display());
    println!(
        "Persona:            {} / {} (backend {} / {})",
        config.persona.public_name,
        config.persona.public_company,
        config.persona.backend_name,
        config.persona.backend_company
    );

    config.validate()?;
    println!("✅ Configuration OK");
    Ok(())
}
