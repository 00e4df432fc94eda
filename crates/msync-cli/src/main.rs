use anyhow::Result;
use clap::{Parser, Subcommand};
use msync_schemas::DemotionPolicy;

mod commands;

#[derive(Parser)]
#[command(name = "msync")]
#[command(about = "Homeserver membership sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one person against the homeserver and print the report as JSON
    Sync {
        /// Path to a JSON sync payload (school, user, rooms)
        #[arg(long = "payload-file")]
        payload_file: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Override the configured demotion policy (preserve | enforce)
        #[arg(long, value_parser = parse_demotion)]
        demotion: Option<DemotionPolicy>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate config: typed settings, unused keys, secret resolution
    CheckConfig {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Fail instead of warn when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn parse_demotion(raw: &str) -> Result<DemotionPolicy, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Sync {
            payload_file,
            config_paths,
            demotion,
        } => commands::sync::run(&payload_file, &config_paths, demotion).await?,

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::CheckConfig {
            config_paths,
            strict,
        } => commands::check::run(&config_paths, strict)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
