use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

use commands::endpoint::EndpointSpec;

#[derive(Parser)]
#[command(name = "invrec")]
#[command(about = "Inventory reconciliation across systems of record", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Compare two systems and print the reconciliation report
    Diff(DiffArgs),

    /// Compare two systems and push selected differences into the target
    Sync(SyncArgs),
}

#[derive(Args, Clone)]
pub struct DiffArgs {
    /// Layered config paths in merge order
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Origin (desired state): `clearpass` or `file:<path>`
    #[arg(long)]
    pub origin: EndpointSpec,

    /// Target (system to converge): `clearpass` or `file:<path>`
    #[arg(long)]
    pub target: EndpointSpec,

    /// Identity key field (repeat for composite keys)
    #[arg(long = "key", required = true)]
    pub key_fields: Vec<String>,

    /// Field to compare (repeatable); with none, keys present on both sides
    /// all count as matched
    #[arg(long = "field")]
    pub fields: Vec<String>,

    /// Origin fetch filter `field=value` in the origin's own field names (repeatable)
    #[arg(long = "origin-filter", value_parser = commands::parse_filter)]
    pub origin_filters: Vec<(String, String)>,

    /// Target fetch filter `field=value` in the target's own field names (repeatable)
    #[arg(long = "target-filter", value_parser = commands::parse_filter)]
    pub target_filters: Vec<(String, String)>,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    /// Create items missing in the target
    #[arg(long, default_value_t = false)]
    pub create_missing: bool,

    /// Update target items whose compared fields differ
    #[arg(long, default_value_t = false)]
    pub update_changed: bool,

    /// Delete target items missing in the origin
    #[arg(long, default_value_t = false)]
    pub delete_extra: bool,

    /// Max concurrent remote calls (defaults to sync.max_in_flight)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = invrec_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Diff(args) => commands::diff::run(&args).await?,

        Commands::Sync(args) => commands::sync::run(&args).await?,
    }

    Ok(())
}

fn init_tracing() {
    // logs go to stderr so report output on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
