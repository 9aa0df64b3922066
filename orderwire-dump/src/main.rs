//! orderwire-dump — entry point.
//!
//! ```text
//! orderwire-dump                    Connect and tally update orders
//! orderwire-dump --json             Also print each order as a JSON line
//! orderwire-dump --session <n>      Override the session number
//! orderwire-dump --config <path>    Load a custom config TOML
//! orderwire-dump --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orderwire_dump::config::DumpConfig;
use orderwire_dump::dump::OrderDump;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "orderwire-dump", about = "Dump the update order stream of a display endpoint")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "orderwire-dump.toml")]
    config: PathBuf,

    /// Session number of the endpoint (overrides the config).
    #[arg(short, long)]
    session: Option<u32>,

    /// Print each received order as a JSON line on stdout.
    #[arg(long)]
    json: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&DumpConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then apply CLI overrides.
    let mut config = DumpConfig::load(&cli.config);
    if let Some(session) = cli.session {
        config.channel.session_id = session;
    }
    if cli.json {
        config.output.json = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("orderwire-dump v{}", env!("CARGO_PKG_VERSION"));
    info!("endpoint: session {} / {}", config.channel.session_id, config.channel.name);
    info!(
        "announcing {}x{} @ {} bpp",
        config.display.width, config.display.height, config.display.color_depth
    );

    let dump = OrderDump::new(config);
    let stop = dump.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    dump.run().await?;

    Ok(())
}
