use anyhow::Result;
use clap::{Parser, Subcommand};
use glowd::{cli, config::GlowdConfig, relay, AppContext};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "glowd",
    about = "Glow — product routine advisor: catalog client + chat relay proxy",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Relay HTTP server port
    #[arg(long, env = "GLOWD_PORT")]
    port: Option<u16>,

    /// Data directory for config, catalog, and the session database
    #[arg(long, env = "GLOWD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GLOWD_LOG")]
    log: Option<String>,

    /// Bind address for the relay server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "GLOWD_BIND")]
    bind_address: Option<String>,

    /// Catalog source: filesystem path or HTTP(S) URL
    #[arg(long, env = "GLOWD_CATALOG")]
    catalog: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "GLOWD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the relay proxy (default when no subcommand given).
    ///
    /// Accepts chat requests from advisor clients, injects the server-held
    /// credential, and forwards them to the upstream completion API.
    ///
    /// Examples:
    ///   glowd serve
    ///   glowd
    Serve,
    /// Interactive product advisor in the terminal.
    ///
    /// Browse the catalog, select products, and generate an AI usage routine
    /// through the configured relay. The previous session is restored on
    /// startup.
    ///
    /// Examples:
    ///   glowd chat
    ///   glowd chat --ask "Which of these is best for dry skin?"
    Chat {
        /// Single-shot question — print the response and exit
        #[arg(long)]
        ask: Option<String>,
    },
    /// Inspect the product catalog.
    ///
    /// Examples:
    ///   glowd catalog categories
    ///   glowd catalog list --category skincare
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List the distinct categories
    Categories,
    /// List products, optionally filtered by category
    List {
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = GlowdConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.bind_address,
        args.catalog,
    );
    let _log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    match args.command {
        None | Some(Command::Serve) => run_serve(config).await,
        Some(Command::Chat { ask }) => {
            cli::chat::run_chat(cli::chat::ChatOpts { ask }, &config).await
        }
        Some(Command::Catalog { action }) => match action {
            CatalogAction::Categories => cli::catalog::run_categories(&config).await,
            CatalogAction::List { category } => {
                cli::catalog::run_list(&config, category.as_deref()).await
            }
        },
    }
}

async fn run_serve(config: GlowdConfig) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "glowd starting");
    info!(
        data_dir = %config.data_dir.display(),
        bind = %config.bind_address,
        port = config.port,
        upstream = %config.relay.upstream_url,
        "config loaded"
    );
    if config.relay.api_key.is_none() {
        tracing::warn!(
            "no upstream credential configured (GLOWD_API_KEY) — relay requests will be rejected"
        );
    }

    let ctx = Arc::new(AppContext::new(Arc::new(config)));
    relay::start_relay_server(ctx).await
}

/// Initialize tracing. When a log file is given, logs go to both stderr and
/// a daily-rotated file; the returned guard must stay alive for the process
/// lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable) or `"json"`
/// (structured output for log aggregators).
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("glowd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stderr-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr",
                dir.display()
            );
            init_stderr_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }
        Some(guard)
    } else {
        init_stderr_only(log_level, use_json);
        None
    }
}

fn init_stderr_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
