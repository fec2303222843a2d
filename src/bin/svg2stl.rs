//! CLI binary for svg2stl.
//!
//! A thin shim over the library crate: `serve` runs the web application,
//! `convert` extrudes one file, `check` reports whether OpenSCAD resolves.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use svg2stl::config::DEV_SECRET_KEY;
use svg2stl::{check_tool, convert, ConversionConfig, ServerConfig};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload page on port 5002
  svg2stl

  # Serve on another port with a real secret
  SECRET_KEY=$(openssl rand -hex 32) svg2stl serve --port 8080

  # Convert one file, 3 mm tall
  svg2stl convert logo.svg -o logo.stl --height 3

  # Is OpenSCAD installed?
  svg2stl check --json

ENVIRONMENT VARIABLES:
  HOST, PORT              Bind address (default 0.0.0.0:5002)
  SECRET_KEY              Key for signing flash-message cookies
  SVG2STL_OPENSCAD        OpenSCAD binary to try before the built-in list
  SVG2STL_SCRATCH_DIR     Where uploads and meshes live while converting
  RUST_LOG                Overrides the log filter
"#;

/// Convert SVG artwork to STL meshes with OpenSCAD.
#[derive(Parser, Debug)]
#[command(
    name = "svg2stl",
    version,
    about = "Convert SVG artwork to 3D-printable STL meshes with OpenSCAD",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,

    /// Explicit OpenSCAD binary, tried before the built-in candidates.
    #[arg(long, env = "SVG2STL_OPENSCAD", global = true)]
    openscad: Option<PathBuf>,

    /// Extrusion height in millimetres.
    #[arg(long, env = "SVG2STL_HEIGHT", default_value_t = 5.0, global = true)]
    height: f64,

    /// OpenSCAD timeout in seconds.
    #[arg(long, env = "SVG2STL_TIMEOUT", default_value_t = 60, global = true)]
    timeout: u64,

    /// Ask OpenSCAD for a full CGAL render (`--render`).
    #[arg(long, env = "SVG2STL_FULL_RENDER", global = true)]
    full_render: bool,

    /// DEBUG-level logs and detailed internal errors.
    #[arg(short, long, env = "SVG2STL_DEBUG", global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web application (default).
    Serve,

    /// Convert a single SVG file.
    Convert {
        /// SVG document to extrude.
        input: PathBuf,

        /// Where to write the STL. Default: input with an `.stl` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report whether OpenSCAD can be found.
    Check {
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "PORT", default_value_t = 5002, global = true)]
    port: u16,

    /// Key for signing flash-message cookies.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,

    /// Scratch directory for uploads and meshes.
    #[arg(long, env = "SVG2STL_SCRATCH_DIR", global = true)]
    scratch_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let conversion = build_conversion_config(&cli)?;

    match cli.command {
        None | Some(Command::Serve) => serve(cli.serve, conversion, cli.debug).await,
        Some(Command::Convert {
            input,
            output,
            json,
        }) => convert_one(input, output, json, &conversion).await,
        Some(Command::Check { json }) => check(json, &conversion).await,
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_conversion_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .extrude_height(cli.height)
        .tool_timeout_secs(cli.timeout)
        .full_render(cli.full_render);
    if let Some(ref path) = cli.openscad {
        builder = builder.tool_path(path);
    }
    builder.build().context("Invalid configuration")
}

async fn serve(args: ServeArgs, conversion: ConversionConfig, debug: bool) -> Result<()> {
    let mut config = ServerConfig {
        bind: SocketAddr::new(args.host, args.port),
        debug,
        conversion,
        ..ServerConfig::default()
    };
    match args.secret_key {
        Some(key) if !key.is_empty() => config.secret_key = key,
        _ => tracing::warn!(
            "SECRET_KEY not set, signing flash cookies with the development key {DEV_SECRET_KEY:?}"
        ),
    }
    if let Some(dir) = args.scratch_dir {
        config.scratch_dir = dir;
    }

    let tool = check_tool(&config.conversion).await;
    match tool.path {
        Some(ref path) => tracing::info!(tool = %path.display(), "OpenSCAD available"),
        None => tracing::warn!(
            "OpenSCAD not found; conversions will fail until it is installed"
        ),
    }

    svg2stl::server::serve(config, shutdown_signal())
        .await
        .context("Server failed")
}

async fn convert_one(
    input: PathBuf,
    output: Option<PathBuf>,
    json: bool,
    config: &ConversionConfig,
) -> Result<()> {
    let output = output.unwrap_or_else(|| input.with_extension("stl"));
    let result = convert(&input, &output, config)
        .await
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    if json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        eprintln!(
            "{}  {} bytes  {}ms  →  {}",
            green("✔"),
            result.output_bytes,
            result.duration_ms,
            bold(&result.output_path.display().to_string()),
        );
    }
    Ok(())
}

async fn check(json: bool, config: &ConversionConfig) -> Result<()> {
    let status = check_tool(config).await;
    if json {
        let json = serde_json::to_string_pretty(&status).context("Failed to serialise status")?;
        println!("{json}");
    } else {
        match status.path {
            Some(ref path) => println!("{} OpenSCAD: {}", green("✔"), path.display()),
            None => println!("{} OpenSCAD not found", red("✘")),
        }
    }
    if !status.available {
        std::process::exit(1);
    }
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
