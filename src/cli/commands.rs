use crate::{
    config::RouterConfig,
    dispatcher::Dispatcher,
    echo::demo_resource,
    router::Router,
    server::{write_response, Request, WriteOutcome},
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use http::Method;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Command-line interface for routegate
///
/// Drives the built-in `echo` demo resource through the dispatch pipeline.
#[derive(Parser, Debug)]
#[command(name = "routegate")]
#[command(about = "routegate demo CLI", long_about = None)]
pub struct Cli {
    /// TOML configuration file (defaults come from ROUTEGATE_* variables)
    #[arg(short, long, global = true, env = "ROUTEGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory served by the `echo.files` route
    #[arg(long, global = true, default_value = ".")]
    pub static_root: PathBuf,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the routing table
    Routes,

    /// Dispatch one request and write the HTTP response to stdout
    Request {
        /// HTTP method (GET, PUT, POST, DELETE)
        method: String,

        /// Request target, e.g. `/user/bob?x=1`
        target: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body; also declares Content-Length unless a header does
        #[arg(short, long)]
        body: Option<String>,

        /// Client address the request appears to come from
        #[arg(long, default_value = "127.0.0.1:50000")]
        client: SocketAddr,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    let config = match path {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let config = RouterConfig::from_env();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

/// Build the dispatcher the CLI uses.
///
/// # Errors
///
/// Fails on an invalid demo route or rate limit configuration.
pub fn build_dispatcher(config: &RouterConfig, static_root: &Path) -> anyhow::Result<Dispatcher> {
    let mut router = Router::new();
    router.register_resource(demo_resource(static_root))?;
    Ok(Dispatcher::from_config(router, config)?)
}

fn parse_header(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("invalid header '{raw}', expected 'Name: value'"),
    }
}

/// Run a parsed command, writing its output to `out`.
///
/// # Errors
///
/// Configuration, argument and I/O errors.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Routes => {
            let dispatcher = build_dispatcher(&config, &cli.static_root)?;
            out.write_all(dispatcher.router().dump_routes().as_bytes())?;
        }
        Commands::Request {
            method,
            target,
            headers,
            body,
            client,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid method '{method}'"))?;
            let dispatcher = build_dispatcher(&config, &cli.static_root)?;

            let mut request = Request::new(*client, method, target);
            for raw in headers {
                let (name, value) = parse_header(raw)?;
                request.headers.append(name, value);
            }
            if let Some(body) = body {
                if !request.headers.contains("Content-Length") {
                    request.headers.insert("Content-Length", body.len().to_string());
                }
                request = request.with_body_bytes(body.clone().into_bytes());
            }

            let started = Instant::now();
            let rendered = dispatcher.dispatch(&mut request);
            if let WriteOutcome::Aborted { bytes_written } =
                write_response(out, rendered, &request, started)?
            {
                info!(bytes_written, "Output closed before the response was written");
            }
        }
        Commands::Config => {
            let text = toml::to_string_pretty(&config)?;
            out.write_all(text.as_bytes())?;
        }
    }
    Ok(())
}

/// Parse arguments and run against stdout.
///
/// # Errors
///
/// See [`run`].
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)
}
