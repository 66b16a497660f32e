//! Pomocache - runs the Pomodoro app's offline worker from a terminal.
//!
//! Each invocation opens the worker over the on-disk caches, delivers one
//! event to it and waits for any background work before exiting.

mod host;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pomocache_core::{
    Config, Destination, Host, HttpNetwork, Method, OfflineWorker, Request, Response, SessionKind,
};

use host::{LogClients, LogNotifier};

const USAGE: &str = "\
Usage: pomocache <command> [args]

Commands:
  init                          Write the current settings to the config file
  install                       Precache the app shell and activate
  activate                      Remove caches from older versions
  fetch <destination> <url>     Answer a GET the way the app would see it
  send <method> <url> [body]    Send an API write, queueing it when offline
  replay                        Retry queued API writes
  sync [tag]                    Deliver a background sync event
  push [json]                   Show a push notification (payload from arg or stdin)
  session <kind>                Notify that a timer session finished
  status                        Print worker state as JSON

Environment:
  POMOCACHE_ORIGIN              App origin (overrides config)
  POMOCACHE_DATA_DIR            Cache and queue directory (overrides config)
  RUST_LOG                      Log filter (default: warn)";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    if let Ok(origin) = std::env::var("POMOCACHE_ORIGIN") {
        config.origin = origin;
    }
    if let Ok(dir) = std::env::var("POMOCACHE_DATA_DIR") {
        config.data_dir = Some(PathBuf::from(dir));
    }
    Ok(config)
}

fn open_worker(config: Config) -> Result<OfflineWorker> {
    let network = HttpNetwork::new(
        config.origin_url()?,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let host = Host::new(
        Arc::new(network),
        Arc::new(LogClients::default()),
        Arc::new(LogNotifier),
    );
    OfflineWorker::open(config, host)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_response(response: &Response) -> Result<()> {
    eprintln!("HTTP {}", response.status);
    for (name, value) in &response.headers {
        eprintln!("{}: {}", name, value);
    }
    let mut stdout = io::stdout();
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument <{}>\n\n{}", name, USAGE))
}

async fn run(worker: &OfflineWorker, args: &[String]) -> Result<()> {
    let command = arg(args, 1, "command")?;
    match command {
        "install" => {
            let count = worker.install().await?;
            worker.activate().await?;
            info!(count, "Installed");
            print_json(&worker.status())?;
        }
        "activate" => {
            let removed = worker.activate().await?;
            print_json(&removed)?;
        }
        "fetch" => {
            let destination: Destination = arg(args, 2, "destination")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let url = arg(args, 3, "url")?;
            let response = worker.fetch(Request::get(url, destination)).await;
            print_response(&response)?;
        }
        "send" => {
            let method: Method = arg(args, 2, "method")?.parse().map_err(|e: String| anyhow!(e))?;
            let url = arg(args, 3, "url")?;
            let mut request = Request::new(method, url);
            if let Some(body) = args.get(4) {
                request = request
                    .with_header("content-type", "application/json")
                    .with_body(body.as_str());
            }
            let response = worker.fetch(request).await;
            print_response(&response)?;
        }
        "replay" => {
            let summary = worker.online().await?;
            print_json(&summary)?;
        }
        "sync" => {
            let tag = args.get(2).map(String::as_str).unwrap_or(worker.queue().name());
            let summary = worker.sync(tag).await?;
            print_json(&summary)?;
        }
        "push" => {
            let payload = match args.get(2) {
                Some(json) => Some(json.clone().into_bytes()),
                None => {
                    let mut buf = Vec::new();
                    io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read push payload from stdin")?;
                    (!buf.is_empty()).then_some(buf)
                }
            };
            let notification = worker.push(payload.as_deref()).await?;
            print_json(&notification)?;
        }
        "session" => {
            let kind: SessionKind = arg(args, 2, "kind")?.parse().map_err(|e: String| anyhow!(e))?;
            let notification = worker.notify_session_complete(kind).await?;
            print_json(&notification)?;
        }
        "status" => print_json(&worker.status())?,
        "help" | "--help" | "-h" => println!("{}", USAGE),
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    let config = load_config()?;
    if args[1] == "init" {
        let path = config.save()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    info!(origin = %config.origin, version = %config.version, "Pomocache starting");
    let worker = open_worker(config)?;

    let result = run(&worker, &args).await;
    let settled = worker.settle().await;
    if settled > 0 {
        info!(settled, "Background work finished");
    }
    result
}
