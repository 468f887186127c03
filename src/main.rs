//! swcache CLI - drive the cache engine from a terminal.
//!
//! Each invocation builds an engine over the on-disk cache, dispatches one
//! event and exits. Useful for precaching a deploy, inspecting the stores,
//! and replaying queued mutations by hand.

use std::io;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::Method;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swcache::network::HttpFetcher;
use swcache::platform::LogPlatform;
use swcache::{Config, Engine, Request};

const USAGE: &str = "\
Usage: swcache <command> [args]

Commands:
  install                       Precache the static manifest for this version
  deploy                        Install, then activate (removes superseded versions)
  fetch <url> [method] [body]   Route one request through the engine
  sync [tag]                    Fire a background sync event (default: reconnect tag)
  periodic [tag]                Fire a periodic sync event (default: refresh tag)
  push <json>                   Deliver a push payload and open its target
  status                        Show cache generations and queued mutations";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    info!(cache_dir = %cache_dir.display(), version = %config.version, "swcache starting");

    let engine = Engine::new(
        config,
        cache_dir,
        Arc::new(HttpFetcher::new()?),
        Arc::new(LogPlatform),
    )?;

    match command.as_str() {
        "install" => {
            engine.on_install().await?;
            eprintln!("Installed {}", engine.config().static_cache_name());
        }
        "deploy" => {
            engine.on_install().await?;
            let report = engine.on_activate().await?;
            eprintln!("Activated {}", engine.config().static_cache_name());
            for name in report.deleted {
                eprintln!("  removed {}", name);
            }
        }
        "fetch" => fetch(&engine, &args[1..]).await?,
        "sync" => {
            let tag = args.get(1).unwrap_or(&engine.config().sync_tag);
            match engine.on_sync(tag).await? {
                Some(report) => eprintln!(
                    "Replayed {} mutation(s), {} still queued",
                    report.replayed, report.remaining
                ),
                None => eprintln!("Ignored unknown sync tag: {}", tag),
            }
        }
        "periodic" => {
            let tag = args.get(1).unwrap_or(&engine.config().refresh_tag);
            match engine.on_periodic_trigger(tag).await? {
                Some(report) => eprintln!(
                    "Refreshed {} cached response(s), {} failed",
                    report.refreshed, report.failed
                ),
                None => eprintln!("Ignored unknown periodic tag: {}", tag),
            }
        }
        "push" => {
            let payload = args.get(1).context("push requires a JSON payload")?;
            let notification = engine.on_push(payload.as_bytes())?;
            println!("{}", serde_json::to_string_pretty(&notification)?);
            engine.on_notification_click(&notification).await?;
        }
        "status" => status(&engine).await?,
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            bail!("unknown command: {}", other);
        }
    }

    Ok(())
}

async fn fetch(engine: &Engine, args: &[String]) -> Result<()> {
    let Some(target) = args.first() else {
        bail!("fetch requires a url");
    };
    let url = engine.config().resolve(target)?;
    let method = match args.get(1) {
        Some(m) => Method::from_str(&m.to_ascii_uppercase())
            .with_context(|| format!("Invalid method: {}", m))?,
        None => Method::GET,
    };

    let mut request = Request::new(method, url);
    if let Some(body) = args.get(2) {
        request = request
            .with_header("Content-Type", "application/json")
            .with_body(body.as_bytes());
    }

    let response = engine.route(&request).await?;
    eprintln!("{} {}", response.status, request.url);
    for (name, value) in &response.headers {
        eprintln!("{}: {}", name, value);
    }
    println!("{}", response.text());
    Ok(())
}

async fn status(engine: &Engine) -> Result<()> {
    let summaries = engine.cache_summary().await?;
    if summaries.is_empty() {
        println!("No cache generations");
    }
    for summary in summaries {
        println!(
            "{:<32} {:>5} entries  updated {}",
            summary.name,
            summary.entries,
            summary.newest.as_deref().unwrap_or("never")
        );
    }

    let pending = engine.pending_mutations().await?;
    println!("{} queued mutation(s)", pending.len());
    for mutation in pending {
        println!("  #{} {} (queued {})", mutation.id, mutation.identity(), mutation.queued_at);
    }
    Ok(())
}
