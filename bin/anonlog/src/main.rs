//! # anonlog
//!
//! Assembles the feed engine from the plugins selected at compile time and
//! drives it from a line-oriented prompt on stdin. Type `help` for commands.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use al_auth_simple::SimpleAuthProvider;
use al_feed::{FeedPorts, FeedService};
use al_store_memory::MemoryDocumentStore;
use configs::{AppConfig, LogConfig, LogFormat};

#[cfg(feature = "session-file")]
use al_session_file::FileSessionStore;

#[cfg(not(feature = "session-file"))]
use al_store_memory::MemorySessionStore;

mod repl;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    let store = Arc::new(MemoryDocumentStore::new());
    let auth = Arc::new(SimpleAuthProvider::new());

    #[cfg(feature = "session-file")]
    let session = Arc::new(FileSessionStore::new(&config.session.path));
    #[cfg(feature = "session-file")]
    tracing::debug!(path = %session.path().display(), "session file");
    #[cfg(not(feature = "session-file"))]
    let session = Arc::new(MemorySessionStore::new());

    let service = FeedService::start(
        config.feed_settings(),
        FeedPorts {
            store: store.clone(),
            profiles: store,
            auth: auth.clone(),
            session,
        },
    )
    .await
    .context("starting feed service")?;
    service.loaded().await;
    tracing::info!(id = %service.identity().id, "anonlog ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shell = repl::Shell::new(&service, &auth);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !shell.handle(&line).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
