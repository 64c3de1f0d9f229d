use std::sync::Arc;

use anyhow::Context;
use gopherd::config::Config;
use gopherd::confine::ServedRoot;
use gopherd::{privilege, server};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    // capabilities are per thread: settle them before the runtime starts
    let privilege = privilege::restrict().context("cannot restrict capabilities")?;

    let root = ServedRoot::establish(&cfg.root_dir, cfg.confinement)
        .with_context(|| format!("cannot confine to {}", cfg.root_dir.display()))?;
    let listener = server::listener::bind(&cfg)?;

    privilege::shed(&privilege).context("cannot drop capabilities")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;

    runtime.block_on(async {
        tokio::select! {
            res = server::listener::run(listener, Arc::new(root), cfg.io_timeout) => {
                res?;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
            }
        }

        Ok::<_, anyhow::Error>(())
    })
}
