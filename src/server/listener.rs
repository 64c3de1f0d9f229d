use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, warn};

use crate::config::Config;
use crate::confine::ServedRoot;
use crate::gopher::connection::Connection;

/// Binds the configured address outside the runtime.
///
/// Call only after the root is established, and before capabilities are shed
/// so low ports can still be bound.
pub fn bind(cfg: &Config) -> anyhow::Result<std::net::TcpListener> {
    let addr = cfg.listen_addr();
    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("cannot bind {}", addr))?;
    listener
        .set_nonblocking(true)
        .context("cannot make listener non-blocking")?;
    Ok(listener)
}

/// Registers a listener from [`bind`] with the runtime and serves forever.
pub async fn run(
    listener: std::net::TcpListener,
    root: Arc<ServedRoot>,
    io_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let listener = TcpListener::from_std(listener).context("cannot register listener")?;
    info!(
        "Listening on {} ({:?} confinement)",
        listener.local_addr()?,
        root.mode()
    );

    serve(listener, root, io_timeout).await
}

/// Accepts connections on `listener`, one worker task each.
///
/// There is no limit on in-flight workers. Finished ones are reaped after each
/// accept without waiting.
pub async fn serve(
    listener: TcpListener,
    root: Arc<ServedRoot>,
    io_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let mut workers = JoinSet::new();

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let root = Arc::clone(&root);
        workers.spawn(
            async move {
                let conn = Connection::new(socket, root, io_timeout);
                if let Err(e) = conn.run().await {
                    error!("Connection error from {}: {:#}", peer, e);
                }
            }
            .instrument(tracing::info_span!("conn", %peer)),
        );

        reap(&mut workers);
    }
}

fn reap(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.try_join_next() {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("worker panicked: {}", e);
            }
        }
    }
}
