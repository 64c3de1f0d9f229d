use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::confine::ServedRoot;
use crate::gopher::resolver::{Resolution, resolve};
use crate::gopher::response::{Outcome, stream_response};
use crate::gopher::selector::{MAX_SELECTOR_LEN, Selector, parse_selector};

/// Handles exactly one request on one stream.
pub struct Connection<S> {
    stream: S,
    root: Arc<ServedRoot>,
    io_timeout: Option<Duration>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Resolving(Selector),
    Streaming(Resolution),
    Closed,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, root: Arc<ServedRoot>, io_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            root,
            io_timeout,
            state: ConnectionState::Reading,
        }
    }

    /// Runs the request to completion and closes the stream.
    ///
    /// Consumes the connection, so the stream is released exactly once on
    /// every path. Returns the outcome for a response that was fully written.
    pub async fn run(mut self) -> anyhow::Result<Outcome> {
        let outcome = self.drive().await?;

        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(error = %e, "shutdown after response failed");
        }

        Ok(outcome)
    }

    async fn drive(&mut self) -> anyhow::Result<Outcome> {
        let mut outcome = Outcome::Invalid;

        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    let selector = self.read_selector().await?;
                    self.state = ConnectionState::Resolving(selector);
                }

                ConnectionState::Resolving(selector) => {
                    let resolution = resolve(&self.root, &selector).await;
                    tracing::debug!(%selector, ?resolution, "resolved");
                    self.state = ConnectionState::Streaming(resolution);
                }

                ConnectionState::Streaming(resolution) => {
                    outcome = with_deadline(
                        self.io_timeout,
                        stream_response(&mut self.stream, &self.root, &resolution),
                    )
                    .await
                    .context("writing response")?;
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => break,
            }
        }

        Ok(outcome)
    }

    async fn read_selector(&mut self) -> anyhow::Result<Selector> {
        let mut buf = BytesMut::with_capacity(MAX_SELECTOR_LEN);
        let mut limited = (&mut self.stream).take(MAX_SELECTOR_LEN as u64);

        let n = with_deadline(self.io_timeout, limited.read_buf(&mut buf))
            .await
            .context("reading selector")?;

        let selector = parse_selector(&buf);
        tracing::info!(bytes = n, %selector, "received");
        Ok(selector)
    }
}

async fn with_deadline<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection deadline exceeded"))?,
        None => fut.await,
    }
}
