use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::confine::ServedRoot;
use crate::gopher::resolver::Resolution;

/// Gopher error menu line sent for any unusable selector.
pub const ERROR_LINE: &[u8] = b"3Invalid input\tfake\t(NULL)\t0";

/// Last line of every response.
pub const TERMINATOR: &[u8] = b".\r\n";

const CRLF: &[u8] = b"\r\n";

/// How a response body was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Served { lines: usize },
    /// Selector resolved to nothing.
    Invalid,
    /// Target existed but could not be opened.
    Unreadable,
}

/// Removes one trailing `\n`, and a `\r` right before it.
///
/// A line without `\n` is returned unchanged, even if it ends in `\r`.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(body) => body.strip_suffix(b"\r").unwrap_or(body),
        None => line,
    }
}

/// Writes CRLF-terminated lines followed by the terminator.
pub struct ResponseWriter<W: AsyncWrite + Unpin> {
    out: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    pub async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.out.write_all(strip_line_ending(line)).await?;
        self.out.write_all(CRLF).await
    }

    pub async fn write_error(&mut self) -> io::Result<()> {
        self.write_line(ERROR_LINE).await
    }

    /// Copies every line of `reader`, however long, and returns how many.
    ///
    /// Only write failures are returned. A read failure before the first line
    /// becomes the error line and yields `None`; after that the body is cut
    /// short.
    pub async fn copy_lines<R>(&mut self, mut reader: R) -> io::Result<Option<usize>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        let mut copied = 0;

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => return Ok(Some(copied)),
                Ok(_) => {
                    self.write_line(&line).await?;
                    copied += 1;
                }
                Err(e) if copied == 0 => {
                    tracing::warn!(error = %e, "cannot read target");
                    self.write_error().await?;
                    return Ok(None);
                }
                Err(e) => {
                    tracing::warn!(error = %e, lines = copied, "target read failed mid-body");
                    return Ok(Some(copied));
                }
            }
        }
    }

    /// Writes the terminator and flushes.
    pub async fn finish(mut self) -> io::Result<W> {
        self.out.write_all(TERMINATOR).await?;
        self.out.flush().await?;
        Ok(self.out.into_inner())
    }
}

/// Streams the full response for `resolution` to `out`.
///
/// The terminator is always written last. Errors are socket write failures.
pub async fn stream_response<W>(
    out: W,
    root: &ServedRoot,
    resolution: &Resolution,
) -> io::Result<Outcome>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = ResponseWriter::new(out);

    let outcome = match resolution.target(root) {
        None => {
            tracing::warn!("invalid input");
            writer.write_error().await?;
            Outcome::Invalid
        }
        Some(path) => match root.open(&path).await {
            Ok(file) => match writer.copy_lines(BufReader::new(file)).await? {
                Some(lines) => Outcome::Served { lines },
                None => Outcome::Unreadable,
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot open target");
                writer.write_error().await?;
                Outcome::Unreadable
            }
        },
    };

    writer.finish().await?;
    Ok(outcome)
}
