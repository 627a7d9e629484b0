//! Newline-delimited JSON message sources.

use futures::{stream, Stream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// One payload per non-blank line of `reader`.
///
/// The stream ends at EOF or on the first read error (logged).
pub fn lines_source<R>(reader: R) -> impl Stream<Item = Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(reader.lines(), |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some((line.into_bytes(), lines)),
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read message line");
                    return None;
                }
            }
        }
    })
}

/// Messages piped to the process, one JSON object per line.
pub fn stdin_source() -> impl Stream<Item = Vec<u8>> {
    lines_source(BufReader::new(tokio::io::stdin()))
}
