//! Newline-delimited framing over any tokio byte stream

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::sync::Mutex;
use tracing::trace;

use super::{Transport, check_frame};
use crate::error::TransportError;

/// One message per line. Blank lines are skipped and a trailing `\r` is tolerated.
pub struct LineTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    // tokio's mutex is fair, so queued senders write in the order they called `send`
    writer: Mutex<Option<W>>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(Some(writer)),
        }
    }
}

impl LineTransport<Stdin, Stdout> {
    /// The process's stdin/stdout, as used by servers launched as subprocesses
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        check_frame(&frame)?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        let mut line = frame.into_bytes();
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await?;
            if read == 0 {
                return Ok(None);
            }
            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }
            if buf.iter().all(u8::is_ascii_whitespace) {
                trace!("skipping blank line");
                continue;
            }
            return String::from_utf8(buf)
                .map(Some)
                .map_err(|_| TransportError::InvalidUtf8);
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_cross_a_duplex_pipe() {
        let (a, b) = duplex(1024);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        let left = LineTransport::new(a_read, a_write);
        let right = LineTransport::new(b_read, b_write);

        left.send(r#"{"jsonrpc":"2.0","method":"one"}"#.to_string()).await.unwrap();
        left.send(r#"{"jsonrpc":"2.0","method":"two"}"#.to_string()).await.unwrap();

        assert_eq!(
            right.receive().await.unwrap().as_deref(),
            Some(r#"{"jsonrpc":"2.0","method":"one"}"#)
        );
        assert_eq!(
            right.receive().await.unwrap().as_deref(),
            Some(r#"{"jsonrpc":"2.0","method":"two"}"#)
        );
    }

    #[tokio::test]
    async fn test_embedded_newline_is_rejected() {
        let (a, _b) = duplex(64);
        let (read, write) = tokio::io::split(a);
        let transport = LineTransport::new(read, write);
        let err = transport.send("{\n}".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::EmbeddedDelimiter));
    }

    #[tokio::test]
    async fn test_crlf_and_blank_lines() {
        let input: &[u8] = b"\r\n{\"a\":1}\r\n\n{\"b\":2}\n";
        let transport = LineTransport::new(input, tokio::io::sink());
        assert_eq!(transport.receive().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.receive().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_signals_end_of_stream_to_peer() {
        let (a, b) = duplex(64);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        let left = LineTransport::new(a_read, a_write);
        let right = LineTransport::new(b_read, b_write);

        left.close().await.unwrap();
        left.close().await.unwrap();
        assert_eq!(right.receive().await.unwrap(), None);
        assert!(matches!(
            left.send("{}".to_string()).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_reported_and_skipped() {
        let input: &[u8] = b"\xff\xfe\n{\"ok\":true}\n";
        let transport = LineTransport::new(input, tokio::io::sink());
        let err = transport.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUtf8));
        assert!(err.is_frame_local());
        assert_eq!(
            transport.receive().await.unwrap().as_deref(),
            Some("{\"ok\":true}")
        );
    }
}
