use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{AppError, AppResult};

use super::protocol::BridgeResponse;

/// Line-delimited JSON over any async reader/writer pair (stdio in production).
pub struct NdjsonIo<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R, W> NdjsonIo<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    /// Next line without its terminator; `None` at EOF, empty for blank lines.
    pub async fn read_line(&mut self) -> AppResult<Option<String>> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = self.line.trim_end_matches(&['\r', '\n'][..]);
        if line.trim().is_empty() {
            return Ok(Some(String::new()));
        }
        Ok(Some(line.to_string()))
    }

    pub async fn write_json_line<T: serde::Serialize>(&mut self, v: &T) -> AppResult<()> {
        let mut buf = serde_json::to_vec(v)?;
        buf.push(b'\n');
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Answers a line that could not be parsed as a request.
    pub async fn protocol_error(&mut self, id: String, v: u32, msg: String) -> AppResult<()> {
        let code = AppError::InvalidRequest(String::new()).code();
        let resp = BridgeResponse::<()>::err(v, id, code, msg);
        self.write_json_line(&resp).await
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }
}
