//! DAP wire protocol codec
//!
//! Every DAP message is a JSON body preceded by HTTP-style headers:
//! ```text
//! Content-Length: <byte-length>\r\n
//! \r\n
//! <JSON body>
//! ```

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Upper bound on a single message body
const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length:";

fn eof_as_crash(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::AdapterCrashed
    } else {
        Error::Io(e)
    }
}

/// Consume the header block and return the announced body length
async fn read_content_length<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<usize, Error> {
    let mut content_length = None;
    let mut seen_header = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await.map_err(eof_as_crash)? == 0 {
            return Err(Error::AdapterCrashed);
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            // Blank lines before the first header are tolerated
            if seen_header {
                break;
            }
            continue;
        }
        seen_header = true;

        // Other headers (Content-Type) are ignored
        if let Some(value) = header.strip_prefix(CONTENT_LENGTH) {
            let value = value.trim();
            let len = value
                .parse::<usize>()
                .map_err(|_| Error::DapProtocol(format!("Invalid Content-Length: {value}")))?;
            content_length = Some(len);
        }
    }

    let len = content_length
        .ok_or_else(|| Error::DapProtocol("Missing Content-Length header".to_string()))?;
    if len > MAX_MESSAGE_LEN {
        return Err(Error::DapProtocol(format!(
            "Content-Length too large: {len} bytes"
        )));
    }
    Ok(len)
}

/// Read one DAP message body from the stream
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    let len = read_content_length(reader).await?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(eof_as_crash)?;

    String::from_utf8(body).map_err(|e| Error::DapProtocol(format!("Invalid UTF-8: {e}")))
}

/// Frame a JSON body with its header and write it to the stream
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<(), Error> {
    let framed = format!("{CONTENT_LENGTH} {}\r\n\r\n{json}", json.len());
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    fn reader(data: &[u8]) -> BufReader<Cursor<Vec<u8>>> {
        BufReader::new(Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn test_reads_consecutive_messages() {
        let mut r = reader(b"Content-Length: 2\r\n\r\n{}Content-Length: 7\r\n\r\n{\"a\":1}");
        assert_eq!(read_message(&mut r).await.unwrap(), "{}");
        assert_eq!(read_message(&mut r).await.unwrap(), "{\"a\":1}");
        assert!(matches!(
            read_message(&mut r).await,
            Err(Error::AdapterCrashed)
        ));
    }

    #[tokio::test]
    async fn test_ignores_content_type_header() {
        let mut r = reader(
            b"Content-Type: application/vscode-jsonrpc\r\nContent-Length: 4\r\n\r\nnull",
        );
        assert_eq!(read_message(&mut r).await.unwrap(), "null");
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut r = reader(b"Content-Type: text\r\n\r\n{}");
        let err = read_message(&mut r).await.unwrap_err();
        assert!(matches!(err, Error::DapProtocol(m) if m.contains("Missing")));
    }

    #[tokio::test]
    async fn test_truncated_body_is_a_crash() {
        let mut r = reader(b"Content-Length: 40\r\n\r\n{\"seq\":1");
        assert!(matches!(
            read_message(&mut r).await,
            Err(Error::AdapterCrashed)
        ));
    }

    #[tokio::test]
    async fn test_write_message_frames_body() {
        let mut output = Vec::new();
        write_message(&mut output, "{\"seq\":1}").await.unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Content-Length: 9\r\n\r\n{\"seq\":1}"
        );
    }
}
