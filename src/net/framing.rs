//! Length-prefixed JSON framing for controller connections
//!
//! Frame format: [4 bytes little-endian length][UTF-8 JSON payload]

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read one frame's payload
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(stream, &mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }

    let mut buf = vec![0u8; len];
    if len > 0 {
        read_exact_or_closed(stream, &mut buf).await?;
    }
    Ok(buf)
}

/// Write one frame and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }

    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read a frame and decode it as JSON
pub async fn read_json<T, R>(stream: &mut R) -> Result<T, FramingError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let payload = read_message(stream).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Encode a value as JSON and write it as one frame
pub async fn write_json<T, W>(stream: &mut W, value: &T) -> Result<(), FramingError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(value)?;
    write_message(stream, &payload).await
}

async fn read_exact_or_closed<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
) -> Result<(), FramingError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(FramingError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_json_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let sent = json!({"command": "get_environment", "args": {}});
        write_json(&mut client, &sent).await.unwrap();

        let received: Value = read_json(&mut server).await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_frames_stay_separate() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        for i in 0..3 {
            write_json(&mut client, &json!({ "n": i })).await.unwrap();
        }
        for i in 0..3 {
            let value: Value = read_json(&mut server).await.unwrap();
            assert_eq!(value["n"], i);
        }
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let result = read_message(&mut server).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let large = vec![b' '; MAX_MESSAGE_SIZE + 1];
        let mut buffer = Vec::new();

        let result = write_message(&mut buffer, &large).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&((MAX_MESSAGE_SIZE as u32) + 1).to_le_bytes());

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_le_bytes());
        buffer.extend_from_slice(b"{}");

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, b"{not json").await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let result: Result<Value, _> = read_json(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::Json(_))));
    }
}
