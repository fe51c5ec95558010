use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{CommError, Result};
use crate::protocol::header::{HEADER_SIZE, Header, MessageType, PROTOCOL_VERSION};
use crate::protocol::message::{StoreRequest, StoreResponse};

/// Upper bound on a single store payload. The store only carries small
/// coordination values; anything larger is a corrupt or foreign stream.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Encode a `StoreRequest` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_request(msg: &StoreRequest) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| CommError::EncodeFailed(e.to_string()))?;
    frame(MessageType::Request, &payload)
}

/// Encode a `StoreResponse` into a framed byte buffer.
pub fn encode_response(msg: &StoreResponse) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| CommError::EncodeFailed(e.to_string()))?;
    frame(MessageType::Response, &payload)
}

/// Decode a framed request.
pub fn decode_request(buf: &[u8]) -> Result<StoreRequest> {
    let payload = aligned_payload(buf, MessageType::Request)?;
    rkyv::from_bytes::<StoreRequest, rkyv::rancor::Error>(&payload)
        .map_err(|e| CommError::DecodeFailed(e.to_string()))
}

/// Decode a framed response.
pub fn decode_response(buf: &[u8]) -> Result<StoreResponse> {
    let payload = aligned_payload(buf, MessageType::Response)?;
    rkyv::from_bytes::<StoreResponse, rkyv::rancor::Error>(&payload)
        .map_err(|e| CommError::DecodeFailed(e.to_string()))
}

/// Read one complete frame (header and payload) from a stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = Header::decode(&header_buf)
        .ok_or_else(|| CommError::DecodeFailed("invalid header: unknown message type".into()))?;

    let payload_len = header.payload_length as usize;
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(CommError::DecodeFailed(format!(
            "payload of {payload_len} bytes exceeds limit of {MAX_PAYLOAD_BYTES}"
        )));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len);
    buf.extend_from_slice(&header_buf);
    buf.resize(HEADER_SIZE + payload_len, 0);
    reader.read_exact(&mut buf[HEADER_SIZE..]).await?;
    Ok(buf)
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> Result<()> {
    writer.write_all(buf).await?;
    writer.flush().await?;
    Ok(())
}

fn frame(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(CommError::EncodeFailed(format!(
            "payload of {} bytes exceeds limit of {MAX_PAYLOAD_BYTES}",
            payload.len()
        )));
    }
    let header = Header::new(message_type, payload.len() as u32);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Validate the header and copy the payload into an aligned buffer for rkyv.
fn aligned_payload(buf: &[u8], expected: MessageType) -> Result<rkyv::util::AlignedVec> {
    if buf.len() < HEADER_SIZE {
        return Err(CommError::DecodeFailed(format!(
            "buffer too short: {} < {HEADER_SIZE}",
            buf.len()
        )));
    }

    let header_bytes: &[u8; HEADER_SIZE] = buf[..HEADER_SIZE]
        .try_into()
        .map_err(|_| CommError::DecodeFailed("header slice length mismatch".into()))?;
    let header = Header::decode(header_bytes)
        .ok_or_else(|| CommError::DecodeFailed("invalid header: unknown message type".into()))?;

    if header.version != PROTOCOL_VERSION {
        return Err(CommError::DecodeFailed(format!(
            "protocol version mismatch: local={PROTOCOL_VERSION}, remote={}",
            header.version
        )));
    }
    if header.message_type != expected {
        return Err(CommError::DecodeFailed(format!(
            "expected {expected:?} frame, got {:?}",
            header.message_type
        )));
    }

    let payload_end = HEADER_SIZE + header.payload_length as usize;
    if buf.len() < payload_end {
        return Err(CommError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    let mut aligned = rkyv::util::AlignedVec::with_capacity(payload_end - HEADER_SIZE);
    aligned.extend_from_slice(&buf[HEADER_SIZE..payload_end]);
    Ok(aligned)
}
