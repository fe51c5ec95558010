/// Bytes in front of every store frame.
pub const HEADER_SIZE: usize = 8;

/// Bumped whenever `StoreRequest` or `StoreResponse` change shape.
pub const PROTOCOL_VERSION: u8 = 1;

/// Which of the two store messages a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        [MessageType::Request, MessageType::Response]
            .into_iter()
            .find(|t| *t as u8 == tag)
            .ok_or(tag)
    }
}

/// Frame prefix: payload length, message tag and sender version.
///
/// ```text
/// bytes 0..4  payload length, u32 little-endian
/// byte  4     message tag
/// byte  5     protocol version
/// bytes 6..8  zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_length: u32,
    pub message_type: MessageType,
    pub version: u8,
}

impl Header {
    pub fn new(message_type: MessageType, payload_length: u32) -> Self {
        Self {
            payload_length,
            message_type,
            version: PROTOCOL_VERSION,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let [a, b, c, d] = self.payload_length.to_le_bytes();
        [a, b, c, d, self.message_type as u8, self.version, 0, 0]
    }

    /// `None` when the tag byte names no known message.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let [a, b, c, d, tag, version, ..] = *buf;
        Some(Header {
            payload_length: u32::from_le_bytes([a, b, c, d]),
            message_type: MessageType::try_from(tag).ok()?,
            version,
        })
    }
}
