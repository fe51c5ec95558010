pub(crate) mod codec;
pub(crate) mod header;
mod message;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_frame, write_frame,
};
pub use header::{HEADER_SIZE, Header, MessageType, PROTOCOL_VERSION};
pub use message::{StoreRequest, StoreResponse};
