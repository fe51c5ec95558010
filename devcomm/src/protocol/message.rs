/// Requests a participant sends to the rendezvous store.
///
/// Values are opaque bytes. Counters (used by `Add` and `WaitUntil`) are
/// stored as 8-byte little-endian `u64`.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// Store `value` under `key`, overwriting silently.
    Set { key: String, value: Vec<u8> },

    /// Block until `key` is present, then return its value.
    Get { key: String },

    /// Atomically add `amount` to the counter under `key` (absent = 0)
    /// and return the new value.
    Add { key: String, amount: u64 },

    /// Block until the counter under `key` is at least `target`.
    WaitUntil { key: String, target: u64 },

    /// Remove `key`. Removing an absent key is not an error.
    Delete { key: String },

    /// Non-blocking presence test.
    Check { key: String },

    /// Non-blocking lookup: `Value` if present, `Found { present: false }` if not.
    TryGet { key: String },
}

impl StoreRequest {
    /// Key the request addresses.
    pub fn key(&self) -> &str {
        match self {
            StoreRequest::Set { key, .. }
            | StoreRequest::Get { key }
            | StoreRequest::Add { key, .. }
            | StoreRequest::WaitUntil { key, .. }
            | StoreRequest::Delete { key }
            | StoreRequest::Check { key }
            | StoreRequest::TryGet { key } => key,
        }
    }
}

/// The store's answer to a single request.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum StoreResponse {
    Ok,
    Value { value: Vec<u8> },
    Counter { value: u64 },
    Found { present: bool },
    Error { reason: String },
}
