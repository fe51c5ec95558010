use cudarc::nccl::result::NcclError;
use devcomm::CommError;

/// A failed NCCL library call.
#[derive(Debug, thiserror::Error)]
pub enum NcclTransportError {
    #[error("NCCL {call} failed: {code:?}")]
    Call { call: &'static str, code: NcclError },
}

impl From<NcclTransportError> for CommError {
    fn from(e: NcclTransportError) -> Self {
        CommError::transport_with_source(e.to_string(), e)
    }
}

/// Map a failed NCCL call to a transport error naming the call.
pub(crate) fn nccl_call(call: &'static str) -> impl FnOnce(NcclError) -> CommError {
    move |code| NcclTransportError::Call { call, code }.into()
}
