//! Frame codec and worker-protocol message taxonomy shared by the
//! provider scheduler and its worker processes.

pub mod frame;
pub mod protocol;

pub use frame::{DecodeEvent, Frame, FrameDecoder, MAX_BODY_LEN, MAX_COMMAND_LEN, MAX_HEADER_LEN};
pub use protocol::{
    code, AttachRequest, Capabilities, Code, ErrorReport, MessageError, ProvideRequestMsg,
    ProviderConfiguration, VerifyInfo, WorkerCaps, WorkerMessage, WorkerType,
};
