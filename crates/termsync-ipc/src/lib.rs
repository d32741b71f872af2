#![deny(clippy::all)]

mod error;
pub mod framing;
mod message;
mod snapshot_dto;
mod socket;
mod status_dto;

pub use termsync_common::error_codes;

pub use error::IpcError;
pub use framing::DEFAULT_MAX_FRAME_BYTES;
pub use framing::read_frame;
pub use framing::write_frame;
pub use message::BroadcastMessage;
pub use message::MessageKind;
pub use snapshot_dto::ActivityDto;
pub use snapshot_dto::SnapshotDto;
pub use snapshot_dto::TerminalDto;
pub use socket::socket_path;
pub use status_dto::SessionInfoResponse;
pub use status_dto::StatusResponse;

pub type Result<T> = std::result::Result<T, IpcError>;
