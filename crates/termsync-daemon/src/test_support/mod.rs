//! Test doubles for the transport and the external sources.

mod mock_sources;
mod mock_transport;

pub use mock_sources::MockSidecar;
pub use mock_transport::MockTransport;
