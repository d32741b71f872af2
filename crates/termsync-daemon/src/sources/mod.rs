//! External sources of truth polled by the reconciler.

mod http;

use async_trait::async_trait;
use termsync_ipc::{SessionInfoResponse, StatusResponse};

use crate::error::QueryError;

pub use http::HttpSidecar;

/// Activity status for the agent running in a working directory.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(
        &self,
        working_dir: &str,
        session_name: Option<&str>,
    ) -> Result<StatusResponse, QueryError>;
}

/// Display metadata for a backing session.
#[async_trait]
pub trait SessionMetadataSource: Send + Sync {
    async fn session_info(&self, session_name: &str) -> Result<SessionInfoResponse, QueryError>;
}
