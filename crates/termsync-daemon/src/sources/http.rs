use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use termsync_ipc::{SessionInfoResponse, StatusResponse};
use url::Url;

use super::{SessionMetadataSource, StatusSource};
use crate::error::QueryError;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// HTTP client for the status sidecar.
#[derive(Debug, Clone)]
pub struct HttpSidecar {
    client: Client,
    base: Url,
}

impl HttpSidecar {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        // localhost may resolve to ::1 first while the sidecar binds IPv4 only.
        let normalized = base_url.replace("://localhost", "://127.0.0.1");
        let base = Url::parse(&normalized).map_err(|e| QueryError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(QueryError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| QueryError::Request(e.to_string()))?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, QueryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| QueryError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, QueryError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl StatusSource for HttpSidecar {
    async fn status(
        &self,
        working_dir: &str,
        session_name: Option<&str>,
    ) -> Result<StatusResponse, QueryError> {
        let mut url = self.endpoint(&["api", "claude-status"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dir", working_dir);
            if let Some(session) = session_name {
                query.append_pair("sessionName", session);
            }
        }
        let response: StatusResponse = self.get_json(url).await?;
        if !response.success {
            return Err(QueryError::Unsuccessful);
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionMetadataSource for HttpSidecar {
    async fn session_info(&self, session_name: &str) -> Result<SessionInfoResponse, QueryError> {
        let url = self.endpoint(&["api", "tmux", "info", session_name])?;
        let response: SessionInfoResponse = self.get_json(url).await?;
        if !response.success {
            return Err(QueryError::Unsuccessful);
        }
        Ok(response)
    }
}
