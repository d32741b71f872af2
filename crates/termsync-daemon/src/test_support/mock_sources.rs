//! Scripted status sidecar.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use termsync_ipc::{SessionInfoResponse, StatusResponse};

use crate::error::QueryError;
use crate::sources::{SessionMetadataSource, StatusSource};

#[derive(Default)]
struct Script {
    statuses: HashMap<String, String>,
    titles: HashMap<String, String>,
    failing: HashSet<String>,
    slow: HashMap<String, Duration>,
}

/// Answers both sidecar endpoints from in-memory tables keyed by working
/// directory (status) and session name (metadata).
#[derive(Default)]
pub struct MockSidecar {
    script: Mutex<Script>,
    status_calls: AtomicUsize,
    info_calls: AtomicUsize,
}

impl MockSidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, working_dir: &str, status: &str) {
        self.script
            .lock()
            .unwrap()
            .statuses
            .insert(working_dir.to_string(), status.to_string());
    }

    pub fn set_title(&self, session_name: &str, title: &str) {
        self.script
            .lock()
            .unwrap()
            .titles
            .insert(session_name.to_string(), title.to_string());
    }

    /// Every query keyed by `key` (directory or session) fails.
    pub fn fail(&self, key: &str) {
        self.script.lock().unwrap().failing.insert(key.to_string());
    }

    pub fn heal(&self, key: &str) {
        self.script.lock().unwrap().failing.remove(key);
    }

    /// Every query keyed by `key` sleeps first.
    pub fn delay(&self, key: &str, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .slow
            .insert(key.to_string(), delay);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, key: &str) -> Result<(), QueryError> {
        let (delay, failing) = {
            let script = self.script.lock().unwrap();
            (script.slow.get(key).copied(), script.failing.contains(key))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(QueryError::Request(format!("scripted failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusSource for MockSidecar {
    async fn status(
        &self,
        working_dir: &str,
        _session_name: Option<&str>,
    ) -> Result<StatusResponse, QueryError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(working_dir).await?;
        let status = self.script.lock().unwrap().statuses.get(working_dir).cloned();
        match status {
            Some(status) => Ok(StatusResponse {
                success: true,
                status: Some(status),
                current_activity: None,
                last_updated: Some(1),
            }),
            None => Err(QueryError::Unsuccessful),
        }
    }
}

#[async_trait]
impl SessionMetadataSource for MockSidecar {
    async fn session_info(&self, session_name: &str) -> Result<SessionInfoResponse, QueryError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(session_name).await?;
        let title = self.script.lock().unwrap().titles.get(session_name).cloned();
        match title {
            Some(title) => Ok(SessionInfoResponse {
                success: true,
                display_title: Some(title),
                peer_window_count: Some(1),
            }),
            None => Err(QueryError::Unsuccessful),
        }
    }
}
