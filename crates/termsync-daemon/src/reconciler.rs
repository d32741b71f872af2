//! Periodic correction of the registry against the status sidecar.
//!
//! Each tick queries every terminal this window owns and has `Active`,
//! all at once, each query bounded by the query timeout. Differences are folded
//! back through the window handle, so they replicate like any local change.
//! A failed or slow terminal is skipped and retried on the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use termsync_core::{Activity, Snapshot, TerminalId, TerminalStatus, WindowId};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::LifecycleError;
use crate::sources::{SessionMetadataSource, StatusSource};
use crate::window::WindowHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub eligible: usize,
    pub corrected: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous tick was still polling.
    Skipped,
    Completed(TickReport),
    /// The window is gone.
    Stopped,
}

struct QueryTarget {
    id: TerminalId,
    working_dir: Option<String>,
    session_name: Option<String>,
}

/// What the sidecar said about one terminal. `None` fields had no answer.
#[derive(Debug)]
struct Observation {
    id: TerminalId,
    display_title: Option<String>,
    activity: Option<Activity>,
}

pub struct Reconciler {
    handle: WindowHandle,
    status: Arc<dyn StatusSource>,
    metadata: Arc<dyn SessionMetadataSource>,
    query_timeout: Duration,
    polling: AtomicBool,
}

/// Clears the single-flight flag on every exit path.
struct PollingGuard<'a>(&'a AtomicBool);

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new(
        handle: WindowHandle,
        status: Arc<dyn StatusSource>,
        metadata: Arc<dyn SessionMetadataSource>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            handle,
            status,
            metadata,
            query_timeout,
            polling: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ReconcilerState {
        if self.polling.load(Ordering::Acquire) {
            ReconcilerState::Polling
        } else {
            ReconcilerState::Idle
        }
    }

    /// Ticks every `interval` until the window stops.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = interval.as_millis() as u64, "Reconciler started");
        loop {
            ticker.tick().await;
            match self.tick().await {
                TickOutcome::Stopped => break,
                TickOutcome::Skipped => debug!("Reconcile tick skipped, previous still polling"),
                TickOutcome::Completed(report) => {
                    if report.corrected > 0 || report.failed > 0 {
                        debug!(?report, "Reconcile tick");
                    }
                }
            }
        }
        info!("Reconciler stopped");
    }

    pub async fn tick(&self) -> TickOutcome {
        if self
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return TickOutcome::Skipped;
        }
        let _guard = PollingGuard(&self.polling);

        let snapshot = match self.handle.get().await {
            Ok(snapshot) => snapshot,
            Err(_) => return TickOutcome::Stopped,
        };
        let targets = eligible(&snapshot, self.handle.window_id());
        let mut report = TickReport {
            eligible: targets.len(),
            ..TickReport::default()
        };
        if targets.is_empty() {
            return TickOutcome::Completed(report);
        }

        let results = join_all(targets.into_iter().map(|target| self.observe(target))).await;
        let observations: Vec<Observation> = results
            .into_iter()
            .filter_map(|result| {
                if result.is_none() {
                    report.failed += 1;
                }
                result
            })
            .collect();
        if observations.is_empty() {
            return TickOutcome::Completed(report);
        }

        let window = self.handle.window_id().clone();
        match self
            .handle
            .update(move |state| Ok(fold(state, &window, observations)))
            .await
        {
            Ok(corrected) => report.corrected = corrected,
            Err(LifecycleError::WindowClosed) => return TickOutcome::Stopped,
            Err(e) => debug!(error = %e, "Failed to apply corrections"),
        }
        TickOutcome::Completed(report)
    }

    /// Both queries for one terminal, concurrently, each under its own
    /// timeout. `None` means neither answered in time.
    async fn observe(&self, target: QueryTarget) -> Option<Observation> {
        let QueryTarget {
            id,
            working_dir,
            session_name,
        } = target;
        let timeout_ms = self.query_timeout.as_millis() as u64;

        let status = async {
            let dir = working_dir.as_deref()?;
            let query = self.status.status(dir, session_name.as_deref());
            match tokio::time::timeout(self.query_timeout, query).await {
                Ok(Ok(response)) => response.status.map(|state| Activity {
                    state,
                    current_activity: response.current_activity,
                    last_updated: response.last_updated,
                }),
                Ok(Err(e)) => {
                    debug!(terminal_id = %id, error = %e, "Status query failed");
                    None
                }
                Err(_) => {
                    debug!(terminal_id = %id, timeout_ms, "Status query timed out");
                    None
                }
            }
        };
        let metadata = async {
            let session = session_name.as_deref()?;
            let query = self.metadata.session_info(session);
            match tokio::time::timeout(self.query_timeout, query).await {
                Ok(Ok(response)) => response.display_title,
                Ok(Err(e)) => {
                    debug!(terminal_id = %id, error = %e, "Session info query failed");
                    None
                }
                Err(_) => {
                    debug!(terminal_id = %id, timeout_ms, "Session info query timed out");
                    None
                }
            }
        };

        match tokio::join!(status, metadata) {
            (None, None) => None,
            (activity, display_title) => Some(Observation {
                id: id.clone(),
                display_title,
                activity,
            }),
        }
    }
}

fn eligible(snapshot: &Snapshot, window: &WindowId) -> Vec<QueryTarget> {
    snapshot
        .owned_by(window)
        .filter(|t| t.status == TerminalStatus::Active)
        .filter(|t| t.working_dir.is_some() || t.session_name.is_some())
        .map(|t| QueryTarget {
            id: t.id.clone(),
            working_dir: t.working_dir.clone(),
            session_name: t.session_name.clone(),
        })
        .collect()
}

/// Applies observations that still match an owned, active terminal and
/// differ from it. Returns how many terminals changed.
fn fold(state: &mut Snapshot, window: &WindowId, observations: Vec<Observation>) -> usize {
    let mut corrected = 0;
    for observation in observations {
        let Some(terminal) = state.terminal_mut(&observation.id) else {
            continue;
        };
        if !terminal.is_owned_by(window) || terminal.status != TerminalStatus::Active {
            continue;
        }

        let mut changed = false;
        if let Some(title) = observation.display_title.filter(|t| !t.trim().is_empty()) {
            if terminal.auto_update_name && terminal.name != title {
                terminal.name = title;
                changed = true;
            }
        }
        if let Some(activity) = observation.activity {
            if terminal.activity.as_ref() != Some(&activity) {
                terminal.activity = Some(activity);
                changed = true;
            }
        }
        if changed {
            corrected += 1;
        }
    }
    corrected
}
