//! services/api/src/engine/registry.rs
//!
//! Tracks the lifecycle worker of every active session. An entry exists exactly
//! while its worker runs: it is inserted when the worker is spawned and removed
//! by the worker on exit (or by a cancel that takes it over).

use interview_core::domain::SessionStatus;
use interview_core::ports::DatabaseService;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::engine::lifecycle::lifecycle_process;

struct ActiveSession {
    cancellation_token: CancellationToken,
    handle: JoinHandle<SessionStatus>,
}

/// Cheap-to-clone map from session id to its running worker.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    active: Arc<Mutex<HashMap<String, ActiveSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the lifecycle worker for `session_id`. Does nothing if one is
    /// already running.
    pub async fn spawn_worker(
        &self,
        db: Arc<dyn DatabaseService>,
        session_id: &str,
        run_for: Duration,
    ) {
        // Held across the spawn so the worker cannot release before it is registered.
        let mut active = self.active.lock().await;
        if active.contains_key(session_id) {
            warn!(session_id = %session_id, "Lifecycle worker already running");
            return;
        }

        let cancellation_token = CancellationToken::new();
        let handle = tokio::spawn(lifecycle_process(
            db,
            self.clone(),
            session_id.to_string(),
            run_for,
            cancellation_token.clone(),
        ));
        active.insert(
            session_id.to_string(),
            ActiveSession {
                cancellation_token,
                handle,
            },
        );
    }

    /// Signals the worker's cancellation and waits for it to finish.
    /// Returns `None` when no worker is running for the session.
    pub async fn cancel(&self, session_id: &str) -> Option<SessionStatus> {
        let entry = self.active.lock().await.remove(session_id)?;
        entry.cancellation_token.cancel();
        match entry.handle.await {
            Ok(status) => Some(status),
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Lifecycle worker panicked");
                None
            }
        }
    }

    /// Called by a worker as it exits.
    pub(crate) async fn release(&self, session_id: &str) {
        self.active.lock().await.remove(session_id);
    }

    pub async fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().await.contains_key(session_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Stops every worker without persisting a status, so the sessions are
    /// picked up again on the next start.
    pub async fn abort_all(&self) {
        let drained: Vec<ActiveSession> = self.active.lock().await.drain().map(|(_, a)| a).collect();
        for active in drained {
            active.handle.abort();
        }
    }
}
