//! services/api/src/engine/lifecycle.rs
//!
//! The per-session lifecycle worker. It waits on the session timer and the
//! session's cancellation token, persists whichever terminal status wins, and
//! releases its registry entry.

use interview_core::domain::SessionStatus;
use interview_core::ports::DatabaseService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::registry::SessionRegistry;

/// Drives one session from `created` to a terminal state.
///
/// Returns the status the worker tried to persist. Persistence failures are
/// logged and not retried.
pub async fn lifecycle_process(
    db: Arc<dyn DatabaseService>,
    registry: SessionRegistry,
    session_id: String,
    run_for: Duration,
    cancellation_token: CancellationToken,
) -> SessionStatus {
    info!(session_id = %session_id, run_for_ms = run_for.as_millis() as u64, "Lifecycle worker started");

    let outcome = tokio::select! {
        _ = tokio::time::sleep(run_for) => SessionStatus::Completed,
        _ = cancellation_token.cancelled() => SessionStatus::Canceled,
    };

    match db.transition_status(&session_id, outcome).await {
        Ok(true) => info!(session_id = %session_id, status = %outcome, "Session reached terminal state"),
        Ok(false) => warn!(
            session_id = %session_id,
            status = %outcome,
            "Session was no longer in the created state; status left unchanged"
        ),
        Err(e) => error!(session_id = %session_id, status = %outcome, error = %e, "Failed to persist session status"),
    }

    registry.release(&session_id).await;
    outcome
}
