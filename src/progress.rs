//! Progress-callback trait for stage-level run events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to follow a run
//! as it moves through upload, extraction, analysis and the final stage.
//!
//! # Why callbacks instead of channels?
//!
//! A front-end may be a terminal spinner, a WebSocket or a test recorder. The
//! callback keeps the library ignorant of which. The trait is `Send + Sync`
//! because `on_tick` fires from the ticker task while the run itself is
//! awaiting the backend.
//!
//! # Example
//!
//! ```rust
//! use doclex::{PipelineProgressCallback, PipelineConfig, StageId};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: StageId, duration: Duration) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {} took {:?}", stage.label(), duration);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::AnalysisMode;
use crate::error::PipelineWarning;
use crate::stages::StageId;
use std::sync::Arc;
use std::time::Duration;

/// Called by the session as a run advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events of an abandoned run stop as soon as the
/// session notices the reset.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once, before the upload stage starts.
    fn on_run_start(&self, file_name: &str, mode: AnalysisMode) {
        let _ = (file_name, mode);
    }

    /// Called when `stage` becomes active.
    fn on_stage_start(&self, stage: StageId) {
        let _ = stage;
    }

    /// Called when `stage` completes.
    fn on_stage_complete(&self, stage: StageId, duration: Duration) {
        let _ = (stage, duration);
    }

    /// Called when `stage` fails; the run stops right after.
    ///
    /// # Arguments
    /// * `error`: the user-facing message of the failure
    fn on_stage_error(&self, stage: StageId, error: &str) {
        let _ = (stage, error);
    }

    /// Called for every non-fatal degradation.
    fn on_warning(&self, warning: &PipelineWarning) {
        let _ = warning;
    }

    /// Called on every ticker interval while a stage is active.
    ///
    /// # Arguments
    /// * `stage`  : the active stage
    /// * `elapsed`: total run time so far, including the live stage
    fn on_tick(&self, stage: StageId, elapsed: Duration) {
        let _ = (stage, elapsed);
    }

    /// Called once after the last stage completed.
    fn on_run_complete(&self, total: Duration) {
        let _ = total;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// `PipelineConfig::default()` carries no callback at all; install this one
/// only where an `Arc<dyn PipelineProgressCallback>` is required.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<(StageId, String)>>,
        ticks: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: StageId) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: StageId, _duration: Duration) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_error(&self, stage: StageId, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }

        fn on_tick(&self, _stage: StageId, _elapsed: Duration) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("a.pdf", AnalysisMode::Json);
        cb.on_stage_start(StageId::Upload);
        cb.on_stage_complete(StageId::Upload, Duration::from_millis(300));
        cb.on_stage_error(StageId::Analysis, "boom");
        cb.on_warning(&PipelineWarning::WordLimitReached {
            limit: 50_000,
            word_count: 50_000,
        });
        cb.on_tick(StageId::Analysis, Duration::from_millis(50));
        cb.on_run_complete(Duration::from_secs(1));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage_start(StageId::Upload);
        tracker.on_stage_complete(StageId::Upload, Duration::ZERO);
        tracker.on_stage_start(StageId::Extraction);
        tracker.on_tick(StageId::Extraction, Duration::from_millis(50));
        tracker.on_stage_error(StageId::Extraction, "corrupt");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.ticks.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.errors.lock().unwrap().as_slice(),
            &[(StageId::Extraction, "corrupt".to_string())]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(StageId::Analysis);
    }
}
