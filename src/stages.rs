//! Stage tracking: a fixed, ordered list of named pipeline stages with
//! status and timing.
//!
//! The tracker knows nothing about what a stage does. The session drives it
//! with `start` / `complete` / `fail_active` and reads back the stage list and
//! the total elapsed time.
//!
//! ## Transition rules
//!
//! ```text
//! pending ──start──▶ active ──complete──▶ complete
//!                       └────fail_active──▶ error
//! ```
//!
//! Statuses only move forward. At most one stage is `active`. Once a stage
//! errors the run stops, so the stages after it stay `pending` until the next
//! `reset`.
//!
//! ## Live elapsed time
//!
//! [`Ticker`] runs a poll closure at a fixed interval (50 ms by default) while a run
//! is in progress. The ticker task is aborted when the guard is dropped, so a
//! finished or reset run never leaves a timer behind.

use crate::config::AnalysisMode;
use crate::error::DocLexError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifier of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Upload,
    Extraction,
    Analysis,
    /// Final stage in json mode.
    Formatting,
    /// Final stage in visual mode.
    Generation,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Upload => "upload",
            StageId::Extraction => "extraction",
            StageId::Analysis => "analysis",
            StageId::Formatting => "formatting",
            StageId::Generation => "generation",
        }
    }

    /// Display label of the stage.
    pub fn label(&self) -> &'static str {
        match self {
            StageId::Upload => "File upload",
            StageId::Extraction => "Text extraction",
            StageId::Analysis => "AI analysis",
            StageId::Formatting => "JSON formatting",
            StageId::Generation => "Visual generation",
        }
    }

    /// The ordered stage list for a run in `mode`.
    pub fn sequence(mode: AnalysisMode) -> [StageId; 4] {
        let last = match mode {
            AnalysisMode::Json => StageId::Formatting,
            AnalysisMode::Visual => StageId::Generation,
        };
        [StageId::Upload, StageId::Extraction, StageId::Analysis, last]
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Complete,
    Error,
}

impl StageStatus {
    /// Position along pending → active → complete|error.
    pub fn rank(&self) -> u8 {
        match self {
            StageStatus::Pending => 0,
            StageStatus::Active => 1,
            StageStatus::Complete | StageStatus::Error => 2,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageStatus::Pending => "pending",
            StageStatus::Active => "active",
            StageStatus::Complete => "complete",
            StageStatus::Error => "error",
        })
    }
}

/// One entry of the tracker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStage {
    pub id: StageId,
    pub name: &'static str,
    pub status: StageStatus,
    /// When the stage became active. Not serialised: `Instant` is process-local.
    #[serde(skip)]
    pub start_time: Option<Instant>,
    /// Set once the stage completed or errored.
    #[serde(rename = "durationMs", serialize_with = "serialize_duration_ms")]
    pub duration: Option<Duration>,
}

fn serialize_duration_ms<S: serde::Serializer>(
    d: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}

impl ProcessingStage {
    fn pending(id: StageId) -> Self {
        Self {
            id,
            name: id.label(),
            status: StageStatus::Pending,
            start_time: None,
            duration: None,
        }
    }

    /// Duration so far: the recorded one, or the live one for an active stage.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match (self.duration, self.status, self.start_time) {
            (Some(d), _, _) => Some(d),
            (None, StageStatus::Active, Some(start)) => Some(now.saturating_duration_since(start)),
            _ => None,
        }
    }
}

/// State machine over the fixed stage list of one run.
#[derive(Debug, Clone)]
pub struct StageTracker {
    stages: Vec<ProcessingStage>,
}

impl StageTracker {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            stages: StageId::sequence(mode)
                .into_iter()
                .map(ProcessingStage::pending)
                .collect(),
        }
    }

    /// Put every stage back to `pending` and forget all timings.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            *stage = ProcessingStage::pending(stage.id);
        }
    }

    /// Reset and switch to the stage list of `mode`.
    pub fn reset_for(&mut self, mode: AnalysisMode) {
        *self = Self::new(mode);
    }

    pub fn stages(&self) -> &[ProcessingStage] {
        &self.stages
    }

    pub fn get(&self, id: StageId) -> Option<&ProcessingStage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn status(&self, id: StageId) -> Option<StageStatus> {
        self.get(id).map(|s| s.status)
    }

    /// The stage currently running, if any.
    pub fn active(&self) -> Option<StageId> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Active)
            .map(|s| s.id)
    }

    /// Mark `id` active and return its start time.
    pub fn start(&mut self, id: StageId) -> Result<Instant, DocLexError> {
        if let Some(running) = self.active() {
            debug!("cannot start {} while {} is active", id, running);
            return Err(DocLexError::InvalidStageTransition {
                stage: id,
                from: self.status(id).unwrap_or(StageStatus::Pending),
                to: StageStatus::Active,
            });
        }
        let stage = self.stage_mut(id)?;
        if stage.status != StageStatus::Pending {
            return Err(DocLexError::InvalidStageTransition {
                stage: id,
                from: stage.status,
                to: StageStatus::Active,
            });
        }
        let now = Instant::now();
        stage.status = StageStatus::Active;
        stage.start_time = Some(now);
        Ok(now)
    }

    /// Mark `id` complete with `duration = now - start_time`.
    pub fn complete(&mut self, id: StageId, start_time: Instant) -> Result<Duration, DocLexError> {
        let stage = self.stage_mut(id)?;
        if stage.status != StageStatus::Active {
            return Err(DocLexError::InvalidStageTransition {
                stage: id,
                from: stage.status,
                to: StageStatus::Complete,
            });
        }
        let duration = start_time.elapsed();
        stage.status = StageStatus::Complete;
        stage.duration = Some(duration);
        Ok(duration)
    }

    /// Mark the active stage as errored. Returns the stage that failed.
    ///
    /// The stage keeps the time it spent before failing as its duration.
    pub fn fail_active(&mut self) -> Option<StageId> {
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.status == StageStatus::Active)?;
        stage.status = StageStatus::Error;
        stage.duration = stage.start_time.map(|t| t.elapsed());
        Some(stage.id)
    }

    /// Sum of recorded durations plus the live elapsed time of the active stage.
    pub fn total_elapsed(&self, now: Instant) -> Duration {
        self.stages.iter().filter_map(|s| s.elapsed(now)).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Complete)
    }

    pub fn has_error(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Error)
    }

    fn stage_mut(&mut self, id: StageId) -> Result<&mut ProcessingStage, DocLexError> {
        self.stages
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DocLexError::Internal(format!("stage '{id}' is not part of this run")))
    }
}

/// Format a duration the way the stage timer displays it:
/// `850ms`, `12.34s`, `2m 5.0s`.
pub fn format_elapsed(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        return format!("{ms}ms");
    }
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        return format!("{secs:.2}s");
    }
    let minutes = (secs / 60.0).floor() as u64;
    format!("{}m {:.1}s", minutes, secs % 60.0)
}

/// Periodic poller that lives exactly as long as its guard.
///
/// The poll closure runs on every tick and returns `false` to stop early (the run
/// ended or was reset). Dropping the guard aborts the task.
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the ticker on the current Tokio runtime.
    pub fn spawn<F>(period: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !poll() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn statuses(t: &StageTracker) -> Vec<StageStatus> {
        t.stages().iter().map(|s| s.status).collect()
    }

    #[test]
    fn new_tracker_is_all_pending() {
        let t = StageTracker::new(AnalysisMode::Json);
        assert_eq!(t.stages().len(), 4);
        assert!(t.stages().iter().all(|s| s.status == StageStatus::Pending));
        assert_eq!(t.stages()[3].id, StageId::Formatting);
    }

    #[test]
    fn visual_mode_renames_last_stage() {
        let t = StageTracker::new(AnalysisMode::Visual);
        let ids: Vec<_> = t.stages().iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                StageId::Upload,
                StageId::Extraction,
                StageId::Analysis,
                StageId::Generation
            ]
        );
    }

    #[test]
    fn start_then_complete_records_duration() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        let start = t.start(StageId::Upload).unwrap();
        assert_eq!(t.active(), Some(StageId::Upload));
        let d = t.complete(StageId::Upload, start).unwrap();
        let stage = t.get(StageId::Upload).unwrap();
        assert_eq!(stage.status, StageStatus::Complete);
        assert_eq!(stage.duration, Some(d));
        assert_eq!(t.active(), None);
    }

    #[test]
    fn only_one_stage_active() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        t.start(StageId::Upload).unwrap();
        let err = t.start(StageId::Extraction).unwrap_err();
        assert!(matches!(err, DocLexError::InvalidStageTransition { .. }));
        assert_eq!(t.status(StageId::Extraction), Some(StageStatus::Pending));
    }

    #[test]
    fn statuses_never_move_backwards() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        let s = t.start(StageId::Upload).unwrap();
        t.complete(StageId::Upload, s).unwrap();
        assert!(t.start(StageId::Upload).is_err());
        assert!(t.complete(StageId::Extraction, Instant::now()).is_err());
        assert_eq!(t.status(StageId::Upload), Some(StageStatus::Complete));
    }

    #[test]
    fn fail_active_leaves_later_stages_pending() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        for id in [StageId::Upload, StageId::Extraction] {
            let s = t.start(id).unwrap();
            t.complete(id, s).unwrap();
        }
        t.start(StageId::Analysis).unwrap();
        assert_eq!(t.fail_active(), Some(StageId::Analysis));
        assert_eq!(
            statuses(&t),
            vec![
                StageStatus::Complete,
                StageStatus::Complete,
                StageStatus::Error,
                StageStatus::Pending
            ]
        );
        assert!(t.has_error());
        assert_eq!(t.fail_active(), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        let s = t.start(StageId::Upload).unwrap();
        t.complete(StageId::Upload, s).unwrap();
        t.start(StageId::Extraction).unwrap();
        t.reset();
        assert!(t.stages().iter().all(|s| s.status == StageStatus::Pending
            && s.duration.is_none()
            && s.start_time.is_none()));
    }

    #[test]
    fn total_elapsed_includes_live_stage() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        let s = t.start(StageId::Upload).unwrap();
        t.complete(StageId::Upload, s).unwrap();
        let done = t.get(StageId::Upload).unwrap().duration.unwrap();
        let started = t.start(StageId::Extraction).unwrap();
        let later = started + Duration::from_millis(40);
        assert_eq!(t.total_elapsed(later), done + Duration::from_millis(40));
    }

    #[test]
    fn format_elapsed_ranges() {
        assert_eq!(format_elapsed(Duration::from_millis(850)), "850ms");
        assert_eq!(format_elapsed(Duration::from_millis(12_340)), "12.34s");
        assert_eq!(format_elapsed(Duration::from_millis(125_000)), "2m 5.0s");
    }

    #[test]
    fn stage_serialises_lowercase_with_ms() {
        let mut t = StageTracker::new(AnalysisMode::Json);
        let s = t.start(StageId::Upload).unwrap();
        t.complete(StageId::Upload, s).unwrap();
        let json = serde_json::to_value(&t.stages()[0]).unwrap();
        assert_eq!(json["id"], "upload");
        assert_eq!(json["status"], "complete");
        assert!(json["durationMs"].is_u64());
        assert!(json.get("startTime").is_none());
    }

    #[tokio::test]
    async fn ticker_stops_when_poll_returns_false() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let ticker = Ticker::spawn(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 2
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ticker.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn dropping_ticker_cancels_it() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ticks);
        let ticker = Ticker::spawn(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(ticker);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_drop = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    }
}
