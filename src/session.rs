//! The orchestrator: one selected file, one run at a time, four stages.
//!
//! ```text
//! select_file ──▶ process ──▶ upload ─▶ extraction ─▶ analysis ─▶ formatting|generation
//!                   │                        │             │
//!                   │                   word-cap warning   dispatch + normalize
//!                   └── Ticker: on_tick every tick_interval while a stage is active
//! ```
//!
//! ## Why a generation counter?
//!
//! A run spends most of its time awaiting the backend. If the user resets the
//! session or picks another file meanwhile, the in-flight run must not
//! resurrect stale stages or install a result for a file that is no longer
//! selected. Every `select_file`, `reset` and new run bumps the generation;
//! a run checks it before each tracker transition and before installing its
//! result, and bails out with [`DocLexError::RunAbandoned`] once it is stale.
//!
//! The mutex is never held across an `.await`, and progress callbacks are
//! invoked after the guard is released so a callback may query the session.
//! A second lock orders the ticker against the end of a run, so no tick is
//! reported after `on_run_complete` or `on_stage_error`.

use crate::config::{AnalysisMode, AnalysisOptions, PipelineConfig};
use crate::error::{DocLexError, PipelineWarning};
use crate::output::{AnalysisResult, FileType, ParsedDocument, RunOutput};
use crate::pipeline::backend::resolve_backend;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::extract::{extract, word_limit_warning};
use crate::pipeline::input::{validate_mime, InputFile};
use crate::pipeline::normalize::normalize;
use crate::progress::PipelineProgressCallback;
use crate::stages::{ProcessingStage, StageId, StageTracker, Ticker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Mutable state of a session.
#[derive(Debug)]
struct SessionState {
    file: Option<InputFile>,
    document: Option<ParsedDocument>,
    result: Option<AnalysisResult>,
    tracker: StageTracker,
    warnings: Vec<PipelineWarning>,
    last_error: Option<String>,
    running: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            file: None,
            document: None,
            result: None,
            tracker: StageTracker::new(AnalysisMode::default()),
            warnings: Vec::new(),
            last_error: None,
            running: false,
        }
    }

    fn clear_run(&mut self) {
        self.document = None;
        self.result = None;
        self.tracker.reset();
        self.warnings.clear();
        self.last_error = None;
        self.running = false;
    }
}

struct Inner {
    config: PipelineConfig,
    dispatcher: Dispatcher,
    generation: AtomicU64,
    state: Mutex<SessionState>,
    /// Serialises ticks against the end of a run.
    emit: Mutex<()>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emitting(&self) -> MutexGuard<'_, ()> {
        self.emit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn callback(&self) -> Option<&dyn PipelineProgressCallback> {
        self.config.progress_callback.as_deref()
    }
}

/// Cheap, cloneable handle over one analysis session.
///
/// # Example
/// ```rust,no_run
/// use doclex::{AnalysisOptions, InputFile, PipelineConfig, Session};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::new(PipelineConfig::default())?;
/// session.select_file(InputFile::from_path("peticao.pdf", None).await?)?;
/// let out = session.process(&AnalysisOptions::json("gemini-flash")).await?;
/// println!("{}", serde_json::to_string_pretty(&out.result)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.inner.dispatcher.backend_name())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("running", &self.is_running())
            .finish()
    }
}

/// Clears `running` when a run ends however it ends, unless a newer run
/// already owns the session.
struct RunGuard {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.inner.current(self.generation) {
            self.inner.lock().running = false;
        }
    }
}

impl Session {
    /// Create a session, resolving the backend from `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, DocLexError> {
        let backend = resolve_backend(&config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                dispatcher: Dispatcher::new(backend),
                generation: AtomicU64::new(0),
                state: Mutex::new(SessionState::new()),
                emit: Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Select the file the next run analyses.
    ///
    /// Unsupported files are rejected without touching the current state.
    /// Accepting a file discards the previous document, result and stages,
    /// and abandons any run in flight.
    pub fn select_file(&self, file: InputFile) -> Result<FileType, DocLexError> {
        let file_type = validate_mime(&file)?;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        info!("Selected {} ({}, {} bytes)", file.name, file_type, file.bytes.len());
        let mut st = self.inner.lock();
        st.clear_run();
        st.file = Some(file);
        Ok(file_type)
    }

    /// Back to the initial state: no file, no stages, no result. Any run in
    /// flight is abandoned.
    pub fn reset(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut st = self.inner.lock();
        st.clear_run();
        st.file = None;
        debug!("Session reset");
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn file_name(&self) -> Option<String> {
        self.inner.lock().file.as_ref().map(|f| f.name.clone())
    }

    /// Snapshot of the stage list.
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.inner.lock().tracker.stages().to_vec()
    }

    /// Total elapsed time of the current (or last) run.
    pub fn total_elapsed(&self) -> Duration {
        self.inner.lock().tracker.total_elapsed(Instant::now())
    }

    pub fn document(&self) -> Option<ParsedDocument> {
        self.inner.lock().document.clone()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.inner.lock().result.clone()
    }

    pub fn warnings(&self) -> Vec<PipelineWarning> {
        self.inner.lock().warnings.clone()
    }

    /// The user-facing message of the last failed run.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Run the four stages on the selected file.
    ///
    /// Always starts from a cleared tracker. Fails with
    /// [`DocLexError::NoFileSelected`] or [`DocLexError::RunInProgress`]
    /// without touching the state, and with [`DocLexError::RunAbandoned`] when
    /// the session was reset while the run was in flight.
    pub async fn process(&self, options: &AnalysisOptions) -> Result<RunOutput, DocLexError> {
        let (generation, file) = {
            let mut st = self.inner.lock();
            if st.running {
                return Err(DocLexError::RunInProgress);
            }
            let file = st.file.clone().ok_or(DocLexError::NoFileSelected)?;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            st.clear_run();
            st.tracker.reset_for(options.mode);
            st.running = true;
            (generation, file)
        };
        let _guard = RunGuard {
            inner: Arc::clone(&self.inner),
            generation,
        };

        info!(
            "Run {} started: {} [{} / {}]",
            generation,
            file.name,
            options.mode,
            options.model_choice()
        );
        if let Some(cb) = self.inner.callback() {
            cb.on_run_start(&file.name, options.mode);
        }
        let _ticker = self.spawn_ticker(generation);

        match self.run_stages(generation, &file, options).await {
            Ok(output) => Ok(output),
            Err(e) if matches!(e, DocLexError::RunAbandoned) || !self.inner.current(generation) => {
                warn!("Run {} abandoned; output discarded", generation);
                Err(DocLexError::RunAbandoned)
            }
            Err(e) => {
                self.fail(generation, &e);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        generation: u64,
        file: &InputFile,
        options: &AnalysisOptions,
    ) -> Result<RunOutput, DocLexError> {
        let config = &self.inner.config;

        // ── Stage 1: upload ──────────────────────────────────────────────
        let start = self.begin(generation, StageId::Upload)?;
        tokio::time::sleep(config.upload_delay()).await;
        self.finish(generation, StageId::Upload, start)?;

        // ── Stage 2: extraction ──────────────────────────────────────────
        let start = self.begin(generation, StageId::Extraction)?;
        let document = extract(file, config).await?;
        let warning = word_limit_warning(&document);
        {
            let mut st = self.inner.lock();
            if !self.inner.current(generation) {
                return Err(DocLexError::RunAbandoned);
            }
            st.document = Some(document.clone());
            st.warnings.extend(warning.clone());
        }
        if let Some(w) = &warning {
            warn!("{}", w);
            if let Some(cb) = self.inner.callback() {
                cb.on_warning(w);
            }
        }
        self.finish(generation, StageId::Extraction, start)?;

        // ── Stage 3: analysis ────────────────────────────────────────────
        let start = self.begin(generation, StageId::Analysis)?;
        let raw = self.inner.dispatcher.dispatch(&document, options).await?;
        let template_css = match options.mode {
            AnalysisMode::Visual => options.template_css.as_deref(),
            AnalysisMode::Json => None,
        };
        let result = normalize(&raw, options.mode, template_css)?;
        self.finish(generation, StageId::Analysis, start)?;

        // ── Stage 4: formatting / generation ─────────────────────────────
        let last = StageId::sequence(options.mode)[3];
        let start = self.begin(generation, last)?;
        tokio::time::sleep(config.finalize_delay()).await;
        let output = {
            // No tick may slip in between the last transition and on_run_complete.
            let _emit = self.inner.emitting();
            let output = {
                let mut st = self.inner.lock();
                if !self.inner.current(generation) {
                    return Err(DocLexError::RunAbandoned);
                }
                st.result = Some(result.clone());
                let duration = st.tracker.complete(last, start)?;
                debug!("Stage {} complete in {:?}", last, duration);
                let total = st.tracker.total_elapsed(Instant::now());
                RunOutput {
                    document,
                    result,
                    stages: st.tracker.stages().to_vec(),
                    warnings: st.warnings.clone(),
                    total_duration_ms: total.as_millis() as u64,
                }
            };

            if let Some(cb) = self.inner.callback() {
                let duration = output
                    .stages
                    .last()
                    .and_then(|s| s.duration)
                    .unwrap_or_default();
                cb.on_stage_complete(last, duration);
                cb.on_run_complete(Duration::from_millis(output.total_duration_ms));
            }
            output
        };
        info!(
            "Run {} complete in {}ms",
            generation, output.total_duration_ms
        );
        Ok(output)
    }

    /// Start `stage` if this run is still current.
    fn begin(&self, generation: u64, stage: StageId) -> Result<Instant, DocLexError> {
        let start = {
            let mut st = self.inner.lock();
            if !self.inner.current(generation) {
                return Err(DocLexError::RunAbandoned);
            }
            st.tracker.start(stage)?
        };
        info!("Stage {} started", stage);
        if let Some(cb) = self.inner.callback() {
            cb.on_stage_start(stage);
        }
        Ok(start)
    }

    /// Complete `stage` if this run is still current.
    fn finish(&self, generation: u64, stage: StageId, start: Instant) -> Result<(), DocLexError> {
        let duration = {
            let mut st = self.inner.lock();
            if !self.inner.current(generation) {
                return Err(DocLexError::RunAbandoned);
            }
            st.tracker.complete(stage, start)?
        };
        debug!("Stage {} complete in {:?}", stage, duration);
        if let Some(cb) = self.inner.callback() {
            cb.on_stage_complete(stage, duration);
        }
        Ok(())
    }

    /// Mark the active stage as errored and record the user-facing message.
    fn fail(&self, generation: u64, err: &DocLexError) {
        let message = err.user_message();
        let _emit = self.inner.emitting();
        let failed = {
            let mut st = self.inner.lock();
            if !self.inner.current(generation) {
                return;
            }
            st.last_error = Some(message.clone());
            st.tracker.fail_active()
        };
        error!("Run {} failed: {}", generation, err);
        if let (Some(stage), Some(cb)) = (failed, self.inner.callback()) {
            cb.on_stage_error(stage, &message);
        }
    }

    /// Live elapsed-time ticker; only spawned when someone listens.
    fn spawn_ticker(&self, generation: u64) -> Option<Ticker> {
        self.inner.config.progress_callback.as_ref()?;
        let inner = Arc::clone(&self.inner);
        Some(Ticker::spawn(inner.config.tick_interval(), move || {
            if !inner.current(generation) {
                return false;
            }
            let _emit = inner.emitting();
            let (active, elapsed, done) = {
                let st = inner.lock();
                (
                    st.tracker.active(),
                    st.tracker.total_elapsed(Instant::now()),
                    st.tracker.is_finished() || st.tracker.has_error(),
                )
            };
            if let (Some(stage), Some(cb)) = (active, inner.callback()) {
                cb.on_tick(stage, elapsed);
            }
            !done
        }))
    }
}
