//! Top-level driver of a fuzzing session.
//!
//! Images are processed strictly one after another and, per image, the
//! enabled families run in declaration order. Only the detections inside a
//! batch run in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::cancel::CancellationToken;
use common::parallel::try_par_map_limited;
use image::RgbImage;
use rayon::ThreadPool;

use crate::algorithm::Algorithm;
use crate::annotate::{annotated_file_name, write_annotated, Annotator, ImageAnnotator};
use crate::config::FuzzConfig;
use crate::detection::backend::{BackendGuard, DetectionBackend};
use crate::detection::{DetectionCapability, DetectionError, DetectionResult, FamilyAdapter};
use crate::engine::{execute, ExecutionOptions};
use crate::error::{FuzzError, FuzzResult};
use crate::input::{read_input_images, ImageToProcess};
use crate::params::{Agast, Akaze, ImageContext, Orb, ParameterGrid, Sift, Star};
use crate::report::{CsvReport, ReportError};
use crate::session::{FuzzingSession, SessionId, SessionRecorder, SessionState};
use crate::store::ResultStore;

/// Outcome of one family sweep over one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyStats {
    pub file_name: String,
    pub algorithm: Algorithm,
    pub parameter_sets: usize,
    pub succeeded: usize,
    /// Failed parameter sets, including every failure in an aborted batch.
    pub failed: usize,
    pub elapsed: Duration,
    /// Set when the sweep stopped at a failing batch.
    pub aborted: Option<DetectionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub images_processed: usize,
    pub images_skipped: usize,
    pub families: Vec<FamilyStats>,
    pub records_committed: usize,
}

impl SessionSummary {
    pub fn failed_detections(&self) -> usize {
        self.families.iter().map(|family| family.failed).sum()
    }

    pub fn aborted_families(&self) -> usize {
        self.families.iter().filter(|family| family.aborted.is_some()).count()
    }
}

pub struct FuzzController<B: DetectionBackend, S: ResultStore> {
    config: FuzzConfig,
    backend: B,
    store: S,
    annotator: Box<dyn Annotator>,
    pool: Arc<ThreadPool>,
    cancellation: CancellationToken,
    session: FuzzingSession,
}

impl<B: DetectionBackend, S: ResultStore> FuzzController<B, S> {
    pub fn new(config: FuzzConfig, backend: B, store: S) -> FuzzResult<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.batch_size)
            .thread_name(|index| format!("fuzz-worker-{index}"))
            .build()
            .map_err(|err| FuzzError::Configuration(format!("failed to build worker pool: {err}")))?;

        Ok(Self {
            config,
            backend,
            store,
            annotator: Box::new(ImageAnnotator),
            pool: Arc::new(pool),
            cancellation: CancellationToken::new(),
            session: FuzzingSession::default(),
        })
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_annotator(mut self, annotator: impl Annotator + 'static) -> Self {
        self.annotator = Box::new(annotator);
        self
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    pub fn session(&self) -> &FuzzingSession {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Runs the whole sweep once.
    ///
    /// A cancelled run returns [`FuzzError::Cancelled`] and leaves the session
    /// `Running` with no end timestamp; everything committed so far stays.
    pub fn run(&mut self) -> FuzzResult<SessionSummary> {
        if self.session.state() != SessionState::NotStarted {
            return Err(FuzzError::Configuration(
                "a controller runs a single session".to_string(),
            ));
        }

        let images = read_input_images(&self.config.input_path)?;
        std::fs::create_dir_all(&self.config.output_path).map_err(ReportError::from)?;
        let report = CsvReport::create(&self.config.output_path)?;

        let _backend = BackendGuard::new(&self.backend)?;

        self.session.start();
        self.store.open_session(&self.session)?;
        tracing::info!(
            "Started fuzzing session {} with {} images, algorithms: {}",
            self.session.id,
            images.len(),
            self.config.algorithms
        );

        let recorder = SessionRecorder::new();
        let sweep = Sweep {
            backend: &self.backend,
            config: &self.config,
            annotator: self.annotator.as_ref(),
            report: &report,
            recorder: &recorder,
            pool: &self.pool,
            cancellation: &self.cancellation,
            session_id: self.session.id,
        };

        let mut summary = SessionSummary {
            session_id: self.session.id,
            images_processed: 0,
            images_skipped: 0,
            families: Vec::new(),
            records_committed: 0,
        };

        for image in &images {
            self.ensure_not_cancelled()?;

            let Some((source, context)) = sweep.load_image(image) else {
                summary.images_skipped += 1;
                continue;
            };

            for algorithm in self.config.algorithms.iter() {
                self.ensure_not_cancelled()?;

                let stats = sweep.fuzz(algorithm, &context, &source)?;

                let records = recorder.take_pending();
                summary.records_committed += self.store.commit(self.session.id, &records)?;
                self.session.extend_results(records);

                if let Some(err) = &stats.aborted {
                    tracing::error!(
                        "{} sweep of {} aborted after {} results: {}",
                        algorithm,
                        image.file_name,
                        stats.succeeded,
                        err
                    );
                }
                summary.families.push(stats);
            }

            summary.images_processed += 1;
        }

        self.ensure_not_cancelled()?;

        self.session.complete();
        self.store.close_session(&self.session)?;
        tracing::info!(
            "Completed fuzzing session {}: {} images processed, {} skipped, {} records",
            self.session.id,
            summary.images_processed,
            summary.images_skipped,
            summary.records_committed
        );

        Ok(summary)
    }

    fn ensure_not_cancelled(&self) -> FuzzResult<()> {
        if self.cancellation.is_cancelled() {
            tracing::warn!("Fuzzing session {} cancelled", self.session.id);
            return Err(FuzzError::Cancelled);
        }
        Ok(())
    }
}

/// Per-run borrowed state shared by every family sweep.
struct Sweep<'a, B: DetectionBackend> {
    backend: &'a B,
    config: &'a FuzzConfig,
    annotator: &'a dyn Annotator,
    report: &'a CsvReport,
    recorder: &'a SessionRecorder,
    pool: &'a Arc<ThreadPool>,
    cancellation: &'a CancellationToken,
    session_id: SessionId,
}

impl<B: DetectionBackend> Sweep<'_, B> {
    /// Decodes and prepares one listed image; `None` means skip it.
    fn load_image(&self, image: &ImageToProcess) -> Option<(RgbImage, Arc<ImageContext<B::Image>>)> {
        let path = image.path_in(&self.config.input_path);
        if !path.is_file() {
            tracing::warn!("Image {} does not exist, skipping", path.display());
            return None;
        }

        tracing::info!("Processing file {}", image.file_name);

        let source = match image::open(&path) {
            Ok(decoded) => decoded.to_rgb8(),
            Err(err) => {
                tracing::warn!("Failed to decode {}, skipping: {}", path.display(), err);
                return None;
            }
        };
        let prepared = match self.backend.prepare(&source) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!("Failed to prepare {}, skipping: {}", path.display(), err);
                return None;
            }
        };

        let context = ImageContext::new(image.file_name.clone(), image.region_of_interest, prepared);
        Some((source, context))
    }

    fn fuzz(
        &self,
        algorithm: Algorithm,
        context: &Arc<ImageContext<B::Image>>,
        source: &RgbImage,
    ) -> FuzzResult<FamilyStats> {
        match algorithm {
            Algorithm::Akaze => self.fuzz_family::<Akaze>(context, source),
            Algorithm::Agast => self.fuzz_family::<Agast>(context, source),
            Algorithm::Orb => self.fuzz_family::<Orb>(context, source),
            Algorithm::Star => self.fuzz_family::<Star>(context, source),
            Algorithm::Sift => self.fuzz_family::<Sift>(context, source),
        }
    }

    fn fuzz_family<G: ParameterGrid>(
        &self,
        context: &Arc<ImageContext<B::Image>>,
        source: &RgbImage,
    ) -> FuzzResult<FamilyStats> {
        let adapter = FamilyAdapter::<G, B>::new(self.backend);
        let params = adapter.generate_parameters(context);

        let mut stats = FamilyStats {
            file_name: context.file_name.clone(),
            algorithm: G::ALGORITHM,
            parameter_sets: params.len(),
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            aborted: None,
        };
        tracing::info!(
            "Running {} on {}: {} parameter sets",
            G::ALGORITHM,
            context.file_name,
            stats.parameter_sets
        );

        let start = Instant::now();
        let options = ExecutionOptions {
            batch_size: self.config.batch_size,
            failure_policy: self.config.failure_policy,
            cancellation: self.cancellation.clone(),
            pool: Some(Arc::clone(self.pool)),
        };
        let mut execution = execute(params, &adapter, options);
        let mut iteration = 0;

        while let Some(batch) = execution.next_batch() {
            let batch = match batch {
                Ok(batch) => batch,
                Err(err) => {
                    stats.aborted = Some(err);
                    break;
                }
            };

            let mut successes = Vec::with_capacity(batch.results.len());
            for outcome in batch.results {
                match outcome {
                    Ok(result) => successes.push((iteration, result)),
                    Err(err) => {
                        tracing::warn!("Skipping failed parameter set: {}", err);
                    }
                }
                iteration += 1;
            }

            stats.succeeded += successes.len();
            let batch_size = self.config.batch_size;
            self.pool.install(|| {
                try_par_map_limited(successes, batch_size, |(iteration, result)| {
                    self.emit(&result, iteration, source, context)
                })
            })?;
        }

        stats.failed = execution.failed();
        stats.elapsed = start.elapsed();
        tracing::info!(
            "Finished {} on {} in {:.2}s: {} succeeded, {} failed",
            G::ALGORITHM,
            context.file_name,
            stats.elapsed.as_secs_f64(),
            stats.succeeded,
            stats.failed
        );

        Ok(stats)
    }

    /// Writes one result to every output sink.
    fn emit(
        &self,
        result: &DetectionResult,
        iteration: usize,
        source: &RgbImage,
        context: &ImageContext<B::Image>,
    ) -> Result<(), ReportError> {
        let output_file_name = if self.config.write_images {
            let name = annotated_file_name(&result.file_name, result.algorithm, iteration);
            write_annotated(
                self.annotator,
                &self.config.output_path,
                &name,
                source,
                &context.region,
                &result.keypoints,
            )?;
            name
        } else {
            String::new()
        };

        self.report.append(result, iteration, &output_file_name)?;
        self.recorder.record(self.session_id, result, iteration);
        Ok(())
    }
}
