//! Bounded-parallel batch execution.
//!
//! Every input becomes one unit on a dedicated rayon pool of `N` threads.
//! A unit sends its outcome back over a channel; the calling thread receives
//! them in completion order, owns the progress counter, and builds the
//! [`BatchResult`]. A failing or panicking unit only affects its own row.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use log::{debug, info, warn};

use crate::batch::pipeline::{BatchInput, BatchRow, PipelineSpec, run_unit};
use crate::batch::result::{BatchEntry, BatchFailure, BatchResult, Progress};
use crate::error::{AppError, ErrorKind};
use crate::io::SpectrumDecoder;

/// Best-effort cancellation shared between the caller and the workers.
///
/// Units that have not started when the token is cancelled are skipped and
/// reported as cancelled; running units finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

enum UnitOutcome {
    Done(Result<BatchRow, AppError>),
    Cancelled,
}

pub struct BatchOrchestrator {
    workers: usize,
    decoder: Arc<dyn SpectrumDecoder>,
    pipeline: Arc<PipelineSpec>,
}

impl BatchOrchestrator {
    pub fn new(workers: usize, decoder: Arc<dyn SpectrumDecoder>, pipeline: PipelineSpec) -> Result<Self, AppError> {
        if workers == 0 {
            return Err(AppError::configuration("Batch needs at least one worker."));
        }
        Ok(Self {
            workers,
            decoder,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pipeline(&self) -> &PipelineSpec {
        &self.pipeline
    }

    /// Run every input to completion.
    pub fn run(&self, inputs: Vec<(String, BatchInput)>) -> Result<BatchResult, AppError> {
        self.run_with(inputs, &CancelToken::new(), |_| {})
    }

    /// Run with a cancel token and a progress callback.
    ///
    /// `on_progress` is called on the calling thread after each unit completes.
    /// The only batch-level error is failing to build the worker pool.
    pub fn run_with<F>(
        &self,
        inputs: Vec<(String, BatchInput)>,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<BatchResult, AppError>
    where
        F: FnMut(Progress),
    {
        let total = inputs.len();
        let mut result = BatchResult {
            progress: Progress { completed: 0, total },
            ..BatchResult::default()
        };
        if total == 0 {
            return Ok(result);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("cmost-worker-{i}"))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to start {} batch workers: {e}", self.workers)))?;

        info!(
            "batch: {total} unit(s) on {} worker(s), measurement={}",
            self.workers,
            self.pipeline.measurement.label()
        );

        let ids: Vec<String> = inputs.iter().map(|(id, _)| id.clone()).collect();
        let (tx, rx) = mpsc::channel::<(usize, UnitOutcome)>();

        for (slot, (_, input)) in inputs.into_iter().enumerate() {
            let tx = tx.clone();
            let decoder = Arc::clone(&self.decoder);
            let pipeline = Arc::clone(&self.pipeline);
            let cancel = cancel.clone();
            pool.spawn(move || {
                let outcome = if cancel.is_cancelled() {
                    UnitOutcome::Cancelled
                } else {
                    let run = catch_unwind(AssertUnwindSafe(|| run_unit(input, decoder.as_ref(), &pipeline)));
                    UnitOutcome::Done(run.unwrap_or_else(|payload| Err(panic_error(payload.as_ref()))))
                };
                // The receiver only hangs up once every unit is accounted for.
                let _ = tx.send((slot, outcome));
            });
        }
        drop(tx);

        let mut seen = vec![false; total];
        while result.progress.completed < total {
            let Ok((slot, outcome)) = rx.recv() else {
                break;
            };
            seen[slot] = true;
            let id = ids[slot].clone();
            match outcome {
                UnitOutcome::Done(Ok(row)) => {
                    debug!("batch: '{id}' done");
                    result.rows.push(BatchEntry { id, row });
                }
                UnitOutcome::Done(Err(err)) => {
                    warn!("batch: '{id}' failed ({}): {}", err.kind(), err.message());
                    result.failures.push(BatchFailure::from_error(id, &err));
                }
                UnitOutcome::Cancelled => result.cancelled.push(id),
            }
            result.progress.completed += 1;
            on_progress(result.progress);
        }

        // A unit that vanished without reporting (its thread died) still gets a row.
        for (slot, _) in seen.iter().enumerate().filter(|(_, s)| !**s) {
            let err = AppError::new(ErrorKind::Panic, "Worker exited without reporting a result.");
            result.failures.push(BatchFailure::from_error(ids[slot].clone(), &err));
            result.progress.completed += 1;
            on_progress(result.progress);
        }

        info!(
            "batch: {} ok, {} failed, {} cancelled",
            result.rows.len(),
            result.failures.len(),
            result.cancelled.len()
        );
        Ok(result)
    }
}

fn panic_error(payload: &(dyn std::any::Any + Send)) -> AppError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    AppError::new(ErrorKind::Panic, format!("Unit panicked: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::pipeline::Measurement;
    use crate::domain::{Header, KEY_FILENAME, SpectrumRecord};
    use crate::fit::ContinuumConfig;
    use crate::io::TextSpectrumDecoder;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn flat_record(name: &str) -> SpectrumRecord {
        let wavelength: Vec<f64> = (0..6000).map(|i| 3650.0 + i as f64).collect();
        let flux = vec![1.0; wavelength.len()];
        SpectrumRecord::new(Header::new().with(KEY_FILENAME, name), wavelength, flux).unwrap()
    }

    /// Decodes `ok*` paths to a flat spectrum, sleeps on `slow*`, panics on `panic*`,
    /// and fails everything else.
    struct ScriptedDecoder {
        calls: AtomicUsize,
        cancel_after_first: Option<CancelToken>,
    }

    impl ScriptedDecoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                cancel_after_first: None,
            }
        }
    }

    impl SpectrumDecoder for ScriptedDecoder {
        fn decode(&self, path: &Path) -> Result<SpectrumRecord, AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(token) = &self.cancel_after_first {
                    token.cancel();
                }
            }
            let name = path.to_string_lossy();
            if name.starts_with("slow") {
                std::thread::sleep(Duration::from_millis(300));
                return Ok(flat_record(&name));
            }
            if name.starts_with("ok") {
                return Ok(flat_record(&name));
            }
            if name.starts_with("panic") {
                panic!("decoder blew up on {name}");
            }
            Err(AppError::decode(format!("{name}: not a spectrum")))
        }
    }

    fn inputs(names: &[&str]) -> Vec<(String, BatchInput)> {
        names
            .iter()
            .map(|n| (n.to_string(), BatchInput::Path(PathBuf::from(n))))
            .collect()
    }

    fn orchestrator(workers: usize, decoder: ScriptedDecoder) -> BatchOrchestrator {
        let pipeline = PipelineSpec::new(Vec::new(), Measurement::builtin_indices().unwrap());
        BatchOrchestrator::new(workers, Arc::new(decoder), pipeline).unwrap()
    }

    #[test]
    fn one_malformed_input_gives_one_failure() {
        let batch = orchestrator(3, ScriptedDecoder::new());
        let result = batch.run(inputs(&["ok1", "ok2", "broken", "ok3", "ok4"])).unwrap();

        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].id, "broken");
        assert_eq!(result.failures[0].kind, ErrorKind::Decode);
        assert!(result.cancelled.is_empty());
        assert_eq!(result.progress, Progress { completed: 5, total: 5 });

        let table = result.index_table().unwrap();
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.columns.len(), 25);
        for (_, values) in &table.rows {
            assert!(values.iter().all(|v| v.abs() < 1e-9));
        }
    }

    #[test]
    fn panicking_unit_is_isolated() {
        let batch = orchestrator(2, ScriptedDecoder::new());
        let result = batch.run(inputs(&["ok1", "panic1", "ok2"])).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.failures.len(), 1);
        let failure = &result.failures[0];
        assert_eq!(failure.id, "panic1");
        assert_eq!(failure.kind, ErrorKind::Panic);
        assert!(failure.message.contains("decoder blew up"));
    }

    #[test]
    fn cancelled_before_start_skips_everything() {
        let batch = orchestrator(2, ScriptedDecoder::new());
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = batch.run_with(inputs(&["ok1", "ok2", "ok3"]), &cancel, |_| {}).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.cancelled.len(), 3);
        assert!(result.progress.is_done());
    }

    #[test]
    fn cancellation_mid_batch_abandons_pending_units() {
        let cancel = CancelToken::new();
        let decoder = ScriptedDecoder {
            calls: AtomicUsize::new(0),
            cancel_after_first: Some(cancel.clone()),
        };
        let batch = orchestrator(1, decoder);
        let result = batch
            .run_with(inputs(&["ok1", "ok2", "ok3", "ok4", "ok5"]), &cancel, |_| {})
            .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.cancelled.len(), 4);
        assert_eq!(result.progress.completed, 5);
    }

    #[test]
    fn rows_arrive_in_completion_order_with_progress() {
        let batch = orchestrator(2, ScriptedDecoder::new());
        let mut seen = Vec::new();
        let result = batch
            .run_with(
                inputs(&["slow1", "ok1", "ok2", "ok3"]),
                &CancelToken::new(),
                |p| seen.push(p),
            )
            .unwrap();

        assert_eq!(result.ids().last(), Some(&"slow1"));
        let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![1, 2, 3, 4]);
        assert!(seen.iter().all(|p| p.total == 4));
    }

    #[test]
    fn records_skip_the_decoder() {
        let pipeline = PipelineSpec::new(Vec::new(), Measurement::Spectrum);
        let batch = BatchOrchestrator::new(2, Arc::new(TextSpectrumDecoder::default()), pipeline).unwrap();
        let result = batch
            .run(vec![
                ("a".to_string(), BatchInput::Record(flat_record("a"))),
                ("b".to_string(), BatchInput::Record(flat_record("b"))),
            ])
            .unwrap();
        let table = result.flux_table().unwrap().unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.wavelength.len(), 6000);
        assert_eq!(table.header("a").and_then(|h| h.file_name()), Some("a"));
    }

    #[test]
    fn continuum_batch_yields_continuum_rows() {
        let wavelength: Vec<f64> = (0..6000).map(|i| 3650.0 + i as f64).collect();
        let trend = |w: f64| 1.0 + 0.1 * (w - 6650.0) / 3000.0;
        let sloped = |name: &str| {
            let flux = wavelength
                .iter()
                .enumerate()
                .map(|(i, &w)| trend(w) + 0.004 * (1.7 * i as f64).sin())
                .collect();
            SpectrumRecord::new(Header::new().with(KEY_FILENAME, name), wavelength.clone(), flux).unwrap()
        };

        let pipeline = PipelineSpec::new(Vec::new(), Measurement::Continuum(ContinuumConfig::default()));
        let batch = BatchOrchestrator::new(2, Arc::new(TextSpectrumDecoder::default()), pipeline).unwrap();
        let result = batch
            .run(vec![
                ("a".to_string(), BatchInput::Record(sloped("a"))),
                ("b".to_string(), BatchInput::Record(sloped("b"))),
                ("missing".to_string(), BatchInput::Path(PathBuf::from("cmost-no-such-file.txt"))),
            ])
            .unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, ErrorKind::Io);
        assert!(result.index_table().is_none());
        for entry in &result.rows {
            let BatchRow::Continuum(fit) = &entry.row else {
                panic!("{}: expected a continuum row, got {:?}", entry.id, entry.row);
            };
            assert_eq!(fit.continuum.len(), wavelength.len());
            for (w, c) in fit.wavelength.iter().zip(&fit.continuum) {
                assert!((c - trend(*w)).abs() < 0.01, "{}: continuum at {w}: {c}", entry.id);
            }
        }
    }

    #[test]
    fn zero_workers_is_configuration_error() {
        let err = BatchOrchestrator::new(0, Arc::new(TextSpectrumDecoder::default()), PipelineSpec::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
