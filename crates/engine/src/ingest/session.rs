use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::registry::{SourceRegistry, SourceStatus};
use crate::conf::EngineConfig;
use crate::error::{EngineError, Result};
use crate::metrics::MetricSet;
use crate::parser::{Dispatcher, DispatcherStats, Extraction, GcState};
use crate::timing::TimingWindow;
use crate::trace::Trace;

/// Running line counts are published to the registry this often.
const STATUS_EVERY_LINES: u64 = 4096;

/// Result of one source that was read to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source_id: String,
    pub lines: u64,
    pub matched: u64,
}

/// One ingestion run: every source fed to it lands in the same metrics,
/// timing window and trace, with later sources shifted past earlier ones.
pub struct Ingestor {
    config: EngineConfig,
    metrics: MetricSet,
    window: TimingWindow,
    state: GcState,
    dispatcher: Dispatcher,
    trace: Arc<Trace>,
    registry: Arc<SourceRegistry>,
}

impl Ingestor {
    pub fn new(config: EngineConfig, trace_name: &str, registry: Arc<SourceRegistry>) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;
        Ok(Self {
            metrics: MetricSet::new(&config),
            window: TimingWindow::new(config.cpu_count),
            state: GcState::new(),
            dispatcher: Dispatcher::standard(&config)?,
            trace: Arc::new(Trace::new(trace_name)),
            registry,
            config,
        })
    }

    /// Ingest one source. Any error ends this source only; the registry
    /// records it as failed and the run can go on with the next source
    /// unless the error is an invariant violation.
    pub fn ingest_reader<R: BufRead>(&mut self, source_id: &str, mut reader: R) -> Result<SourceSummary> {
        self.registry.update(source_id, SourceStatus::Running { lines: 0 });
        tracing::info!(source = %source_id, trace = %self.trace.name(), "ingest: source started");

        self.metrics.begin_source(true);
        self.state = GcState::new();
        let matched_before = self.dispatcher.matches();

        let mut buf = Vec::new();
        let mut line_no = 0u64;
        let outcome = loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => {
                    let context = format!("reading {} after line {}", source_id, line_no);
                    break Err(EngineError::from(e).with_context(context));
                }
            }
            line_no += 1;
            let line = String::from_utf8_lossy(&buf);
            let mut cx = Extraction {
                source_id,
                line_no,
                config: &self.config,
                metrics: &mut self.metrics,
                window: &mut self.window,
                state: &mut self.state,
                trace: &self.trace,
            };
            if let Err(e) = self.dispatcher.process(&line, &mut cx) {
                break Err(e);
            }
            if line_no % STATUS_EVERY_LINES == 0 {
                self.registry.update(source_id, SourceStatus::Running { lines: line_no });
            }
        };

        // a failed source still moves the offset past what it contributed
        self.metrics.end_of_source();
        let matched = self.dispatcher.matches() - matched_before;

        match outcome {
            Ok(()) => {
                self.registry.update(source_id, SourceStatus::Finished { lines: line_no, matched });
                tracing::info!(source = %source_id, lines = line_no, matched, "ingest: source finished");
                Ok(SourceSummary {
                    source_id: source_id.to_string(),
                    lines: line_no,
                    matched,
                })
            }
            Err(e) => {
                self.registry.update(
                    source_id,
                    SourceStatus::Failed {
                        line: e.line().unwrap_or(line_no),
                        reason: e.to_string(),
                    },
                );
                if e.is_source_local() {
                    tracing::warn!(source = %source_id, error = %e, "ingest: source failed");
                } else {
                    tracing::error!(source = %source_id, error = %e, "ingest: run aborted");
                }
                Err(e)
            }
        }
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<SourceSummary> {
        let source_id = path.display().to_string();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                let e = EngineError::from(e).with_context(format!("opening {}", source_id));
                self.registry.update(
                    &source_id,
                    SourceStatus::Failed {
                        line: 0,
                        reason: e.to_string(),
                    },
                );
                tracing::warn!(source = %source_id, error = %e, "ingest: source failed");
                return Err(e);
            }
        };
        self.ingest_reader(&source_id, BufReader::new(file))
    }

    /// Ingest files one after the other into this run. Failed sources are
    /// skipped; only an error that is not source-local stops the run.
    pub fn ingest_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<SourceSummary>> {
        for path in paths {
            self.registry.register(&path.as_ref().display().to_string());
        }
        let mut done = Vec::new();
        for path in paths {
            match self.ingest_file(path.as_ref()) {
                Ok(summary) => done.push(summary),
                Err(e) if e.is_source_local() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    // ── Results ──────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn window(&self) -> &TimingWindow {
        &self.window
    }

    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    pub fn into_metrics(self) -> MetricSet {
        self.metrics
    }
}
