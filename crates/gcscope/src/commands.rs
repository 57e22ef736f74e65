//! Commands: stats, compare and replay.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine::metrics::export::save_channels;
use engine::trace::{Activity, ActivityKind, TraceListener};
use engine::{
    EngineConfig, Ingestor, ReplayMode, ReplayScheduler, SourceRegistry, Throttle, Trace,
};
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::report::{self, RunReport, StatsOutput};

/// Ingest `paths` into one run on a blocking thread.
async fn ingest_run(
    engine: EngineConfig,
    name: String,
    paths: Vec<PathBuf>,
    registry: Arc<SourceRegistry>,
) -> Result<Ingestor> {
    tokio::task::spawn_blocking(move || -> Result<Ingestor> {
        let mut ingestor = Ingestor::new(engine, &name, registry)?;
        ingestor.ingest_files(&paths)?;
        Ok(ingestor)
    })
    .await
    .context("ingestion thread panicked")?
}

fn run_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn stats(
    config: &ConsoleConfig,
    files: Vec<PathBuf>,
    concat: bool,
    json: bool,
    dump_dir: Option<PathBuf>,
) -> Result<()> {
    let registry = Arc::new(SourceRegistry::new());
    for path in &files {
        registry.register(&path.display().to_string());
    }

    let runs: Vec<Ingestor> = if concat {
        vec![ingest_run(config.engine.clone(), "concat".to_string(), files, Arc::clone(&registry)).await?]
    } else {
        // one thread and one trace per source
        let handles: Vec<_> = files
            .into_iter()
            .map(|path| {
                let name = run_name(&path);
                tokio::spawn(ingest_run(
                    config.engine.clone(),
                    name,
                    vec![path],
                    Arc::clone(&registry),
                ))
            })
            .collect();
        let mut runs = Vec::with_capacity(handles.len());
        for handle in handles {
            runs.push(handle.await.context("ingestion task panicked")??);
        }
        runs
    };

    if let Some(dir) = dump_dir {
        for ingestor in &runs {
            let target = if runs.len() == 1 {
                dir.clone()
            } else {
                dir.join(ingestor.trace().name())
            };
            save_channels(ingestor.metrics(), &target)
                .with_context(|| format!("dumping channels to {}", target.display()))?;
        }
    }

    let output = StatsOutput {
        sources: registry.snapshot(),
        runs: runs.iter().map(RunReport::from_ingestor).collect(),
    };
    let failed = registry.failed().len();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json || config.output.json {
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
    } else {
        report::write_sources(&mut out, &output.sources)?;
        for run in &output.runs {
            report::write_run(&mut out, run, config.output.min_samples)?;
        }
    }

    if failed > 0 {
        warn!(failed, "some sources failed");
    }
    Ok(())
}

pub async fn compare(config: &ConsoleConfig, reference: PathBuf, candidate: PathBuf, json: bool) -> Result<()> {
    let registry = Arc::new(SourceRegistry::new());
    let reference_run = tokio::spawn(ingest_run(
        config.engine.clone(),
        "reference".to_string(),
        vec![reference.clone()],
        Arc::clone(&registry),
    ));
    let candidate_run = ingest_run(
        config.engine.clone(),
        "candidate".to_string(),
        vec![candidate.clone()],
        Arc::clone(&registry),
    )
    .await?;
    let reference_run = reference_run.await.context("ingestion task panicked")??;

    if let Some(record) = registry.failed().into_iter().next() {
        anyhow::bail!("cannot compare: {} failed ({:?})", record.source_id, record.status);
    }

    let rows = candidate_run.metrics().compare(reference_run.metrics());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json || config.output.json {
        serde_json::to_writer_pretty(&mut out, &rows)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{} -> {}", reference.display(), candidate.display())?;
        report::write_comparison(&mut out, &rows)?;
    }
    Ok(())
}

/// Logs replay progress as activities land in the target trace.
struct ProgressListener {
    every: u64,
    seen: AtomicU64,
}

impl TraceListener for ProgressListener {
    fn kind_registered(&self, kind: &ActivityKind) {
        info!(id = kind.id(), name = %kind.name(), "replay: new activity kind");
    }

    fn activity_added(&self, kind: &ActivityKind, activity: &Activity) {
        let seen = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.every == 0 {
            info!(
                emitted = seen,
                kind = %kind.name(),
                start = activity.start(),
                "replay: progress"
            );
        }
    }
}

pub async fn replay(config: &ConsoleConfig, file: PathBuf, mode: ReplayMode, speed: Option<u32>) -> Result<()> {
    let registry = Arc::new(SourceRegistry::new());
    let ingestor = ingest_run(config.engine.clone(), run_name(&file), vec![file.clone()], Arc::clone(&registry)).await?;
    if let Some(record) = registry.failed().into_iter().next() {
        anyhow::bail!("cannot replay: {} failed ({:?})", record.source_id, record.status);
    }

    let mut replay_config = config.engine.replay.clone();
    if let Some(speed) = speed {
        replay_config.speed_percent = speed;
    }
    replay_config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid replay settings")?;

    let throttle = Throttle::from_config(mode, &replay_config);
    let scheduler = Arc::new(ReplayScheduler::new(
        Arc::clone(ingestor.trace()),
        throttle,
        Duration::from_millis(replay_config.poll_interval_ms),
    ));
    let target = Arc::new(Trace::new(format!("replay of {}", run_name(&file))));
    target.add_listener(Arc::new(ProgressListener {
        every: config.output.progress_every,
        seen: AtomicU64::new(0),
    }));

    info!(%mode, activities = ingestor.trace().all_len(), "Starting replay (Ctrl+C to stop)");
    scheduler.play(Arc::clone(&target))?;

    let waiter = {
        let scheduler = Arc::clone(&scheduler);
        tokio::task::spawn_blocking(move || scheduler.wait_for_shutdown())
    };
    tokio::select! {
        res = waiter => res.context("replay waiter panicked")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping replay...");
            scheduler.stop();
            let scheduler = Arc::clone(&scheduler);
            tokio::task::spawn_blocking(move || scheduler.wait_for_shutdown())
                .await
                .context("replay waiter panicked")?;
        }
    }

    info!(
        emitted = scheduler.emitted(),
        of = ingestor.trace().all_len(),
        kinds = target.kind_count(),
        "Replay finished"
    );
    Ok(())
}
