//! Report: serializable run reports and their text rendering.

use std::io::Write;

use anyhow::Result;
use engine::ingest::SourceRecord;
use engine::metrics::{ChannelComparison, MetricsReport, Summary};
use engine::parser::DispatcherStats;
use engine::{Ingestor, SourceStatus};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub id: usize,
    pub name: String,
    pub durations: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub trace: String,
    pub activities: Vec<KindReport>,
    pub all_activities: Summary,
    pub metrics: MetricsReport,
    pub dispatcher: DispatcherStats,
}

impl RunReport {
    pub fn from_ingestor(ingestor: &Ingestor) -> Self {
        let trace = ingestor.trace();
        Self {
            trace: trace.name().to_string(),
            activities: trace
                .kind_summaries()
                .into_iter()
                .map(|(kind, durations)| KindReport {
                    id: kind.id(),
                    name: kind.name().to_string(),
                    durations,
                })
                .collect(),
            all_activities: trace.all_summary(),
            metrics: ingestor.metrics().report(),
            dispatcher: ingestor.dispatcher_stats(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    pub sources: Vec<SourceRecord>,
    pub runs: Vec<RunReport>,
}

pub fn write_sources<W: Write>(out: &mut W, sources: &[SourceRecord]) -> Result<()> {
    writeln!(out, "Sources")?;
    for record in sources {
        let status = match &record.status {
            SourceStatus::Pending => "pending".to_string(),
            SourceStatus::Running { lines } => format!("running ({} lines)", lines),
            SourceStatus::Finished { lines, matched } => {
                format!("ok, {} lines, {} recognized", lines, matched)
            }
            SourceStatus::Failed { line, reason } if *line > 0 => {
                format!("FAILED at line {}: {}", line, reason)
            }
            SourceStatus::Failed { reason, .. } => format!("FAILED: {}", reason),
        };
        writeln!(out, "  {:<40} {}", record.source_id, status)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_run<W: Write>(out: &mut W, run: &RunReport, min_samples: u64) -> Result<()> {
    let m = &run.metrics;
    writeln!(out, "Run `{}`", run.trace)?;
    writeln!(
        out,
        "  elapsed {:.3} s, paused {:.3} s{}",
        m.total_elapsed_secs,
        m.total_pause_secs,
        match m.gc_overhead_percent {
            Some(p) => format!(", GC overhead {:.2}%", p),
            None => String::new(),
        }
    )?;
    if m.generated_timestamps {
        writeln!(out, "  (some timestamps were synthesized; rates are not reported)")?;
    }
    writeln!(
        out,
        "  {} of {} lines recognized, matchers reordered {} times",
        run.dispatcher.matches, run.dispatcher.lines, run.dispatcher.reorders
    )?;

    writeln!(out)?;
    writeln!(
        out,
        "  {:<32} {:>8} {:>12} {:>12} {:>12} {:>12}",
        "Activity", "count", "total s", "mean s", "max s", "stddev"
    )?;
    for kind in &run.activities {
        write_summary_row(out, &kind.name, &kind.durations)?;
    }
    write_summary_row(out, engine::trace::ALL_ACTIVITIES, &run.all_activities)?;

    writeln!(out)?;
    writeln!(
        out,
        "  {:<32} {:>8} {:>12} {:>12} {:>12} {:>12}",
        "Channel", "count", "sum", "mean", "max", "stddev"
    )?;
    for channel in m.channels.iter().filter(|c| c.summary.count >= min_samples) {
        let label = format!("{} ({})", channel.label, channel.unit);
        write_summary_row(out, &label, &channel.summary)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_summary_row<W: Write>(out: &mut W, label: &str, s: &Summary) -> Result<()> {
    writeln!(
        out,
        "  {:<32} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
        label, s.count, s.sum, s.mean, s.max, s.stddev
    )?;
    Ok(())
}

pub fn write_comparison<W: Write>(out: &mut W, rows: &[ChannelComparison]) -> Result<()> {
    writeln!(
        out,
        "{:<40} {:>12} {:>12} {:>10} {:>10}",
        "Channel", "ref mean", "new mean", "mean %", "count %"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<40} {:>12.4} {:>12.4} {:>+10.2} {:>+10.2}",
            row.tag.label(),
            row.reference.mean,
            row.candidate.mean,
            row.change.mean,
            row.change.count
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{EngineConfig, SourceRegistry};
    use std::io::Cursor;
    use std::sync::Arc;

    fn ingested(log: &str) -> Ingestor {
        let mut ing = Ingestor::new(EngineConfig::default(), "run", Arc::new(SourceRegistry::new())).unwrap();
        ing.ingest_reader("a.log", Cursor::new(log.to_string())).unwrap();
        ing
    }

    #[test]
    fn test_run_report_lists_kinds_in_id_order() {
        let ing = ingested("FullGC 1.0 0.5\nYoungGC 2.0 0.1\nYoungGC 3.0 0.1\n");
        let report = RunReport::from_ingestor(&ing);
        let names: Vec<&str> = report.activities.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["Full GC", "Young GC"]);
        assert_eq!(report.activities[1].durations.count, 2);
        assert_eq!(report.all_activities.count, 3);
        assert_eq!(report.dispatcher.matches, 3);
    }

    #[test]
    fn test_text_report_mentions_every_kind() {
        let ing = ingested("YoungGC 1.250 0.012\nSweep 2.0 0.5 87.5\n");
        let mut out = Vec::new();
        write_run(&mut out, &RunReport::from_ingestor(&ing), 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Young GC"), "{}", text);
        assert!(text.contains("Sweep"), "{}", text);
        assert!(text.contains("2 of 2 lines recognized"), "{}", text);
    }

    #[test]
    fn test_sources_table_shows_failure_line() {
        let registry = SourceRegistry::new();
        registry.update(
            "bad.log",
            SourceStatus::Failed {
                line: 7,
                reason: "boom".into(),
            },
        );
        let mut out = Vec::new();
        write_sources(&mut out, &registry.snapshot()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("FAILED at line 7: boom"), "{}", text);
    }

    #[test]
    fn test_report_serializes() {
        let ing = ingested("YoungGC 1.0 0.1\n");
        let json = serde_json::to_value(RunReport::from_ingestor(&ing)).unwrap();
        assert_eq!(json["trace"], "run");
        assert_eq!(json["activities"][0]["name"], "Young GC");
    }
}
