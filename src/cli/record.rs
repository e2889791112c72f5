use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;
use tracing::info;

use event_capture::{CaptureMetricSnapshot, SessionResponse};
use soultrace_cli::{parse_transcript, StepOutcome, TranscriptRunner};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// JSON-lines transcript of host callbacks to replay
    #[arg(short, long, value_name = "FILE")]
    pub transcript: PathBuf,

    /// Leave the session recording when the transcript ends
    #[arg(long)]
    pub no_stop: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordReport {
    steps: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished: Option<SessionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<CaptureMetricSnapshot>,
}

pub async fn cmd_record(args: RecordArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let raw = fs::read_to_string(&args.transcript)
        .await
        .with_context(|| format!("reading {}", args.transcript.display()))?;
    let steps = parse_transcript(&raw)
        .with_context(|| format!("parsing {}", args.transcript.display()))?;
    info!(
        path = %args.transcript.display(),
        steps = steps.len(),
        "replaying transcript"
    );

    let store = ctx.store().await?;
    let mut runner = TranscriptRunner::connect(ctx.config(), store);
    let outcomes = runner.run_all(steps).await?;
    let metrics = runner.session().map(|s| s.metrics().snapshot());
    let finished = if args.no_stop {
        None
    } else {
        runner.finish().await
    };

    let report = RecordReport {
        steps: outcomes,
        finished,
        metrics,
    };
    if output.emit(&report)? {
        return Ok(());
    }

    println!("{:<4} {:<10} {:<34} {}", "#", "STEP", "RESPONSE", "RECORDED");
    for (idx, outcome) in report.steps.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<34} {}",
            idx + 1,
            outcome.step,
            outcome.response.as_ref().map_or("-", |r| r.as_str()),
            outcome.recorded
        );
    }
    if let Some(finished) = report.finished.as_ref() {
        println!("\nSession finished: {}", finished.as_str());
        if let SessionResponse::Failed { reason } = finished {
            println!("Reason: {reason}");
        }
    }
    if let Some(m) = report.metrics.as_ref() {
        println!(
            "Kept {} events, dropped {}, discarded {}, navigations {}",
            m.kept,
            m.dropped(),
            m.discarded,
            m.navigations
        );
    }
    Ok(())
}
