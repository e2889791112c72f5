use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::DateTime;
use clap::{Args, Subcommand};

use soultrace_core_types::{EpochMillis, TaskId};
use soultrace_task_store::{export_all, export_task};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum TaskCommand {
    /// List all recorded tasks
    List,
    /// Show a recorded task
    Show {
        /// Task identifier
        task_id: String,

        /// Print every captured event
        #[arg(long)]
        events: bool,
    },
    /// Export one task as pretty JSON
    Export {
        /// Task identifier
        task_id: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Export every task as one JSON object keyed by task id
    ExportAll {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Delete a recorded task
    Delete {
        /// Task identifier
        task_id: String,
    },
}

pub async fn cmd_tasks(args: TasksArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let store = ctx.store().await?;
    match args.command {
        TaskCommand::List => {
            let mut summaries = store.summaries().await?;
            summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            if output.emit(&summaries)? {
                return Ok(());
            }
            if summaries.is_empty() {
                println!("No tasks recorded yet");
                return Ok(());
            }
            println!(
                "{:<38} {:<10} {:>7} {:<20} {}",
                "TASK ID", "STATUS", "EVENTS", "STARTED", "TITLE"
            );
            for summary in summaries {
                println!(
                    "{:<38} {:<10} {:>7} {:<20} {}",
                    summary.id,
                    summary.status.as_str(),
                    summary.event_count,
                    format_millis(summary.start_time),
                    summary.title
                );
            }
            Ok(())
        }
        TaskCommand::Show { task_id, events } => {
            let id = TaskId::from(task_id);
            let Some(record) = store.get(&id).await? else {
                bail!("task {} not found", id);
            };
            if output.emit(&record)? {
                return Ok(());
            }
            println!("Task {} ({})", record.id, record.status.as_str());
            if !record.title.is_empty() {
                println!("Title: {}", record.title);
            }
            println!("Start URL: {}", record.start_url);
            println!("Started: {}", format_millis(record.start_time));
            if let Some(end) = record.end_time {
                println!("Ended: {}", format_millis(end));
            }
            if let Some(pending) = record.pending_navigation.as_ref() {
                println!("Pending navigation from {}", pending.from_url);
            }
            println!("Events: {}", record.events.len());
            if events {
                for event in &record.events {
                    println!(
                        "  {:<14} {:<20} {:<24} {}",
                        event.event_type.as_str(),
                        format_millis(event.timestamp),
                        event.bid().unwrap_or("-"),
                        event.url
                    );
                }
            }
            Ok(())
        }
        TaskCommand::Export { task_id, out } => {
            let id = TaskId::from(task_id);
            let count = export_task(store.as_ref(), &id, &out).await?;
            println!("Exported {} events of {} to {}", count, id, out.display());
            Ok(())
        }
        TaskCommand::ExportAll { out } => {
            let count = export_all(store.as_ref(), &out).await?;
            println!("Exported {} tasks to {}", count, out.display());
            Ok(())
        }
        TaskCommand::Delete { task_id } => {
            let id = TaskId::from(task_id);
            if store.delete(&id).await? {
                println!("Deleted task {}", id);
                Ok(())
            } else {
                bail!("task {} not found", id);
            }
        }
    }
}

fn format_millis(ms: EpochMillis) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
