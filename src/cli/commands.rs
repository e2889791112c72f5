use clap::Subcommand;

use super::config::ConfigArgs;
use super::record::RecordArgs;
use super::tasks::TasksArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a host transcript through a live capture session
    Record(RecordArgs),

    /// List, inspect, export or delete recorded tasks
    Tasks(TasksArgs),

    /// Manage SoulTrace configuration
    Config(ConfigArgs),
}
