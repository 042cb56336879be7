use clap::ValueEnum;

mod cache_cmd;
mod config_cmd;
mod queue_cmd;
mod storage_cmd;
mod sync_cmd;
mod watch_cmd;

pub use cache_cmd::CacheCommand;
pub use config_cmd::ConfigCommand;
pub use queue_cmd::QueueCommand;
pub use storage_cmd::{ClearCommand, UsageCommand};
pub use sync_cmd::SyncCommand;
pub use watch_cmd::WatchCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
