use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Walk through the change-feed sample: insert documents, capture a
    /// cutoff, then read back each partition's changes in order
    Demo {
        #[arg(long, default_value_t = 4, help = "Number of feed partitions")]
        partitions: usize,

        #[arg(
            long,
            help = "Persist checkpoints to a sled database at this path instead of in-process memory"
        )]
        durable: Option<PathBuf>,

        #[arg(
            long,
            default_value_t = 200,
            help = "Pause between document writes, in milliseconds"
        )]
        pause_ms: u64,
    },
}
