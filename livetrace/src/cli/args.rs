//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use livetrace_common::{DEFAULT_SAMPLE_INTERVAL_MS, MAX_STACK_FRAMES};

use crate::profiling::SamplerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "livetrace",
    about = "Live sampling profiler for running processes",
    after_help = "\
EXAMPLES:
    livetrace my-app                         Trace the first process whose name matches
    livetrace 1234 --thread 1240             Trace PID 1234, deep-sample thread 1240
    livetrace --headless < commands.jsonl    JSON commands on stdin, replies on stdout"
)]
pub struct Args {
    /// Process to trace: a PID, or a pattern matched against image names
    #[arg(value_name = "PROCESS")]
    pub process: Option<String>,

    /// Focus thread to sample deeply; without it only top frames are sampled
    /// until one is picked
    #[arg(short, long)]
    pub thread: Option<u32>,

    /// Sleep between two sampling iterations, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Maximum stack depth captured for the focus thread
    #[arg(long, default_value_t = MAX_STACK_FRAMES)]
    pub max_frames: usize,

    /// Root of the proc filesystem
    #[arg(long, default_value = "/proc")]
    pub proc_root: PathBuf,

    /// Run without TUI: read JSON commands from stdin, write replies to stdout
    #[arg(long)]
    pub headless: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Sampling parameters for the tracer
    #[must_use]
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig { interval: Duration::from_millis(self.interval_ms), max_frames: self.max_frames.max(1) }
    }
}
