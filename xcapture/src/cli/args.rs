//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "xcapture",
    about = "Continuously sample Linux thread activity and emit wide CSV",
    after_help = "\
EXAMPLES:
    sudo xcapture                            Sample at 1 Hz to stdout
    sudo xcapture -F 20 -o /var/log/xcap     20 Hz into hourly CSV files
    sudo xcapture -t syscall -t iorq -k      Track completions, kernel stacks
    sudo xcapture -p 1234 -a                 Every thread of one process"
)]
pub struct Args {
    /// Sampling frequency in Hz
    #[arg(short = 'F', long = "freq", default_value_t = 1)]
    pub freq: u32,

    /// Exit after N sample ticks (0 = run until interrupted)
    #[arg(short = 'i', long = "iterations", default_value_t = 0)]
    pub iterations: u64,

    /// Disable the interest filter and emit every task
    #[arg(short = 'a', long = "all")]
    pub all_tasks: bool,

    /// Restrict sampling to a single process (tgid)
    #[arg(short = 'p', long = "pid")]
    pub tgid: Option<u32>,

    /// Local ports at or below this threshold mark an idle daemon socket
    #[arg(short = 'd', long = "daemon-ports", default_value_t = 10000)]
    pub daemon_ports: u16,

    /// Capture kernel stack traces
    #[arg(short = 'k', long = "kstacks")]
    pub kernel_stacks: bool,

    /// Capture userspace stack traces
    #[arg(short = 'u', long = "ustacks")]
    pub user_stacks: bool,

    /// Emit completion records for sampled syscalls and/or block I/O
    #[arg(short = 't', long = "track", value_enum)]
    pub track: Vec<TrackKind>,

    /// Write hourly CSV files into this directory instead of stdout
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Narrow column set for sample rows (the default on stdout)
    #[arg(short = 'n', long = "narrow", conflicts_with_all = &["wide", "columns"])]
    pub narrow: bool,

    /// Wide column set, every sample column (the default with -o)
    #[arg(short = 'w', long = "wide", conflicts_with = "columns")]
    pub wide: bool,

    /// Comma-separated custom column list for sample rows
    #[arg(short = 'g', long = "columns")]
    pub columns: Option<String>,

    /// Path to the compiled eBPF object (defaults to next to this binary)
    #[arg(long = "bpf-object")]
    pub bpf_object: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TrackKind {
    Syscall,
    Iorq,
}

impl Args {
    #[must_use]
    pub fn track_syscall(&self) -> bool {
        self.track.contains(&TrackKind::Syscall)
    }

    #[must_use]
    pub fn track_iorq(&self) -> bool {
        self.track.contains(&TrackKind::Iorq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["xcapture"]);
        assert_eq!(args.freq, 1);
        assert_eq!(args.daemon_ports, 10000);
        assert!(!args.all_tasks);
        assert!(args.track.is_empty());
    }

    #[test]
    fn test_track_flags() {
        let args = Args::parse_from(["xcapture", "-t", "syscall", "-t", "iorq"]);
        assert!(args.track_syscall());
        assert!(args.track_iorq());
    }

    #[test]
    fn test_column_set_flags_conflict() {
        assert!(Args::try_parse_from(["xcapture", "-n", "-w"]).is_err());
        let args = Args::parse_from(["xcapture", "-w"]);
        assert!(args.wide);
    }
}
