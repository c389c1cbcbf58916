// Main loop is intentionally long for clarity
#![allow(clippy::too_many_lines)]

use anyhow::{Context, Result};
use aya::maps::RingBuf;
use clap::Parser;
use log::{info, warn};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

use xcapture::capture::{
    attach_probes, init_ebpf_logger, load_ebpf_object, run_task_iterator, write_config,
    EventPipeline,
};
use xcapture::cli::Args;
use xcapture::domain::CaptureError;
use xcapture::output::{
    header_row, narrow_columns, parse_columns, wide_columns, CsvSink, OutputKind,
};
use xcapture::timebase::TimeBase;

const SYSCEND_HEADER: &str =
    "TYPE,TID,TGID,SYSCALL_NR,SC_SEQ_NUM,SC_ENTER_TIME,SC_EXIT_TIME,DURATION_US";
const IORQEND_HEADER: &str = "TYPE,INSERT_TID,INSERT_TGID,ISSUE_TID,ISSUE_TGID,IORQ_SEQ_NUM,\
                              INSERT_NS,ISSUE_NS,COMPLETE_NS,DEV,SECTOR,BYTES,FLAGS,ERROR";
const STACKS_HEADER: &str = "TIMESTAMP,TID,TGID,STACK_HASH,STACK_ADDRS";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // The banner goes to stderr; stdout may be the CSV stream.
    eprintln!("🔍 xcapture v0.1.0");
    eprintln!("   Sampling thread activity at {} Hz", args.freq.max(1));

    // Column set: -g > -n/-w > the mode default (wide into files, narrow on
    // an interactive stdout).
    let columns = if let Some(spec) = &args.columns {
        parse_columns(spec)?
    } else if args.narrow {
        narrow_columns()
    } else if args.wide || args.output_dir.is_some() {
        wide_columns(args.kernel_stacks, args.user_stacks)
    } else {
        narrow_columns()
    };

    // The correlation base is required before any record can be rendered.
    let timebase = TimeBase::establish().context("Failed to establish clock correlation")?;

    let mut bpf = load_ebpf_object(args.bpf_object.as_deref())?;
    init_ebpf_logger(&mut bpf);
    let mut config = write_config(&mut bpf, &args)?;
    attach_probes(&mut bpf)?;

    let mut task_samples = RingBuf::try_from(
        bpf.take_map("TASK_SAMPLES")
            .ok_or_else(|| CaptureError::MapNotFound("TASK_SAMPLES".to_string()))?,
    )?;
    let mut sc_completions = RingBuf::try_from(
        bpf.take_map("SC_COMPLETIONS")
            .ok_or_else(|| CaptureError::MapNotFound("SC_COMPLETIONS".to_string()))?,
    )?;
    let mut iorq_completions = RingBuf::try_from(
        bpf.take_map("IORQ_COMPLETIONS")
            .ok_or_else(|| CaptureError::MapNotFound("IORQ_COMPLETIONS".to_string()))?,
    )?;

    let mut headers = vec![(OutputKind::Samples, header_row(&columns))];
    if args.track_syscall() {
        headers.push((OutputKind::Syscend, SYSCEND_HEADER.to_string()));
    }
    if args.track_iorq() {
        headers.push((OutputKind::Iorqend, IORQEND_HEADER.to_string()));
    }
    if args.kernel_stacks {
        headers.push((OutputKind::Kstacks, STACKS_HEADER.to_string()));
    }
    if args.user_stacks {
        headers.push((OutputKind::Ustacks, STACKS_HEADER.to_string()));
    }
    if let Some(dir) = &args.output_dir {
        eprintln!("   Output: {}", dir.display());
    }
    let sink = CsvSink::new(args.output_dir.clone(), headers);
    let mut pipeline = EventPipeline::new(timebase, sink, columns);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigpipe = signal(SignalKind::pipe())?;

    let tick_period = Duration::from_nanos(1_000_000_000 / u64::from(args.freq.max(1)));
    let mut interval = tokio::time::interval(tick_period);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_task_iterator(&mut bpf, &mut config)?;

                // Drain the sample burst fully before any completions so a
                // completion row never precedes its sample.
                while let Some(item) = task_samples.next() {
                    pipeline.handle_record(&item)?;
                }

                // Short completion poll between ticks.
                let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
                loop {
                    while let Some(item) = sc_completions.next() {
                        pipeline.handle_record(&item)?;
                    }
                    while let Some(item) = iorq_completions.next() {
                        pipeline.handle_record(&item)?;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }

                ticks += 1;
                if args.iterations != 0 && ticks >= args.iterations {
                    info!("Reached {} ticks, shutting down", args.iterations);
                    break;
                }
            }
            _ = &mut ctrl_c => {
                eprintln!("\n✓ Received Ctrl+C, shutting down gracefully");
                break;
            }
            _ = sigterm.recv() => {
                eprintln!("\n✓ Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigpipe.recv() => {
                warn!("Output pipe closed, shutting down");
                break;
            }
        }
    }

    pipeline.flush().context("Failed to flush output")?;
    eprintln!(
        "  Samples: {}  Syscall completions: {}  I/O completions: {}",
        pipeline.samples, pipeline.sc_completions, pipeline.iorq_completions
    );

    Ok(())
}
