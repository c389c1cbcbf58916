//! eBPF program loading and attachment
//!
//! Loads the compiled eBPF object, writes the probe configuration, attaches
//! the tracepoints, and drives the task iterator once per sample tick.
//!
//! The bytecode is loaded from disk at runtime (`--bpf-object`, or
//! `xcapture-ebpf` next to this binary) so the userspace build does not
//! depend on the cross-compiled artifact being present.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aya::{
    maps::{HashMap, MapData},
    programs::{BtfTracePoint, Iter, TracePoint},
    Btf, Ebpf,
};
use aya_log::EbpfLogger;
use log::{info, warn};

use xcapture_common::{
    CONFIG_DAEMON_PORTS, CONFIG_KSTACKS, CONFIG_SAMPLE_START_KTIME, CONFIG_SELF_TGID,
    CONFIG_SHOW_ALL, CONFIG_TARGET_TGID, CONFIG_TRACK_IORQ, CONFIG_TRACK_SYSCALL, CONFIG_USTACKS,
};

use crate::cli::Args;
use crate::domain::CaptureError;
use crate::timebase::monotonic_now_ns;

fn default_bpf_object_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate running binary")?;
    Ok(exe.with_file_name("xcapture-ebpf"))
}

fn attach_err(probe: &str, error: &dyn std::fmt::Display) -> CaptureError {
    CaptureError::ProbeAttachFailed { probe: probe.to_string(), error: error.to_string() }
}

/// Load the eBPF object file
///
/// # Errors
/// Returns [`CaptureError::EbpfLoadFailed`] if the object cannot be read or
/// verified
pub fn load_ebpf_object(path: Option<&Path>) -> Result<Ebpf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_bpf_object_path()?,
    };
    let bpf = Ebpf::load_file(&path).map_err(|e| CaptureError::EbpfLoadFailed {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(bpf)
}

/// Initialize eBPF logger
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Write the probe configuration and return the owned CONFIG map handle;
/// the sampler re-uses it every tick for the pass-start timestamp.
///
/// # Errors
/// Returns an error if the CONFIG map is missing or cannot be written
pub fn write_config(bpf: &mut Ebpf, args: &Args) -> Result<HashMap<MapData, u32, u64>> {
    let mut config: HashMap<_, u32, u64> = HashMap::try_from(
        bpf.take_map("CONFIG").ok_or_else(|| CaptureError::MapNotFound("CONFIG".to_string()))?,
    )?;

    config.insert(CONFIG_SHOW_ALL, u64::from(args.all_tasks), 0)?;
    config.insert(CONFIG_TARGET_TGID, args.tgid.map_or(0, u64::from), 0)?;
    config.insert(CONFIG_DAEMON_PORTS, u64::from(args.daemon_ports), 0)?;
    config.insert(CONFIG_KSTACKS, u64::from(args.kernel_stacks), 0)?;
    config.insert(CONFIG_USTACKS, u64::from(args.user_stacks), 0)?;
    config.insert(CONFIG_SELF_TGID, u64::from(std::process::id()), 0)?;
    config.insert(CONFIG_TRACK_SYSCALL, u64::from(args.track_syscall()), 0)?;
    config.insert(CONFIG_TRACK_IORQ, u64::from(args.track_iorq()), 0)?;

    info!("✓ Set daemon-port threshold: {}", args.daemon_ports);
    if let Some(tgid) = args.tgid {
        info!("✓ Restricted to tgid {tgid}");
    }
    Ok(config)
}

/// Attach every probe and load the task iterator
///
/// # Errors
/// Returns an error if a program is missing or any attachment fails; attach
/// failures at startup are fatal
pub fn attach_probes(bpf: &mut Ebpf) -> Result<()> {
    let btf = Btf::from_sys_fs().context("Failed to read kernel BTF")?;

    for (prog, category, name) in [
        ("sys_enter", "raw_syscalls", "sys_enter"),
        ("sys_exit", "raw_syscalls", "sys_exit"),
        ("task_exit", "sched", "sched_process_exit"),
    ] {
        let program: &mut TracePoint = bpf
            .program_mut(prog)
            .ok_or_else(|| CaptureError::ProgramNotFound(prog.to_string()))?
            .try_into()?;
        program.load().map_err(|e| attach_err(prog, &e))?;
        program.attach(category, name).map_err(|e| attach_err(prog, &e))?;
        info!("✓ Attached tracepoint: {category}/{name}");
    }

    for name in ["block_rq_insert", "block_rq_issue", "block_rq_complete"] {
        let program: &mut BtfTracePoint = bpf
            .program_mut(name)
            .ok_or_else(|| CaptureError::ProgramNotFound(name.to_string()))?
            .try_into()?;
        program.load(name, &btf).map_err(|e| attach_err(name, &e))?;
        program.attach().map_err(|e| attach_err(name, &e))?;
        info!("✓ Attached BTF tracepoint: {name}");
    }

    let program: &mut Iter = bpf
        .program_mut("sample_task")
        .ok_or_else(|| CaptureError::ProgramNotFound("sample_task".to_string()))?
        .try_into()?;
    program.load("task", &btf).map_err(|e| attach_err("sample_task", &e))?;
    info!("✓ Loaded task iterator");

    Ok(())
}

/// Run one task walk: stamp the pass-start time, create a fresh iterator
/// link and read it to completion, which drives the kernel-side walk.
///
/// # Errors
/// Returns an error if the iterator cannot be attached or read
pub fn run_task_iterator(
    bpf: &mut Ebpf,
    config: &mut HashMap<MapData, u32, u64>,
) -> Result<()> {
    let start = monotonic_now_ns().context("Monotonic clock read failed")?;
    config.insert(CONFIG_SAMPLE_START_KTIME, start, 0)?;

    let program: &mut Iter = bpf
        .program_mut("sample_task")
        .ok_or_else(|| CaptureError::ProgramNotFound("sample_task".to_string()))?
        .try_into()?;
    let link_id = program.attach().map_err(|e| attach_err("sample_task", &e))?;
    let link = program.take_link(link_id)?;
    let mut iter_file = link.into_file()?;

    // The iterator produces no text output; reading it to EOF is what walks
    // the task list and fills the ring buffer.
    let mut sink = Vec::new();
    iter_file.read_to_end(&mut sink)?;
    Ok(())
}
