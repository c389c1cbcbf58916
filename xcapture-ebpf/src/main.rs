//! # xcapture - eBPF Kernel-Side Instrumentation
//!
//! Kernel programs for the thread-activity sampler. Two kinds of hooks
//! cooperate around a per-task extended thread state (eTSA):
//!
//! - **Event probes** run in the context of the task that triggered them:
//!   syscall entry/exit (`raw_syscalls` tracepoints), block I/O
//!   insert/issue/complete (BTF tracepoints carrying `struct request *`),
//!   and a `sched_process_exit` hook that reclaims the task's eTSA record.
//! - **The task iterator** (`iter/task`) walks every task once per sample
//!   tick, applies the interest filter, marks in-flight syscalls and block
//!   requests as sampled, and emits one task-sample record per interesting
//!   task.
//!
//! ```text
//!  sys_enter ──► eTSA (seq++, enter time)        block_rq_insert ──► IORQ_TRACKING
//!  sys_exit  ──► SC_COMPLETIONS (if sampled)     block_rq_issue  ──► (issue ids)
//!                                                block_rq_complete ─► IORQ_COMPLETIONS
//!  iter/task ──► interest filter ──► mark sampled ──► TASK_SAMPLES
//! ```
//!
//! Completion records are only emitted for operations the iterator observed
//! in flight; everything else is dropped on the floor. Ring-buffer overflow
//! drops the record (lossy by design at this layer), never blocks the probe.
//!
//! All handlers are short and non-blocking. Probes for the same task are
//! serialized by the kernel's task locking; the iterator's writes to
//! `sc_sampled`/`last_iorq_sampled` race with the owning task's exit probes,
//! which is benign: either the completion is emitted or the flag dies with
//! the next syscall entry.

#![no_std]
#![no_main]
#![allow(unused_unsafe)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

mod bindings;

use core::ffi::c_void;

use aya_ebpf::{
    helpers::{
        bpf_get_current_pid_tgid, bpf_ktime_get_ns, bpf_probe_read_kernel,
        bpf_probe_read_kernel_str_bytes, bpf_probe_read_user,
        gen::{bpf_get_task_stack, bpf_task_pt_regs},
    },
    macros::{btf_tracepoint, iter, map, tracepoint},
    maps::{HashMap, RingBuf},
    programs::{BtfTracePointContext, IterContext, TracePointContext},
    EbpfContext,
};
use aya_log_ebpf::warn;

use bindings::{
    aio_ring, block_device, bpf_iter__task, file, pt_regs, request, socket, task_struct,
    S_IFMT, S_IFSOCK,
};
use xcapture_common::{
    aio_inflight, syscall_has_fd_arg0, syscall_is_aio_wait, syscall_is_socket_read,
    task_is_interesting, IorqCompletion, IorqInfo, SockInfo, SyscallCompletion, SysEnterArgs,
    SysExitArgs, TaskSample, ThreadState, AIO_INFLIGHT_UNKNOWN, CONFIG_DAEMON_PORTS,
    CONFIG_KSTACKS, CONFIG_SAMPLE_START_KTIME, CONFIG_SELF_TGID, CONFIG_SHOW_ALL,
    CONFIG_TARGET_TGID, CONFIG_TRACK_IORQ, CONFIG_TRACK_SYSCALL, CONFIG_USTACKS,
    EVENT_IORQ_COMPLETION, EVENT_SC_COMPLETION, EVENT_TASK_INFO, MAX_STACK_DEPTH, SYSCALL_NONE,
};

const BPF_F_USER_STACK: u64 = 1 << 8;

// ============================================================================
// Maps
// ============================================================================

/// Task-sample records, one per interesting task per iterator pass. Bursty:
/// a single tick writes one record per interesting task.
#[map]
static TASK_SAMPLES: RingBuf = RingBuf::with_byte_size(16 * 1024 * 1024, 0);

/// Syscall-completion records for syscalls observed in flight by the sampler.
#[map]
static SC_COMPLETIONS: RingBuf = RingBuf::with_byte_size(16 * 1024 * 1024, 0);

/// Block I/O completion records for requests observed in flight.
#[map]
static IORQ_COMPLETIONS: RingBuf = RingBuf::with_byte_size(16 * 1024 * 1024, 0);

/// The eTSA store: one extended thread-state record per live task, keyed by
/// tid. Entries are reclaimed by the `task_exit` hook.
#[map]
static THREAD_STATES: HashMap<u32, ThreadState> = HashMap::with_max_entries(16384, 0);

/// In-flight block requests keyed by the request pointer. Entries live from
/// insert (or direct issue) until completion.
#[map]
static IORQ_TRACKING: HashMap<u64, IorqInfo> = HashMap::with_max_entries(65536, 0);

/// Runtime configuration written by userspace (see `CONFIG_*` keys).
#[map]
static CONFIG: HashMap<u32, u64> = HashMap::with_max_entries(16, 0);

fn config(key: u32) -> u64 {
    unsafe { CONFIG.get(&key).copied().unwrap_or(0) }
}

/// Get-or-create the eTSA record for a task, returning a pointer for
/// in-place mutation.
fn thread_state_ptr(tid: u32, tgid: u32) -> Option<*mut ThreadState> {
    if let Some(ts) = THREAD_STATES.get_ptr_mut(&tid) {
        return Some(ts);
    }
    let fresh = ThreadState {
        tid,
        tgid,
        in_syscall_nr: SYSCALL_NONE,
        aio_inflight_reqs: 0,
        ..ThreadState::default()
    };
    if THREAD_STATES.insert(&tid, &fresh, 0).is_err() {
        return None;
    }
    THREAD_STATES.get_ptr_mut(&tid)
}

// ============================================================================
// Syscall probes
// ============================================================================

#[tracepoint]
pub fn sys_enter(ctx: TracePointContext) -> u32 {
    match unsafe { try_sys_enter(&ctx) } {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

unsafe fn try_sys_enter(ctx: &TracePointContext) -> Result<(), i64> {
    let args = ctx.as_ptr() as *const SysEnterArgs;
    let nr = (*args).id;

    let pid_tgid = bpf_get_current_pid_tgid();
    let tid = pid_tgid as u32;
    let tgid = (pid_tgid >> 32) as u32;

    let ts = thread_state_ptr(tid, tgid).ok_or(1i64)?;
    (*ts).in_syscall_nr = nr as i32;
    (*ts).sc_enter_time = bpf_ktime_get_ns();
    (*ts).sc_sequence_num += 1;

    // The AIO-wait syscalls carry the ring address in arg0; snapshot the
    // in-flight count at the wait boundary.
    if syscall_is_aio_wait(nr) {
        (*ts).aio_inflight_reqs = read_aio_inflight((*args).args[0]);
    }

    Ok(())
}

unsafe fn read_aio_inflight(ring_addr: u64) -> i32 {
    let ring = ring_addr as *const aio_ring;
    let Ok(head) = bpf_probe_read_user(&(*ring).head) else {
        return AIO_INFLIGHT_UNKNOWN;
    };
    let Ok(tail) = bpf_probe_read_user(&(*ring).tail) else {
        return AIO_INFLIGHT_UNKNOWN;
    };
    aio_inflight(head, tail) as i32
}

#[tracepoint]
pub fn sys_exit(ctx: TracePointContext) -> u32 {
    match unsafe { try_sys_exit(&ctx) } {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

unsafe fn try_sys_exit(ctx: &TracePointContext) -> Result<(), i64> {
    let args = ctx.as_ptr() as *const SysExitArgs;
    let tid = bpf_get_current_pid_tgid() as u32;

    let Some(ts) = THREAD_STATES.get_ptr_mut(&tid) else {
        return Ok(());
    };

    if (*ts).sc_sampled != 0 {
        if let Some(mut entry) = SC_COMPLETIONS.reserve::<SyscallCompletion>(0) {
            entry.write(SyscallCompletion {
                event_type: EVENT_SC_COMPLETION,
                tid: (*ts).tid,
                tgid: (*ts).tgid,
                syscall_nr: (*ts).in_syscall_nr,
                sc_sequence_num: (*ts).sc_sequence_num,
                sc_enter_time: (*ts).sc_enter_time,
                sc_exit_time: bpf_ktime_get_ns(),
                ret: (*args).ret,
            });
            entry.submit(0);
        }
        (*ts).sc_sampled = 0;
    }

    (*ts).in_syscall_nr = SYSCALL_NONE;
    (*ts).sc_enter_time = 0;
    Ok(())
}

// ============================================================================
// Block I/O probes
// ============================================================================

#[btf_tracepoint(function = "block_rq_insert")]
pub fn block_rq_insert(ctx: BtfTracePointContext) -> i32 {
    match unsafe { try_block_rq_insert(&ctx) } {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

unsafe fn try_block_rq_insert(ctx: &BtfTracePointContext) -> Result<(), i64> {
    let rq: *const request = ctx.arg(0);

    let pid_tgid = bpf_get_current_pid_tgid();
    let tid = pid_tgid as u32;
    let tgid = (pid_tgid >> 32) as u32;

    let ts = thread_state_ptr(tid, tgid).ok_or(1i64)?;
    (*ts).iorq_sequence_num += 1;

    let info = IorqInfo {
        iorq_sequence_num: (*ts).iorq_sequence_num,
        insert_tid: tid,
        insert_tgid: tgid,
        insert_time: bpf_ktime_get_ns(),
        ..IorqInfo::default()
    };
    IORQ_TRACKING.insert(&(rq as u64), &info, 0)?;
    (*ts).last_iorq_rq = rq as u64;

    Ok(())
}

#[btf_tracepoint(function = "block_rq_issue")]
pub fn block_rq_issue(ctx: BtfTracePointContext) -> i32 {
    match unsafe { try_block_rq_issue(&ctx) } {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

unsafe fn try_block_rq_issue(ctx: &BtfTracePointContext) -> Result<(), i64> {
    let rq: *const request = ctx.arg(0);
    let key = rq as u64;
    let now = bpf_ktime_get_ns();

    let pid_tgid = bpf_get_current_pid_tgid();
    let tid = pid_tgid as u32;
    let tgid = (pid_tgid >> 32) as u32;

    // Normal insert -> issue path: the issuing task may not be the inserter.
    if let Some(info) = IORQ_TRACKING.get_ptr_mut(&key) {
        (*info).issue_tid = tid;
        (*info).issue_tgid = tgid;
        (*info).issue_time = now;
        return Ok(());
    }

    // Direct dispatch skipped the queue; both identities are the current task.
    let ts = thread_state_ptr(tid, tgid).ok_or(1i64)?;
    (*ts).iorq_sequence_num += 1;

    let info = IorqInfo {
        iorq_sequence_num: (*ts).iorq_sequence_num,
        insert_tid: tid,
        insert_tgid: tgid,
        issue_tid: tid,
        issue_tgid: tgid,
        insert_time: now,
        issue_time: now,
        ..IorqInfo::default()
    };
    IORQ_TRACKING.insert(&key, &info, 0)?;
    (*ts).last_iorq_rq = key;

    Ok(())
}

#[btf_tracepoint(function = "block_rq_complete")]
pub fn block_rq_complete(ctx: BtfTracePointContext) -> i32 {
    match unsafe { try_block_rq_complete(&ctx) } {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

unsafe fn try_block_rq_complete(ctx: &BtfTracePointContext) -> Result<(), i64> {
    let rq: *const request = ctx.arg(0);
    let error: i32 = ctx.arg(1);
    let nr_bytes: u32 = ctx.arg(2);
    let key = rq as u64;

    let info = match IORQ_TRACKING.get(&key) {
        Some(i) => *i,
        None => return Ok(()),
    };

    // I/Os never observed by the sampler are silently discarded.
    if info.sampled == 0 {
        IORQ_TRACKING.remove(&key)?;
        return Ok(());
    }

    if let Some(mut entry) = IORQ_COMPLETIONS.reserve::<IorqCompletion>(0) {
        entry.write(IorqCompletion {
            event_type: EVENT_IORQ_COMPLETION,
            insert_tid: info.insert_tid,
            insert_tgid: info.insert_tgid,
            issue_tid: info.issue_tid,
            issue_tgid: info.issue_tgid,
            _pad: 0,
            iorq_sequence_num: info.iorq_sequence_num,
            insert_time: info.insert_time,
            issue_time: info.issue_time,
            complete_time: bpf_ktime_get_ns(),
            dev: read_rq_dev(rq),
            bytes: nr_bytes,
            sector: bpf_probe_read_kernel(&(*rq).__sector).unwrap_or(0),
            cmd_flags: bpf_probe_read_kernel(&(*rq).cmd_flags).unwrap_or(0),
            error,
        });
        entry.submit(0);
    }

    IORQ_TRACKING.remove(&key)?;
    Ok(())
}

unsafe fn read_rq_dev(rq: *const request) -> u32 {
    let part: *mut block_device = match bpf_probe_read_kernel(&(*rq).part) {
        Ok(p) => p,
        Err(_) => return 0,
    };
    if part.is_null() {
        return 0;
    }
    bpf_probe_read_kernel(&(*part).bd_dev).unwrap_or(0)
}

// ============================================================================
// eTSA reclamation
// ============================================================================

/// `sched/sched_process_exit`: drop the exiting task's eTSA record.
#[tracepoint]
pub fn task_exit(_ctx: TracePointContext) -> u32 {
    let tid = unsafe { bpf_get_current_pid_tgid() } as u32;
    let _ = THREAD_STATES.remove(&tid);
    0
}

// ============================================================================
// Task iterator sampler
// ============================================================================

/// Walks every task once per sample tick. Userspace writes the pass-wide
/// `sample_start` timestamp into CONFIG before triggering the walk.
#[iter(task)]
pub fn sample_task(ctx: IterContext) -> u32 {
    match unsafe { try_sample_task(&ctx) } {
        Ok(()) | Err(_) => 0,
    }
}

unsafe fn try_sample_task(ctx: &IterContext) -> Result<(), i64> {
    let it = ctx.as_ptr() as *const bpf_iter__task;
    let task = (*it).task;
    if task.is_null() {
        // End of the walk.
        return Ok(());
    }

    let tid = bpf_probe_read_kernel(&(*task).pid)? as u32;
    let tgid = bpf_probe_read_kernel(&(*task).tgid)? as u32;

    // Never sample ourselves; honor the single-process restriction.
    if u64::from(tgid) == config(CONFIG_SELF_TGID) {
        return Ok(());
    }
    let target = config(CONFIG_TARGET_TGID);
    if target != 0 && u64::from(tgid) != target {
        return Ok(());
    }

    let state = bpf_probe_read_kernel(&(*task).__state)?;
    let flags = bpf_probe_read_kernel(&(*task).flags)?;

    // Passive syscall context from the task's saved registers; valid even for
    // tasks that blocked before this sampler started.
    let regs = bpf_task_pt_regs(task.cast()) as *const pt_regs;
    let passive = bpf_probe_read_kernel(&(*regs).orig_ax).map_or(SYSCALL_NONE, |v| v as i32);
    let args = read_syscall_args(regs);

    // Resolve the first-argument descriptor while we still may skip the task:
    // the daemon-port heuristic needs the socket's local port.
    let fd_file = if passive != SYSCALL_NONE && syscall_has_fd_arg0(i64::from(passive)) {
        file_for_fd(task, args[0]).ok()
    } else {
        None
    };
    let sock = fd_file.and_then(|f| read_sock_info(f));
    let in_socket_read = sock.is_some() && syscall_is_socket_read(i64::from(passive));
    let local_port = sock.as_ref().map_or(0, |s| s.sport);

    if !task_is_interesting(
        state,
        flags,
        config(CONFIG_SHOW_ALL) != 0,
        in_socket_read,
        local_port,
        config(CONFIG_DAEMON_PORTS) as u16,
    ) {
        return Ok(());
    }

    // Mark in-flight work as sampled so the exit/complete probes emit
    // completion records, and snapshot the eTSA for the sample row.
    let now = bpf_ktime_get_ns();
    let mut active = SYSCALL_NONE;
    let mut sc_enter_time = 0u64;
    let mut sc_sequence_num = 0u64;
    let mut iorq_sequence_num = 0u64;
    let mut aio_inflight_reqs = 0i32;

    if let Some(ts) = THREAD_STATES.get_ptr_mut(&tid) {
        (*ts).sample_start_ktime = config(CONFIG_SAMPLE_START_KTIME);
        (*ts).sample_actual_ktime = now;

        if (*ts).in_syscall_nr != SYSCALL_NONE {
            active = (*ts).in_syscall_nr;
            if config(CONFIG_TRACK_SYSCALL) != 0 {
                (*ts).sc_sampled = 1;
            }
        }

        if (*ts).last_iorq_rq != 0 && config(CONFIG_TRACK_IORQ) != 0 {
            if let Some(info) = IORQ_TRACKING.get_ptr_mut(&(*ts).last_iorq_rq) {
                (*info).sampled = 1;
                (*ts).last_iorq_sampled = (*ts).last_iorq_rq;
            }
        }

        sc_enter_time = (*ts).sc_enter_time;
        sc_sequence_num = (*ts).sc_sequence_num;
        iorq_sequence_num = (*ts).iorq_sequence_num;
        aio_inflight_reqs = (*ts).aio_inflight_reqs;
    }

    let Some(mut entry) = TASK_SAMPLES.reserve::<TaskSample>(0) else {
        warn!(ctx, "task sample dropped: ring buffer full");
        return Ok(());
    };
    let s = entry.as_mut_ptr();
    core::ptr::write_bytes(s.cast::<u8>(), 0, core::mem::size_of::<TaskSample>());

    (*s).event_type = EVENT_TASK_INFO;
    (*s).tid = tid;
    (*s).tgid = tgid;
    (*s).state = state;
    (*s).flags = flags;
    (*s).euid = read_euid(task);
    (*s).sample_start_ktime = config(CONFIG_SAMPLE_START_KTIME);
    (*s).sample_actual_ktime = now;
    if let Ok(comm) = bpf_probe_read_kernel(&(*task).comm) {
        (*s).comm = comm;
    }
    read_exe_basename(task, &mut (*s).exe);
    (*s).syscall_passive = passive;
    (*s).syscall_active = active;
    (*s).sc_enter_time = sc_enter_time;
    (*s).sc_sequence_num = sc_sequence_num;
    (*s).iorq_sequence_num = iorq_sequence_num;
    (*s).aio_inflight_reqs = aio_inflight_reqs;
    (*s).args = args;
    if let Some(f) = fd_file {
        read_dentry_name(f, &mut (*s).filename);
    }
    if let Some(si) = sock {
        (*s).sock = si;
    }

    if config(CONFIG_KSTACKS) != 0 {
        let ret = bpf_get_task_stack(
            task.cast(),
            (*s).kstack.as_mut_ptr().cast::<c_void>(),
            (MAX_STACK_DEPTH * 8) as u32,
            0,
        );
        if ret > 0 {
            (*s).kstack_len = (ret / 8) as u32;
        }
    }
    if config(CONFIG_USTACKS) != 0 {
        let ret = bpf_get_task_stack(
            task.cast(),
            (*s).ustack.as_mut_ptr().cast::<c_void>(),
            (MAX_STACK_DEPTH * 8) as u32,
            BPF_F_USER_STACK,
        );
        if ret > 0 {
            (*s).ustack_len = (ret / 8) as u32;
        }
    }

    entry.submit(0);
    Ok(())
}

unsafe fn read_syscall_args(regs: *const pt_regs) -> [u64; 6] {
    // x86_64 syscall argument registers in ABI order.
    [
        bpf_probe_read_kernel(&(*regs).di).unwrap_or(0),
        bpf_probe_read_kernel(&(*regs).si).unwrap_or(0),
        bpf_probe_read_kernel(&(*regs).dx).unwrap_or(0),
        bpf_probe_read_kernel(&(*regs).r10).unwrap_or(0),
        bpf_probe_read_kernel(&(*regs).r8).unwrap_or(0),
        bpf_probe_read_kernel(&(*regs).r9).unwrap_or(0),
    ]
}

unsafe fn read_euid(task: *const task_struct) -> u32 {
    let cred = match bpf_probe_read_kernel(&(*task).cred) {
        Ok(c) if !c.is_null() => c,
        _ => return 0,
    };
    bpf_probe_read_kernel(&(*cred).euid).unwrap_or(0)
}

/// Walk the task's fd table to the `struct file` for a descriptor.
unsafe fn file_for_fd(task: *const task_struct, fd: u64) -> Result<*mut file, i64> {
    let files = bpf_probe_read_kernel(&(*task).files)?;
    if files.is_null() {
        return Err(1);
    }
    let fdt = bpf_probe_read_kernel(&(*files).fdt)?;
    if fdt.is_null() {
        return Err(1);
    }
    let max_fds = bpf_probe_read_kernel(&(*fdt).max_fds)?;
    if fd >= u64::from(max_fds) {
        return Err(1);
    }
    let fd_array = bpf_probe_read_kernel(&(*fdt).fd)?;
    let f = bpf_probe_read_kernel(fd_array.add(fd as usize))?;
    if f.is_null() {
        Err(1)
    } else {
        Ok(f)
    }
}

unsafe fn read_dentry_name(f: *const file, dest: &mut [u8]) {
    let Ok(dentry) = bpf_probe_read_kernel(&(*f).f_path.dentry) else {
        return;
    };
    if dentry.is_null() {
        return;
    }
    let Ok(name) = bpf_probe_read_kernel(&(*dentry).d_name.name) else {
        return;
    };
    let _ = bpf_probe_read_kernel_str_bytes(name, dest);
}

unsafe fn read_exe_basename(task: *const task_struct, dest: &mut [u8]) {
    let Ok(mm) = bpf_probe_read_kernel(&(*task).mm) else {
        return;
    };
    if mm.is_null() {
        // Kernel threads have no mm; leave the field empty.
        return;
    }
    let Ok(exe) = bpf_probe_read_kernel(&(*mm).exe_file) else {
        return;
    };
    if exe.is_null() {
        return;
    }
    read_dentry_name(exe, dest);
}

/// If the descriptor refers to a socket, capture its endpoints.
unsafe fn read_sock_info(f: *const file) -> Option<SockInfo> {
    let inode = bpf_probe_read_kernel(&(*f).f_inode).ok()?;
    if inode.is_null() {
        return None;
    }
    let mode = bpf_probe_read_kernel(&(*inode).i_mode).ok()?;
    if mode & S_IFMT != S_IFSOCK {
        return None;
    }

    let sock_ptr = bpf_probe_read_kernel(&(*f).private_data).ok()?.cast::<socket>();
    if sock_ptr.is_null() {
        return None;
    }
    let sk = bpf_probe_read_kernel(&(*sock_ptr).sk).ok()?;
    if sk.is_null() {
        return None;
    }

    let common = &(*sk).__sk_common;
    let family = bpf_probe_read_kernel(&common.skc_family).ok()?;
    let mut info = SockInfo {
        family,
        protocol: bpf_probe_read_kernel(&(*sk).sk_protocol).unwrap_or(0),
        sport: bpf_probe_read_kernel(&common.skc_num).unwrap_or(0),
        dport: bpf_probe_read_kernel(&common.skc_dport).unwrap_or(0),
        ..SockInfo::default()
    };

    const AF_INET: u16 = 2;
    const AF_INET6: u16 = 10;
    match family {
        AF_INET => {
            // __be32 fields: keep the in-memory (network) byte order.
            let saddr = bpf_probe_read_kernel(&common.skc_rcv_saddr).unwrap_or(0);
            let daddr = bpf_probe_read_kernel(&common.skc_daddr).unwrap_or(0);
            info.saddr[..4].copy_from_slice(&saddr.to_ne_bytes());
            info.daddr[..4].copy_from_slice(&daddr.to_ne_bytes());
        }
        AF_INET6 => {
            if let Ok(a) = bpf_probe_read_kernel(&common.skc_v6_rcv_saddr) {
                info.saddr = a;
            }
            if let Ok(a) = bpf_probe_read_kernel(&common.skc_v6_daddr) {
                info.daddr = a;
            }
        }
        _ => {}
    }

    Some(info)
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
