#![no_std]

// Shared data structures between eBPF and userspace

/// Record discriminants. Every record sent through a ring buffer leads with
/// one of these so the streams can be multiplexed if desired.
pub const EVENT_TASK_INFO: u32 = 1;
pub const EVENT_SC_COMPLETION: u32 = 2;
pub const EVENT_IORQ_COMPLETION: u32 = 3;

/// Sentinel for "task is in user mode, no syscall in flight".
pub const SYSCALL_NONE: i32 = -1;

/// Sentinel for "AIO ring could not be read from user memory".
pub const AIO_INFLIGHT_UNKNOWN: i32 = -1;

pub const TASK_COMM_LEN: usize = 16;
pub const EXE_NAME_LEN: usize = 16;
pub const FILENAME_LEN: usize = 64;

/// Stack frames captured per sample; also the truncation depth fed into the
/// userspace stack hash.
pub const MAX_STACK_DEPTH: usize = 20;

// Task state bits (low 12 bits of task_struct __state)
pub const TASK_RUNNING: u32 = 0;
pub const TASK_INTERRUPTIBLE: u32 = 0x1;
pub const TASK_UNINTERRUPTIBLE: u32 = 0x2;
pub const TASK_WAKING: u32 = 0x200;
pub const TASK_NOLOAD: u32 = 0x400;
pub const TASK_NEW: u32 = 0x800;
pub const TASK_STATE_MASK: u32 = 0xfff;

/// task_struct flags bit marking kernel threads.
pub const PF_KTHREAD: u32 = 0x0020_0000;

// CONFIG map keys (userspace writes, probes read)
pub const CONFIG_SHOW_ALL: u32 = 0;
pub const CONFIG_TARGET_TGID: u32 = 1;
pub const CONFIG_DAEMON_PORTS: u32 = 2;
pub const CONFIG_KSTACKS: u32 = 3;
pub const CONFIG_USTACKS: u32 = 4;
pub const CONFIG_SELF_TGID: u32 = 5;
pub const CONFIG_SAMPLE_START_KTIME: u32 = 6;
pub const CONFIG_TRACK_SYSCALL: u32 = 7;
pub const CONFIG_TRACK_IORQ: u32 = 8;

/// Extended thread-state record, one per live task, keyed by tid.
///
/// Mutated in place by the owning task's probes; the task iterator writes
/// only `sc_sampled` and `last_iorq_sampled` (benign race, see the sampler).
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct ThreadState {
    pub tid: u32,
    pub tgid: u32,
    pub sample_start_ktime: u64,
    pub sample_actual_ktime: u64,
    pub in_syscall_nr: i32,
    pub sc_sampled: u8,
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: [u8; 3],
    pub sc_enter_time: u64,
    pub sc_sequence_num: u64,
    pub iorq_sequence_num: u64,
    pub last_iorq_rq: u64,
    pub last_iorq_sampled: u64,
    pub aio_inflight_reqs: i32,
    #[allow(clippy::pub_underscore_fields)]
    pub _pad2: [u8; 4],
}

/// In-flight block I/O tracking record, keyed by the request pointer.
///
/// Insert and issue identities may differ: a request can be queued by one
/// task and dispatched by another, or skip the queue entirely.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct IorqInfo {
    pub iorq_sequence_num: u64,
    pub insert_tid: u32,
    pub insert_tgid: u32,
    pub issue_tid: u32,
    pub issue_tgid: u32,
    pub insert_time: u64,
    pub issue_time: u64,
    pub sampled: u8,
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: [u8; 7],
}

/// Socket endpoints for the sampled task's first-argument descriptor.
/// `family == 0` means the descriptor is not a socket.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct SockInfo {
    pub family: u16,
    pub protocol: u16,
    pub sport: u16,
    pub dport: u16,
    pub saddr: [u8; 16],
    pub daddr: [u8; 16],
}

/// Full snapshot of one task at a sampling instant.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TaskSample {
    pub event_type: u32, // EVENT_TASK_INFO
    pub tid: u32,
    pub tgid: u32,
    pub state: u32, // task __state, low bits
    pub flags: u32, // task flags (PF_*)
    pub euid: u32,
    pub sample_start_ktime: u64,  // start of this iterator pass
    pub sample_actual_ktime: u64, // when this task was visited
    pub comm: [u8; TASK_COMM_LEN],
    pub exe: [u8; EXE_NAME_LEN],
    pub syscall_passive: i32, // from the task's saved registers
    pub syscall_active: i32,  // from the eTSA, SYSCALL_NONE if not observed
    pub sc_enter_time: u64,
    pub sc_sequence_num: u64,
    pub iorq_sequence_num: u64,
    pub aio_inflight_reqs: i32,
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: u32,
    pub args: [u64; 6],
    pub filename: [u8; FILENAME_LEN],
    pub sock: SockInfo,
    pub kstack_len: u32,
    pub ustack_len: u32,
    pub kstack: [u64; MAX_STACK_DEPTH],
    pub ustack: [u64; MAX_STACK_DEPTH],
}

/// Emitted on syscall exit for syscalls the iterator observed in flight.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SyscallCompletion {
    pub event_type: u32, // EVENT_SC_COMPLETION
    pub tid: u32,
    pub tgid: u32,
    pub syscall_nr: i32,
    pub sc_sequence_num: u64,
    pub sc_enter_time: u64,
    pub sc_exit_time: u64,
    pub ret: i64,
}

/// Emitted on the final byte of a block request the iterator observed.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IorqCompletion {
    pub event_type: u32, // EVENT_IORQ_COMPLETION
    pub insert_tid: u32,
    pub insert_tgid: u32,
    pub issue_tid: u32,
    pub issue_tgid: u32,
    #[allow(clippy::pub_underscore_fields)]
    pub _pad: u32,
    pub iorq_sequence_num: u64,
    pub insert_time: u64,
    pub issue_time: u64,
    pub complete_time: u64,
    pub dev: u32,
    pub bytes: u32,
    pub sector: u64,
    pub cmd_flags: u32,
    pub error: i32,
}

/// Tracepoint arguments for `raw_syscalls/sys_enter`
/// Layout from `/sys/kernel/debug/tracing/events/raw_syscalls/sys_enter/format`
#[repr(C)]
pub struct SysEnterArgs {
    #[allow(clippy::pub_underscore_fields)]
    pub __unused__: u64,
    pub id: i64,
    pub args: [u64; 6],
}

/// Tracepoint arguments for `raw_syscalls/sys_exit`
#[repr(C)]
pub struct SysExitArgs {
    #[allow(clippy::pub_underscore_fields)]
    pub __unused__: u64,
    pub id: i64,
    pub ret: i64,
}

/// In-flight AIO requests from the ring's head/tail, with 32-bit wrap-around.
#[must_use]
pub const fn aio_inflight(head: u32, tail: u32) -> u32 {
    tail.wrapping_sub(head)
}

/// Encoded device number: `(major << 20) | (minor & 0xFFFFF)`.
#[must_use]
pub const fn dev_major(dev: u32) -> u32 {
    dev >> 20
}

#[must_use]
pub const fn dev_minor(dev: u32) -> u32 {
    dev & 0xf_ffff
}

#[must_use]
pub const fn encode_dev(major: u32, minor: u32) -> u32 {
    (major << 20) | (minor & 0xf_ffff)
}

/// Interest filter applied by the task iterator to every task it visits.
///
/// A task is emitted when it is running or in uninterruptible wait, or when
/// it is interruptible but blocked in a read-family syscall on a socket whose
/// local port is above the daemon-port threshold (a client waiting for a
/// reply rather than a server idle on a well-known port).
///
/// Kernel threads idle in interruptible wait and tasks in NOLOAD states are
/// never emitted. The sampler's own process is excluded by the caller.
#[must_use]
pub fn task_is_interesting(
    state: u32,
    flags: u32,
    show_all: bool,
    in_socket_read: bool,
    local_port: u16,
    daemon_ports: u16,
) -> bool {
    if show_all {
        return true;
    }
    let state = state & TASK_STATE_MASK;
    if state & TASK_NOLOAD != 0 {
        return false;
    }
    if flags & PF_KTHREAD != 0 && state & TASK_INTERRUPTIBLE != 0 {
        return false;
    }
    if state == TASK_RUNNING || state & TASK_UNINTERRUPTIBLE != 0 {
        return true;
    }
    if state & TASK_INTERRUPTIBLE != 0 && in_socket_read && local_port > daemon_ports {
        return true;
    }
    false
}

/// Whether the syscall takes a file descriptor as its first argument, so the
/// sampler can resolve the descriptor to a filename.
#[cfg(not(target_arch = "aarch64"))]
#[must_use]
pub fn syscall_has_fd_arg0(nr: i64) -> bool {
    matches!(
        nr,
        0 | 1          // read, write
        | 3            // close
        | 5            // fstat
        | 8            // lseek
        | 16..=20      // ioctl, pread64, pwrite64, readv, writev
        | 32 | 33      // dup, dup2
        | 40           // sendfile
        | 43..=52      // accept, sendto, recvfrom, sendmsg, recvmsg, shutdown, bind, listen, getsockname, getpeername
        | 54 | 55      // setsockopt, getsockopt
        | 72..=75      // fcntl, flock, fsync, fdatasync
        | 77           // ftruncate
        | 78           // getdents
        | 81           // fchdir
        | 91 | 93      // fchmod, fchown
        | 138          // fstatfs
        | 187          // readahead
        | 190 | 193 | 196 | 199 // fsetxattr, fgetxattr, flistxattr, fremovexattr
        | 217          // getdents64
        | 221          // fadvise64
        | 232 | 233    // epoll_wait, epoll_ctl
        | 275..=278    // splice, tee, sync_file_range, vmsplice
        | 285          // fallocate
        | 288          // accept4
        | 295 | 296    // preadv, pwritev
        | 299          // recvmmsg
        | 307          // sendmmsg
        | 326..=328    // copy_file_range, preadv2, pwritev2
        | 426          // io_uring_enter
    )
}

#[cfg(target_arch = "aarch64")]
#[must_use]
pub fn syscall_has_fd_arg0(nr: i64) -> bool {
    matches!(
        nr,
        7 | 10 | 13 | 16 // fsetxattr, fgetxattr, flistxattr, fremovexattr
        | 21 | 22      // epoll_ctl, epoll_pwait
        | 23 | 25      // dup, fcntl
        | 29           // ioctl
        | 32           // flock
        | 44           // fstatfs
        | 46 | 47      // ftruncate, fallocate
        | 50 | 52      // fchdir, fchmod
        | 55           // fchown
        | 57           // close
        | 61           // getdents64
        | 62..=71      // lseek, read, write, readv, writev, pread64, pwrite64, preadv, pwritev, sendfile
        | 75..=77      // vmsplice, splice, tee
        | 80           // fstat
        | 82..=84      // fsync, fdatasync, sync_file_range
        | 202          // accept
        | 204..=212    // getsockname .. recvmsg
        | 213          // readahead
        | 223          // fadvise64
        | 242 | 243    // accept4, recvmmsg
        | 269          // sendmmsg
        | 285..=287    // copy_file_range, preadv2, pwritev2
        | 426          // io_uring_enter
    )
}

/// Read-family syscalls considered by the daemon-port interest heuristic.
/// `accept`/`accept4` belong here: a server idle in accept on a well-known
/// port is exactly what the threshold is meant to suppress.
#[cfg(not(target_arch = "aarch64"))]
#[must_use]
pub fn syscall_is_socket_read(nr: i64) -> bool {
    matches!(nr, 0 | 17 | 19 | 43 | 45 | 47 | 288 | 295 | 299 | 327)
}

#[cfg(target_arch = "aarch64")]
#[must_use]
pub fn syscall_is_socket_read(nr: i64) -> bool {
    matches!(nr, 63 | 65 | 67 | 69 | 202 | 207 | 212 | 242 | 243 | 286)
}

/// AIO-wait syscalls whose entry reads the AIO ring from user memory.
#[cfg(not(target_arch = "aarch64"))]
#[must_use]
pub fn syscall_is_aio_wait(nr: i64) -> bool {
    matches!(nr, 208 | 333) // io_getevents, io_pgetevents
}

#[cfg(target_arch = "aarch64")]
#[must_use]
pub fn syscall_is_aio_wait(nr: i64) -> bool {
    matches!(nr, 4 | 292) // io_getevents, io_pgetevents
}

#[cfg(feature = "user")]
use aya::Pod;

// These unsafe impls are required for eBPF <-> userspace communication
// Pod trait ensures types can be safely transmitted as plain bytes
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ThreadState {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for IorqInfo {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for SockInfo {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for TaskSample {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for SyscallCompletion {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for IorqCompletion {}
