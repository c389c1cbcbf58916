//! Interest-filter and AIO arithmetic properties shared with the kernel side.

use xcapture_common::{
    aio_inflight, syscall_is_socket_read, task_is_interesting, PF_KTHREAD, TASK_INTERRUPTIBLE,
    TASK_NOLOAD, TASK_RUNNING, TASK_UNINTERRUPTIBLE,
};

const DEFAULT_DAEMON_PORTS: u16 = 10000;

#[test]
fn test_running_and_disk_wait_are_interesting() {
    assert!(task_is_interesting(TASK_RUNNING, 0, false, false, 0, DEFAULT_DAEMON_PORTS));
    assert!(task_is_interesting(TASK_UNINTERRUPTIBLE, 0, false, false, 0, DEFAULT_DAEMON_PORTS));
}

#[test]
fn test_plain_sleep_is_not_interesting() {
    assert!(!task_is_interesting(TASK_INTERRUPTIBLE, 0, false, false, 0, DEFAULT_DAEMON_PORTS));
}

#[test]
fn test_daemon_port_threshold() {
    // Thread blocked in a socket read on local port 80: an idle server with
    // the default threshold, a waiting client when the threshold is lowered.
    assert!(!task_is_interesting(TASK_INTERRUPTIBLE, 0, false, true, 80, DEFAULT_DAEMON_PORTS));
    assert!(task_is_interesting(TASK_INTERRUPTIBLE, 0, false, true, 80, 79));
    // The threshold itself is exclusive.
    assert!(!task_is_interesting(TASK_INTERRUPTIBLE, 0, false, true, 80, 80));
    // A high ephemeral port passes the default threshold.
    assert!(task_is_interesting(
        TASK_INTERRUPTIBLE,
        0,
        false,
        true,
        43210,
        DEFAULT_DAEMON_PORTS
    ));
}

#[test]
fn test_accept_classifies_through_the_syscall_table() {
    // A thread bound to local TCP port 80, blocked in accept, INTERRUPTIBLE.
    // Classification starts from the syscall number, not a pre-set flag:
    // accept must be in the read-family set for the threshold to apply.
    #[cfg(not(target_arch = "aarch64"))]
    const ACCEPT: i64 = 43;
    #[cfg(target_arch = "aarch64")]
    const ACCEPT: i64 = 202;

    let in_socket_read = syscall_is_socket_read(ACCEPT);
    assert!(in_socket_read);

    // Default threshold: an idle daemon, suppressed.
    assert!(!task_is_interesting(
        TASK_INTERRUPTIBLE,
        0,
        false,
        in_socket_read,
        80,
        DEFAULT_DAEMON_PORTS
    ));
    // Lowered threshold: the same wait is a client waiting for a reply.
    assert!(task_is_interesting(TASK_INTERRUPTIBLE, 0, false, in_socket_read, 80, 79));
}

#[test]
fn test_noload_states_never_interesting() {
    assert!(!task_is_interesting(TASK_NOLOAD, 0, false, false, 0, DEFAULT_DAEMON_PORTS));
    // 0x402 is the idle-injection state (NOLOAD | UNINTERRUPTIBLE).
    assert!(!task_is_interesting(0x402, 0, false, false, 0, DEFAULT_DAEMON_PORTS));
}

#[test]
fn test_idle_kernel_threads_excluded() {
    assert!(!task_is_interesting(
        TASK_INTERRUPTIBLE,
        PF_KTHREAD,
        false,
        false,
        0,
        DEFAULT_DAEMON_PORTS
    ));
    // A kernel thread in uninterruptible wait still shows up.
    assert!(task_is_interesting(
        TASK_UNINTERRUPTIBLE,
        PF_KTHREAD,
        false,
        false,
        0,
        DEFAULT_DAEMON_PORTS
    ));
}

#[test]
fn test_show_all_disables_the_filter() {
    assert!(task_is_interesting(TASK_INTERRUPTIBLE, PF_KTHREAD, true, false, 0, 10000));
    assert!(task_is_interesting(0x402, 0, true, false, 0, 10000));
}

#[test]
fn test_aio_inflight_wraparound() {
    assert_eq!(aio_inflight(100, 105), 5);
    assert_eq!(aio_inflight(0xFFFF_FFFE, 3), 5);
    assert_eq!(aio_inflight(5, 5), 0);
}
