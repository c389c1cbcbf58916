//! Sample row rendering
//!
//! Turns a `TaskSample` into one CSV row for a configurable column set.

use std::net::{Ipv4Addr, Ipv6Addr};

use xcapture_common::{SockInfo, TaskSample, PF_KTHREAD, SYSCALL_NONE};

use crate::decode::{syscall_name, task_state_name};
use crate::domain::{CaptureError, StackHash};
use crate::timebase::TimeBase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Timestamp,
    Tid,
    Tgid,
    State,
    User,
    Exe,
    Comm,
    SyscallPassive,
    SyscallActive,
    ScEntryTime,
    ScUsSoFar,
    ScSeqNum,
    IorqSeqNum,
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Arg4,
    Arg5,
    Filename,
    Connection,
    ExtraInfo,
    AioInflight,
    KstackHash,
    UstackHash,
}

impl Column {
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Timestamp => "TIMESTAMP",
            Self::Tid => "TID",
            Self::Tgid => "TGID",
            Self::State => "STATE",
            Self::User => "USER",
            Self::Exe => "EXE",
            Self::Comm => "COMM",
            Self::SyscallPassive => "SYSCALL_PASSIVE",
            Self::SyscallActive => "SYSCALL_ACTIVE",
            Self::ScEntryTime => "SC_ENTRY_TIME",
            Self::ScUsSoFar => "SC_US_SO_FAR",
            Self::ScSeqNum => "SC_SEQ_NUM",
            Self::IorqSeqNum => "IORQ_SEQ_NUM",
            Self::Arg0 => "ARG0",
            Self::Arg1 => "ARG1",
            Self::Arg2 => "ARG2",
            Self::Arg3 => "ARG3",
            Self::Arg4 => "ARG4",
            Self::Arg5 => "ARG5",
            Self::Filename => "FILENAME",
            Self::Connection => "CONNECTION",
            Self::ExtraInfo => "EXTRA_INFO",
            Self::AioInflight => "AIO_INFLIGHT",
            Self::KstackHash => "KSTACK_HASH",
            Self::UstackHash => "USTACK_HASH",
        }
    }

    fn all() -> &'static [Column] {
        &[
            Self::Timestamp,
            Self::Tid,
            Self::Tgid,
            Self::State,
            Self::User,
            Self::Exe,
            Self::Comm,
            Self::SyscallPassive,
            Self::SyscallActive,
            Self::ScEntryTime,
            Self::ScUsSoFar,
            Self::ScSeqNum,
            Self::IorqSeqNum,
            Self::Arg0,
            Self::Arg1,
            Self::Arg2,
            Self::Arg3,
            Self::Arg4,
            Self::Arg5,
            Self::Filename,
            Self::Connection,
            Self::ExtraInfo,
            Self::AioInflight,
            Self::KstackHash,
            Self::UstackHash,
        ]
    }
}

/// The full sample schema; stack hash columns only when capture is on.
#[must_use]
pub fn wide_columns(kstacks: bool, ustacks: bool) -> Vec<Column> {
    Column::all()
        .iter()
        .copied()
        .filter(|c| match c {
            Column::KstackHash => kstacks,
            Column::UstackHash => ustacks,
            _ => true,
        })
        .collect()
}

/// Compact set for interactive stdout use.
#[must_use]
pub fn narrow_columns() -> Vec<Column> {
    vec![
        Column::Timestamp,
        Column::Tid,
        Column::Tgid,
        Column::State,
        Column::Comm,
        Column::SyscallActive,
        Column::ScUsSoFar,
        Column::Filename,
    ]
}

/// Parse a `-g` comma-separated column list against the header names.
pub fn parse_columns(spec: &str) -> Result<Vec<Column>, CaptureError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            Column::all()
                .iter()
                .copied()
                .find(|c| c.header().eq_ignore_ascii_case(name))
                .ok_or_else(|| CaptureError::UnknownColumn(name.to_string()))
        })
        .collect()
}

#[must_use]
pub fn header_row(columns: &[Column]) -> String {
    columns.iter().map(|c| c.header()).collect::<Vec<_>>().join(",")
}

/// NUL-terminated kernel string to a CSV-safe field.
fn cstr_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).replace(',', " ")
}

fn format_connection(sock: &SockInfo) -> String {
    if sock.family == 0 {
        return String::new();
    }
    let proto = match sock.protocol {
        6 => "TCP".to_string(),
        17 => "UDP".to_string(),
        p => format!("proto{p}"),
    };
    let dport = u16::from_be(sock.dport);
    match sock.family {
        // AF_INET
        2 => {
            let saddr = Ipv4Addr::new(sock.saddr[0], sock.saddr[1], sock.saddr[2], sock.saddr[3]);
            let daddr = Ipv4Addr::new(sock.daddr[0], sock.daddr[1], sock.daddr[2], sock.daddr[3]);
            format!("{proto} {saddr}:{}->{daddr}:{dport}", sock.sport)
        }
        // AF_INET6
        10 => {
            let saddr = Ipv6Addr::from(sock.saddr);
            let daddr = Ipv6Addr::from(sock.daddr);
            format!("{proto} [{saddr}]:{}->[{daddr}]:{dport}", sock.sport)
        }
        f => format!("{proto} family{f}"),
    }
}

/// Render one sample as a CSV row in the given column order.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn render_sample_row(
    sample: &TaskSample,
    columns: &[Column],
    timebase: &TimeBase,
    kstack_hash: Option<StackHash>,
    ustack_hash: Option<StackHash>,
) -> String {
    let kthread = sample.flags & PF_KTHREAD != 0;
    let syscall_field = |nr: i32| -> String {
        // Kernel threads carry stale register context; suppress the name.
        if kthread || nr == SYSCALL_NONE {
            "-".to_string()
        } else {
            syscall_name(i64::from(nr)).into_owned()
        }
    };

    let fields: Vec<String> = columns
        .iter()
        .map(|col| match col {
            Column::Timestamp => {
                TimeBase::format_timestamp(&timebase.wall_from_mono(sample.sample_actual_ktime))
            }
            Column::Tid => sample.tid.to_string(),
            Column::Tgid => sample.tgid.to_string(),
            Column::State => task_state_name(sample.state).to_string(),
            Column::User => sample.euid.to_string(),
            Column::Exe => cstr_field(&sample.exe),
            Column::Comm => cstr_field(&sample.comm),
            Column::SyscallPassive => syscall_field(sample.syscall_passive),
            Column::SyscallActive => {
                // Only syscalls whose entry we observed count as active.
                if sample.sc_sequence_num == 0 {
                    "-".to_string()
                } else {
                    syscall_field(sample.syscall_active)
                }
            }
            Column::ScEntryTime => {
                if sample.sc_enter_time == 0 {
                    String::new()
                } else {
                    TimeBase::format_timestamp(&timebase.wall_from_mono(sample.sc_enter_time))
                }
            }
            Column::ScUsSoFar => {
                if sample.sc_enter_time == 0 {
                    String::new()
                } else {
                    // Signed: cross-CPU timestamp skew may produce small
                    // negative values, rendered verbatim.
                    let us =
                        (sample.sample_actual_ktime as i64 - sample.sc_enter_time as i64) / 1000;
                    us.to_string()
                }
            }
            Column::ScSeqNum => sample.sc_sequence_num.to_string(),
            Column::IorqSeqNum => sample.iorq_sequence_num.to_string(),
            Column::Arg0 => format!("0x{:x}", sample.args[0]),
            Column::Arg1 => format!("0x{:x}", sample.args[1]),
            Column::Arg2 => format!("0x{:x}", sample.args[2]),
            Column::Arg3 => format!("0x{:x}", sample.args[3]),
            Column::Arg4 => format!("0x{:x}", sample.args[4]),
            Column::Arg5 => format!("0x{:x}", sample.args[5]),
            Column::Filename => cstr_field(&sample.filename),
            Column::Connection => format_connection(&sample.sock),
            Column::ExtraInfo => {
                if kthread {
                    "kthread".to_string()
                } else {
                    String::new()
                }
            }
            Column::AioInflight => sample.aio_inflight_reqs.to_string(),
            Column::KstackHash => kstack_hash.map_or_else(String::new, |h| h.to_string()),
            Column::UstackHash => ustack_hash.map_or_else(String::new, |h| h.to_string()),
        })
        .collect();

    fields.join(",")
}
