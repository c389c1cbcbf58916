//! End-to-end pipeline scenarios: synthetic ring-buffer records in, CSV
//! files out.

use chrono::{Local, TimeZone};
use std::fs;
use std::path::Path;

use xcapture::capture::EventPipeline;
use xcapture::output::{header_row, wide_columns, Column, CsvSink, OutputKind};
use xcapture::timebase::TimeBase;
use xcapture_common::{
    encode_dev, IorqCompletion, SyscallCompletion, TaskSample, EVENT_IORQ_COMPLETION,
    EVENT_SC_COMPLETION, EVENT_TASK_INFO,
};

const SYSCEND_HEADER: &str =
    "TYPE,TID,TGID,SYSCALL_NR,SC_SEQ_NUM,SC_ENTER_TIME,SC_EXIT_TIME,DURATION_US";
const IORQEND_HEADER: &str = "TYPE,INSERT_TID,INSERT_TGID,ISSUE_TID,ISSUE_TGID,IORQ_SEQ_NUM,\
                              INSERT_NS,ISSUE_NS,COMPLETE_NS,DEV,SECTOR,BYTES,FLAGS,ERROR";
const STACKS_HEADER: &str = "TIMESTAMP,TID,TGID,STACK_HASH,STACK_ADDRS";

#[allow(unsafe_code)]
fn as_bytes<T>(v: &T) -> &[u8] {
    // SAFETY: the wire records are plain #[repr(C)] data
    unsafe {
        std::slice::from_raw_parts(std::ptr::from_ref(v).cast::<u8>(), std::mem::size_of::<T>())
    }
}

#[allow(unsafe_code)]
fn sample(tid: u32, seq: u64, actual_ktime: u64, enter_time: u64) -> TaskSample {
    // SAFETY: TaskSample is plain #[repr(C)] data, all-zeroes is valid
    let mut s: TaskSample = unsafe { std::mem::zeroed() };
    s.event_type = EVENT_TASK_INFO;
    s.tid = tid;
    s.tgid = tid;
    s.state = 1;
    s.sample_start_ktime = actual_ktime;
    s.sample_actual_ktime = actual_ktime;
    s.comm[..4].copy_from_slice(b"work");
    s.syscall_passive = 0;
    s.syscall_active = 0;
    s.sc_enter_time = enter_time;
    s.sc_sequence_num = seq;
    s
}

fn pipeline_into(
    dir: &Path,
    columns: Vec<Column>,
    extra_kinds: Vec<(OutputKind, String)>,
    timebase: TimeBase,
) -> EventPipeline {
    let mut headers = vec![(OutputKind::Samples, header_row(&columns))];
    headers.extend(extra_kinds);
    let sink = CsvSink::new(Some(dir.to_path_buf()), headers);
    EventPipeline::new(timebase, sink, columns)
}

fn column_index(header: &str, name: &str) -> usize {
    header.split(',').position(|c| c == name).unwrap()
}

/// S1: a blocked read is sampled twice and completes once; the completion
/// joins both samples on (TID, SC_SEQ_NUM) and carries the exact duration.
#[test]
fn test_single_thread_read_correlation() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Local.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let timebase = TimeBase::with_bases(wall, 0);
    let columns = wide_columns(false, false);
    let mut pipeline = pipeline_into(
        dir.path(),
        columns,
        vec![(OutputKind::Syscend, SYSCEND_HEADER.to_string())],
        timebase,
    );

    // read(fd=7) entered at t0=0.5s, sampled at 1.0s and 2.0s, completed at
    // 2.2s returning 4096.
    pipeline.handle_record(as_bytes(&sample(4242, 7, 1_000_000_000, 500_000_000))).unwrap();
    pipeline.handle_record(as_bytes(&sample(4242, 7, 2_000_000_000, 500_000_000))).unwrap();
    let completion = SyscallCompletion {
        event_type: EVENT_SC_COMPLETION,
        tid: 4242,
        tgid: 4242,
        syscall_nr: 0,
        sc_sequence_num: 7,
        sc_enter_time: 500_000_000,
        sc_exit_time: 2_200_000_000,
        ret: 4096,
    };
    pipeline.handle_record(as_bytes(&completion)).unwrap();
    pipeline.flush().unwrap();

    let samples =
        fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.10.csv")).unwrap();
    let mut lines = samples.lines();
    let header = lines.next().unwrap().to_string();
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 2);

    let seq_col = column_index(&header, "SC_SEQ_NUM");
    let active_col = column_index(&header, "SYSCALL_ACTIVE");
    let us_col = column_index(&header, "SC_US_SO_FAR");
    let mut so_far = Vec::new();
    for row in &rows {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[seq_col], "7");
        #[cfg(target_arch = "x86_64")]
        assert_eq!(fields[active_col], "read");
        so_far.push(fields[us_col].parse::<i64>().unwrap());
    }
    // Time in the syscall grows between samples.
    assert!(so_far[1] > so_far[0]);

    let syscend =
        fs::read_to_string(dir.path().join("xcapture_syscend_2026-08-01.10.csv")).unwrap();
    let completions: Vec<&str> = syscend.lines().skip(1).collect();
    assert_eq!(completions.len(), 1);
    let fields: Vec<&str> = completions[0].split(',').collect();
    assert_eq!(fields[0], "sc_completion");
    assert_eq!(fields[1], "4242");
    assert_eq!(fields[4], "7");
    assert_eq!(fields[7], "1700000"); // DURATION_US = (2.2s - 0.5s) / 1000

    // Join on (TID, SC_SEQ_NUM): exactly one completion matches the samples'
    // key, and every completion key appears in the preceding sample stream.
    let key = (fields[1].to_string(), fields[4].to_string());
    let tid_col = column_index(&header, "TID");
    let matching_samples: Vec<_> = rows
        .iter()
        .filter(|r| {
            let f: Vec<&str> = r.split(',').collect();
            (f[tid_col].to_string(), f[seq_col].to_string()) == key
        })
        .collect();
    assert!(!matching_samples.is_empty());
}

/// S4: the first record past the top of the hour opens the next hour's file
/// with a fresh header.
#[test]
fn test_hour_rollover() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Local.with_ymd_and_hms(2026, 8, 1, 2, 0, 0).unwrap();
    let timebase = TimeBase::with_bases(wall, 0);
    let columns = wide_columns(false, false);
    let mut pipeline = pipeline_into(dir.path(), columns, vec![], timebase);

    // 02:59:59.900 and 03:00:00.900
    pipeline.handle_record(as_bytes(&sample(1, 1, 3_599_900_000_000, 0))).unwrap();
    pipeline.handle_record(as_bytes(&sample(1, 2, 3_600_900_000_000, 0))).unwrap();
    pipeline.flush().unwrap();

    let two = fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.02.csv")).unwrap();
    let three = fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.03.csv")).unwrap();

    // Each file: one header line, one row, and every row's timestamp hour
    // matches the file's hour.
    assert_eq!(two.lines().count(), 2);
    assert_eq!(three.lines().count(), 2);
    assert!(two.lines().nth(1).unwrap().starts_with("2026-08-01 02:"));
    assert!(three.lines().nth(1).unwrap().starts_with("2026-08-01 03:"));
    assert!(three.lines().next().unwrap().starts_with("TIMESTAMP,"));
}

/// S5: the same kernel stack across many samples yields one stacks-file row
/// and many sample rows referencing its hash.
#[test]
fn test_stack_deduplication() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Local.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let timebase = TimeBase::with_bases(wall, 0);
    let columns = wide_columns(true, false);
    let mut pipeline = pipeline_into(
        dir.path(),
        columns,
        vec![(OutputKind::Kstacks, STACKS_HEADER.to_string())],
        timebase,
    );

    for i in 0..500u64 {
        let mut s = sample(900, i + 1, 1_000_000_000 + i * 1_000_000, 0);
        s.kstack_len = 3;
        s.kstack[..3].copy_from_slice(&[0xffff_8000_0000_1000, 0xffff_8000_0000_2000, 0xffff_8000_0000_3000]);
        pipeline.handle_record(as_bytes(&s)).unwrap();
    }
    pipeline.flush().unwrap();

    let kstacks =
        fs::read_to_string(dir.path().join("xcapture_kstacks_2026-08-01.10.csv")).unwrap();
    assert_eq!(kstacks.lines().count(), 2); // header + one distinct stack

    let samples =
        fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.10.csv")).unwrap();
    let mut lines = samples.lines();
    let header = lines.next().unwrap().to_string();
    let hash_col = column_index(&header, "KSTACK_HASH");
    let hash_in_stacks_file = kstacks.lines().nth(1).unwrap().split(',').nth(3).unwrap().to_string();
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 500);
    for row in rows {
        assert_eq!(row.split(',').nth(hash_col).unwrap(), hash_in_stacks_file);
    }
}

/// S3: a sampled write produces one I/O completion row carrying all three
/// timestamps and both identities (insert and issue may be different tasks).
#[test]
fn test_iorq_completion_row() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Local.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let timebase = TimeBase::with_bases(wall, 0);
    let columns = wide_columns(false, false);
    let mut pipeline = pipeline_into(
        dir.path(),
        columns,
        vec![(OutputKind::Iorqend, IORQEND_HEADER.to_string())],
        timebase,
    );

    let c = IorqCompletion {
        event_type: EVENT_IORQ_COMPLETION,
        insert_tid: 99,
        insert_tgid: 99,
        issue_tid: 150,
        issue_tgid: 150,
        _pad: 0,
        iorq_sequence_num: 3,
        insert_time: 10_000_000,
        issue_time: 12_000_000,
        complete_time: 15_000_000,
        dev: encode_dev(259, 0),
        bytes: 4096,
        sector: 2048,
        cmd_flags: 1 | (1 << 11), // Write|Sync
        error: 0,
    };
    pipeline.handle_record(as_bytes(&c)).unwrap();
    pipeline.flush().unwrap();

    let iorqend =
        fs::read_to_string(dir.path().join("xcapture_iorqend_2026-08-01.10.csv")).unwrap();
    let rows: Vec<&str> = iorqend.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0],
        "iorq_completion,99,99,150,150,3,10000000,12000000,15000000,259:0,2048,4096,Write|Sync,0"
    );
}

/// A task that entered its syscall before the sampler started carries
/// sequence number zero and never produces a matching completion.
#[test]
fn test_pre_start_syscall_has_no_active_context() {
    let dir = tempfile::tempdir().unwrap();
    let wall = Local.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let timebase = TimeBase::with_bases(wall, 0);
    let columns = wide_columns(false, false);
    let mut pipeline = pipeline_into(dir.path(), columns, vec![], timebase);

    let mut s = sample(77, 0, 1_000_000_000, 900_000_000);
    s.syscall_active = -1;
    pipeline.handle_record(as_bytes(&s)).unwrap();
    pipeline.flush().unwrap();

    let samples =
        fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.10.csv")).unwrap();
    let mut lines = samples.lines();
    let header = lines.next().unwrap().to_string();
    let row = lines.next().unwrap();
    let fields: Vec<&str> = row.split(',').collect();
    assert_eq!(fields[column_index(&header, "SC_SEQ_NUM")], "0");
    assert_eq!(fields[column_index(&header, "SYSCALL_ACTIVE")], "-");
    // The passive view still knows what it is blocked in.
    #[cfg(target_arch = "x86_64")]
    assert_eq!(fields[column_index(&header, "SYSCALL_PASSIVE")], "read");
}
