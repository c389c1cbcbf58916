//! Ring-buffer record consumption
//!
//! Parses POD records out of raw ring-buffer bytes, routes them by their
//! leading discriminant, and renders CSV rows into the sink. Sample records
//! also feed the stack files: each distinct stack hash gets one row per
//! hour, and the sample row references the hash.

use log::warn;
use xcapture_common::{
    IorqCompletion, SyscallCompletion, TaskSample, EVENT_IORQ_COMPLETION, EVENT_SC_COMPLETION,
    EVENT_TASK_INFO, MAX_STACK_DEPTH,
};

use crate::decode::{dev_str, iorq_flags_str};
use crate::domain::{CaptureError, StackHash};
use crate::output::{format_stack_addrs, render_sample_row, stack_hash, Column, CsvSink, OutputKind};
use crate::timebase::TimeBase;

pub struct EventPipeline {
    timebase: TimeBase,
    sink: CsvSink,
    columns: Vec<Column>,

    // Counters reported at shutdown
    pub samples: u64,
    pub sc_completions: u64,
    pub iorq_completions: u64,
}

/// Read one POD record from ring-buffer bytes.
#[must_use]
#[allow(unsafe_code)]
pub fn parse_record<T: Copy>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < std::mem::size_of::<T>() {
        return None;
    }
    // SAFETY: length checked above; the eBPF side only submits whole records
    Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
}

impl EventPipeline {
    #[must_use]
    pub fn new(timebase: TimeBase, sink: CsvSink, columns: Vec<Column>) -> Self {
        Self { timebase, sink, columns, samples: 0, sc_completions: 0, iorq_completions: 0 }
    }

    /// Write failures are fatal for the affected output kind.
    fn sink_write(
        &mut self,
        kind: OutputKind,
        hour: &str,
        row: &str,
    ) -> Result<(), CaptureError> {
        self.sink.write_row(kind, hour, row).map_err(|e| CaptureError::OutputWriteFailed {
            kind: kind.tag().to_string(),
            error: e.to_string(),
        })
    }

    /// Dispatch a raw ring-buffer record on its leading discriminant.
    pub fn handle_record(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let Some(event_type) = parse_record::<u32>(bytes) else {
            warn!("Received truncated record ({} bytes)", bytes.len());
            return Ok(());
        };
        match event_type {
            EVENT_TASK_INFO => match parse_record::<TaskSample>(bytes) {
                Some(sample) => self.handle_sample(&sample),
                None => {
                    warn!("Received incomplete task sample");
                    Ok(())
                }
            },
            EVENT_SC_COMPLETION => match parse_record::<SyscallCompletion>(bytes) {
                Some(c) => self.handle_sc_completion(&c),
                None => {
                    warn!("Received incomplete syscall completion");
                    Ok(())
                }
            },
            EVENT_IORQ_COMPLETION => match parse_record::<IorqCompletion>(bytes) {
                Some(c) => self.handle_iorq_completion(&c),
                None => {
                    warn!("Received incomplete I/O completion");
                    Ok(())
                }
            },
            other => {
                warn!("Unknown event type: {other}");
                Ok(())
            }
        }
    }

    pub fn handle_sample(&mut self, sample: &TaskSample) -> Result<(), CaptureError> {
        self.samples += 1;
        let wall = self.timebase.wall_from_mono(sample.sample_actual_ktime);
        let hour = TimeBase::hour_key(&wall);
        let timestamp = TimeBase::format_timestamp(&wall);

        let kstack_hash = self.write_stack(
            OutputKind::Kstacks,
            &sample.kstack,
            sample.kstack_len,
            sample,
            &timestamp,
            &hour,
        )?;
        let ustack_hash = self.write_stack(
            OutputKind::Ustacks,
            &sample.ustack,
            sample.ustack_len,
            sample,
            &timestamp,
            &hour,
        )?;

        let row =
            render_sample_row(sample, &self.columns, &self.timebase, kstack_hash, ustack_hash);
        self.sink_write(OutputKind::Samples, &hour, &row)
    }

    fn write_stack(
        &mut self,
        kind: OutputKind,
        addrs: &[u64; MAX_STACK_DEPTH],
        len: u32,
        sample: &TaskSample,
        timestamp: &str,
        hour: &str,
    ) -> Result<Option<StackHash>, CaptureError> {
        if len == 0 {
            return Ok(None);
        }
        let addrs = &addrs[..(len as usize).min(MAX_STACK_DEPTH)];
        let hash = stack_hash(addrs);
        if self.sink.note_stack(kind, hash) {
            let row = format!(
                "{timestamp},{},{},{hash},{}",
                sample.tid,
                sample.tgid,
                format_stack_addrs(addrs)
            );
            self.sink_write(kind, hour, &row)?;
        }
        Ok(Some(hash))
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn handle_sc_completion(&mut self, c: &SyscallCompletion) -> Result<(), CaptureError> {
        self.sc_completions += 1;
        let wall = self.timebase.wall_from_mono(c.sc_exit_time);
        let hour = TimeBase::hour_key(&wall);
        let duration_us = (c.sc_exit_time as i64 - c.sc_enter_time as i64) / 1000;
        let row = format!(
            "sc_completion,{},{},{},{},{},{},{duration_us}",
            c.tid, c.tgid, c.syscall_nr, c.sc_sequence_num, c.sc_enter_time, c.sc_exit_time
        );
        self.sink_write(OutputKind::Syscend, &hour, &row)
    }

    pub fn handle_iorq_completion(&mut self, c: &IorqCompletion) -> Result<(), CaptureError> {
        self.iorq_completions += 1;
        let wall = self.timebase.wall_from_mono(c.complete_time);
        let hour = TimeBase::hour_key(&wall);
        let row = format!(
            "iorq_completion,{},{},{},{},{},{},{},{},{},{},{},{},{}",
            c.insert_tid,
            c.insert_tgid,
            c.issue_tid,
            c.issue_tgid,
            c.iorq_sequence_num,
            c.insert_time,
            c.issue_time,
            c.complete_time,
            dev_str(c.dev),
            c.sector,
            c.bytes,
            iorq_flags_str(c.cmd_flags),
            c.error
        );
        self.sink_write(OutputKind::Iorqend, &hour, &row)
    }

    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcapture_common::EVENT_SC_COMPLETION;

    #[allow(unsafe_code)]
    fn as_bytes<T>(v: &T) -> &[u8] {
        // SAFETY: the wire records are plain #[repr(C)] data
        unsafe {
            std::slice::from_raw_parts(std::ptr::from_ref(v).cast::<u8>(), std::mem::size_of::<T>())
        }
    }

    #[test]
    fn test_parse_record_round_trip() {
        let c = SyscallCompletion {
            event_type: EVENT_SC_COMPLETION,
            tid: 4242,
            tgid: 4242,
            syscall_nr: 0,
            sc_sequence_num: 17,
            sc_enter_time: 500_000_000,
            sc_exit_time: 2_200_000_000,
            ret: 4096,
        };
        let parsed: SyscallCompletion = parse_record(as_bytes(&c)).unwrap();
        assert_eq!(parsed.sc_sequence_num, 17);
        assert_eq!(parsed.ret, 4096);
    }

    #[test]
    fn test_parse_record_rejects_short_buffers() {
        let bytes = [0u8; 4];
        assert!(parse_record::<SyscallCompletion>(&bytes).is_none());
        // But a bare discriminant parses.
        assert!(parse_record::<u32>(&bytes).is_some());
    }
}
