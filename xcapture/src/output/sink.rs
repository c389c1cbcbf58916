//! Per-kind CSV writers with hourly rotation
//!
//! Each output kind gets its own file, named
//! `xcapture_<kind>_<YYYY-MM-DD.HH>.csv`. The first record whose wall-clock
//! hour differs from the open files' hour closes them all and opens the next
//! hour's set, each with a one-time header line. Without an output
//! directory, rows stream to stdout with headers printed once per kind.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::domain::StackHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Samples,
    Syscend,
    Iorqend,
    Kstacks,
    Ustacks,
}

impl OutputKind {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Samples => "samples",
            Self::Syscend => "syscend",
            Self::Iorqend => "iorqend",
            Self::Kstacks => "kstacks",
            Self::Ustacks => "ustacks",
        }
    }
}

pub struct CsvSink {
    dir: Option<PathBuf>,
    headers: Vec<(OutputKind, String)>,
    current_hour: Option<String>,
    files: HashMap<OutputKind, BufWriter<File>>,
    stdout_headers: HashSet<OutputKind>,
    seen_kstacks: HashSet<StackHash>,
    seen_ustacks: HashSet<StackHash>,
}

impl CsvSink {
    /// `headers` lists the enabled kinds; rows for other kinds are dropped.
    #[must_use]
    pub fn new(dir: Option<PathBuf>, headers: Vec<(OutputKind, String)>) -> Self {
        Self {
            dir,
            headers,
            current_hour: None,
            files: HashMap::new(),
            stdout_headers: HashSet::new(),
            seen_kstacks: HashSet::new(),
            seen_ustacks: HashSet::new(),
        }
    }

    fn enabled(&self, kind: OutputKind) -> bool {
        self.headers.iter().any(|(k, _)| *k == kind)
    }

    /// Whether this stack hash is new for the current hour (and mark it
    /// seen). One stacks-file row per distinct hash per hour.
    pub fn note_stack(&mut self, kind: OutputKind, hash: StackHash) -> bool {
        let seen = match kind {
            OutputKind::Kstacks => &mut self.seen_kstacks,
            OutputKind::Ustacks => &mut self.seen_ustacks,
            _ => return false,
        };
        seen.insert(hash)
    }

    pub fn write_row(&mut self, kind: OutputKind, hour_key: &str, row: &str) -> io::Result<()> {
        if !self.enabled(kind) {
            return Ok(());
        }
        if self.dir.is_some() {
            if self.current_hour.as_deref() != Some(hour_key) {
                self.rotate(hour_key)?;
            }
            if let Some(w) = self.files.get_mut(&kind) {
                writeln!(w, "{row}")?;
            }
        } else {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            if self.stdout_headers.insert(kind) {
                let header = self
                    .headers
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, h)| h.as_str())
                    .unwrap_or_default();
                writeln!(out, "{header}")?;
            }
            writeln!(out, "{row}")?;
        }
        Ok(())
    }

    fn rotate(&mut self, hour_key: &str) -> io::Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        for (_, w) in self.files.drain() {
            let mut w = w;
            w.flush()?;
        }
        for (kind, header) in &self.headers {
            let path = dir.join(format!("xcapture_{}_{}.csv", kind.tag(), hour_key));
            let mut writer = BufWriter::new(File::create(path)?);
            writeln!(writer, "{header}")?;
            self.files.insert(*kind, writer);
        }
        // Stack dedup is per hour: each hour's file restates its stacks.
        self.seen_kstacks.clear();
        self.seen_ustacks.clear();
        self.current_hour = Some(hour_key.to_string());
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for w in self.files.values_mut() {
            w.flush()?;
        }
        if self.dir.is_none() {
            io::stdout().flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sink_in(dir: &std::path::Path) -> CsvSink {
        CsvSink::new(
            Some(dir.to_path_buf()),
            vec![
                (OutputKind::Samples, "TIMESTAMP,TID".to_string()),
                (OutputKind::Kstacks, "TIMESTAMP,TID,TGID,STACK_HASH,STACK_ADDRS".to_string()),
            ],
        )
    }

    #[test]
    fn test_hour_rollover_opens_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path());

        sink.write_row(OutputKind::Samples, "2026-08-01.02", "2026-08-01 02:59:59.900000,1")
            .unwrap();
        sink.write_row(OutputKind::Samples, "2026-08-01.03", "2026-08-01 03:00:00.900000,1")
            .unwrap();
        sink.flush().unwrap();

        let old = fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.02.csv")).unwrap();
        let new = fs::read_to_string(dir.path().join("xcapture_samples_2026-08-01.03.csv")).unwrap();
        assert_eq!(old, "TIMESTAMP,TID\n2026-08-01 02:59:59.900000,1\n");
        assert_eq!(new, "TIMESTAMP,TID\n2026-08-01 03:00:00.900000,1\n");
    }

    #[test]
    fn test_stack_dedup_resets_on_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        sink.write_row(OutputKind::Samples, "2026-08-01.02", "x").unwrap();

        assert!(sink.note_stack(OutputKind::Kstacks, StackHash(0xabc)));
        assert!(!sink.note_stack(OutputKind::Kstacks, StackHash(0xabc)));

        sink.write_row(OutputKind::Samples, "2026-08-01.03", "y").unwrap();
        assert!(sink.note_stack(OutputKind::Kstacks, StackHash(0xabc)));
    }

    #[test]
    fn test_disabled_kind_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        sink.write_row(OutputKind::Iorqend, "2026-08-01.02", "z").unwrap();
        sink.flush().unwrap();
        assert!(!dir.path().join("xcapture_iorqend_2026-08-01.02.csv").exists());
    }
}
