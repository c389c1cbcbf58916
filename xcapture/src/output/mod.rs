//! CSV output
//!
//! Row rendering, per-kind writers with hourly rotation, and stack-trace
//! deduplication by content hash.

pub mod fields;
pub mod sink;
pub mod stacks;

pub use fields::{
    header_row, narrow_columns, parse_columns, render_sample_row, wide_columns, Column,
};
pub use sink::{CsvSink, OutputKind};
pub use stacks::{format_stack_addrs, stack_hash, FNV_OFFSET_BASIS};
