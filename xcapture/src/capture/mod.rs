//! Capture core
//!
//! eBPF load/attach/configure on one side, ring-buffer consumption on the
//! other. `EventPipeline` is deliberately free of aya types so the record
//! handling can be tested on synthetic byte streams.

pub mod consumer;
pub mod ebpf_setup;

pub use consumer::{parse_record, EventPipeline};
pub use ebpf_setup::{
    attach_probes, init_ebpf_logger, load_ebpf_object, run_task_iterator, write_config,
};
