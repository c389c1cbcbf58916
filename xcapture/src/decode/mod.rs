//! Record field decoding
//!
//! Static lookup tables turning kernel-side numeric fields into the names
//! the CSV schema uses: syscall numbers, task states, block I/O command
//! flags, and device numbers.

pub mod dev;
pub mod iorq_flags;
pub mod syscall;
pub mod task_state;

pub use dev::dev_str;
pub use iorq_flags::iorq_flags_str;
pub use syscall::syscall_name;
pub use task_state::task_state_name;
