//! Kernel type bindings for the fields the probes read.
//!
//! Subset of `aya-tool generate` output for the running kernel, trimmed to
//! the structs and fields this crate dereferences through
//! `bpf_probe_read_kernel`. Regenerate with `cargo xtask codegen` after a
//! kernel update.

#![allow(non_camel_case_types)]
#![allow(clippy::pub_underscore_fields)]

use core::ffi::c_void;

#[repr(C)]
pub struct bpf_iter_meta {
    pub seq: *mut c_void,
    pub session_id: u64,
    pub seq_num: u64,
}

/// Context handed to an `iter/task` program: one task per invocation, with a
/// null `task` on the final call of the walk.
#[repr(C)]
pub struct bpf_iter__task {
    pub meta: *mut bpf_iter_meta,
    pub task: *mut task_struct,
}

#[repr(C)]
pub struct task_struct {
    pub __state: u32,
    pub flags: u32,
    pub pid: i32,
    pub tgid: i32,
    pub mm: *mut mm_struct,
    pub cred: *const cred,
    pub comm: [u8; 16],
    pub files: *mut files_struct,
}

#[repr(C)]
pub struct cred {
    pub usage: u32,
    pub uid: u32,
    pub gid: u32,
    pub suid: u32,
    pub sgid: u32,
    pub euid: u32,
    pub egid: u32,
    pub fsuid: u32,
    pub fsgid: u32,
}

#[repr(C)]
pub struct mm_struct {
    pub exe_file: *mut file,
}

#[repr(C)]
pub struct files_struct {
    pub count: u32,
    pub __pad: u32,
    pub fdt: *mut fdtable,
}

#[repr(C)]
pub struct fdtable {
    pub max_fds: u32,
    pub __pad: u32,
    pub fd: *mut *mut file,
}

#[repr(C)]
pub struct file {
    pub f_path: path,
    pub f_inode: *mut inode,
    pub f_op: *const c_void,
    pub private_data: *mut c_void,
}

#[repr(C)]
pub struct path {
    pub mnt: *mut c_void,
    pub dentry: *mut dentry,
}

#[repr(C)]
pub struct dentry {
    pub d_flags: u32,
    pub d_seq: u32,
    pub d_hash: [*mut c_void; 2],
    pub d_parent: *mut dentry,
    pub d_name: qstr,
    pub d_inode: *mut inode,
}

#[repr(C)]
pub struct qstr {
    pub hash_len: u64,
    pub name: *const u8,
}

#[repr(C)]
pub struct inode {
    pub i_mode: u16,
    pub i_opflags: u16,
    pub i_uid: u32,
    pub i_gid: u32,
    pub i_flags: u32,
}

pub const S_IFMT: u16 = 0xf000;
pub const S_IFSOCK: u16 = 0xc000;

#[repr(C)]
pub struct socket {
    pub state: u32,
    pub type_: i16,
    pub __pad: u16,
    pub flags: u64,
    pub file: *mut file,
    pub sk: *mut sock,
}

#[repr(C)]
pub struct sock_common {
    pub skc_daddr: u32,
    pub skc_rcv_saddr: u32,
    pub skc_hash: u32,
    pub skc_dport: u16, // network byte order
    pub skc_num: u16,   // host byte order
    pub skc_family: u16,
    pub skc_state: u8,
    pub skc_reuse: u8,
    pub skc_bound_dev_if: i32,
    pub skc_v6_daddr: [u8; 16],
    pub skc_v6_rcv_saddr: [u8; 16],
}

#[repr(C)]
pub struct sock {
    pub __sk_common: sock_common,
    pub sk_protocol: u16,
    pub sk_type: u16,
}

/// Userspace AIO ring header, mapped into the submitting process.
#[repr(C)]
pub struct aio_ring {
    pub id: u32,
    pub nr: u32,
    pub head: u32,
    pub tail: u32,
}

/// x86_64 register file as saved on kernel entry.
#[repr(C)]
pub struct pt_regs {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub bp: u64,
    pub bx: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub ax: u64,
    pub cx: u64,
    pub dx: u64,
    pub si: u64,
    pub di: u64,
    pub orig_ax: u64,
    pub ip: u64,
    pub cs: u64,
    pub flags: u64,
    pub sp: u64,
    pub ss: u64,
}

#[repr(C)]
pub struct request {
    pub q: *mut c_void,
    pub mq_ctx: *mut c_void,
    pub mq_hctx: *mut c_void,
    pub cmd_flags: u32,
    pub rq_flags: u32,
    pub tag: i32,
    pub internal_tag: i32,
    pub timeout: u32,
    pub __data_len: u32,
    pub __sector: u64,
    pub bio: *mut c_void,
    pub biotail: *mut c_void,
    pub part: *mut block_device,
}

#[repr(C)]
pub struct block_device {
    pub bd_start_sect: u64,
    pub bd_nr_sectors: u64,
    pub bd_stamp: u64,
    pub bd_read_only: u8,
    pub bd_partno: u8,
    pub __pad: u16,
    pub bd_dev: u32,
}
