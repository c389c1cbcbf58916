//! Block I/O command flag decoding
//!
//! `cmd_flags` carries the request operation in the low byte and REQ_* flag
//! bits above it. Rendered as the operation name followed by a "|"-joined
//! flag list, e.g. `Write|FUA|Sync`.

const REQ_OP_MASK: u32 = 0xff;

// REQ_* flag bits, rendered in this order when set.
const FLAG_NAMES: &[(u32, &str)] = &[
    (1 << 21, "NoWait"),
    (1 << 20, "Background"),
    (1 << 19, "ReadAhead"),
    (1 << 18, "PreFlush"),
    (1 << 17, "FUA"),
    (1 << 16, "Integrity"),
    (1 << 15, "Idle"),
    (1 << 14, "NoMerge"),
    (1 << 13, "Priority"),
    (1 << 12, "Metadata"),
    (1 << 11, "Sync"),
];

fn op_name(op: u32) -> Option<&'static str> {
    match op {
        0 => Some("Read"),
        1 => Some("Write"),
        2 => Some("Flush"),
        3 => Some("Discard"),
        5 => Some("SecureErase"),
        9 => Some("WriteZeroes"),
        10 => Some("ZoneOpen"),
        11 => Some("ZoneClose"),
        12 => Some("ZoneFinish"),
        13 => Some("ZoneAppend"),
        15 => Some("ZoneReset"),
        17 => Some("ZoneResetAll"),
        _ => None,
    }
}

#[must_use]
pub fn iorq_flags_str(cmd_flags: u32) -> String {
    let op = cmd_flags & REQ_OP_MASK;
    let mut out = match op_name(op) {
        Some(name) => name.to_string(),
        None => format!("Op{op}"),
    };
    for (bit, name) in FLAG_NAMES {
        if cmd_flags & bit != 0 {
            out.push('|');
            out.push_str(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ops() {
        assert_eq!(iorq_flags_str(0), "Read");
        assert_eq!(iorq_flags_str(1), "Write");
        assert_eq!(iorq_flags_str(2), "Flush");
        assert_eq!(iorq_flags_str(3), "Discard");
    }

    #[test]
    fn test_flag_join() {
        // Write + FUA + Sync
        let flags = 1 | (1 << 17) | (1 << 11);
        assert_eq!(iorq_flags_str(flags), "Write|FUA|Sync");
    }

    #[test]
    fn test_readahead() {
        let flags = (1 << 19) | (1 << 11);
        assert_eq!(iorq_flags_str(flags), "Read|ReadAhead|Sync");
    }

    #[test]
    fn test_unknown_op_renders_numeric() {
        assert_eq!(iorq_flags_str(7), "Op7");
    }
}
