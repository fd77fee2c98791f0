//! Format byte buffers for the trace log.

use std::fmt::Write;

/// Render `data` as a classic hex dump: one line per 16 bytes, with
/// an offset column and an ASCII gutter.
pub(crate) fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (n, row) in data.chunks(16).enumerate() {
        let _ = write!(&mut out, "{:08x} ", n * 16);
        for i in 0..16 {
            if i % 8 == 0 {
                out.push(' ');
            }
            match row.get(i) {
                Some(b) => {
                    let _ = write!(&mut out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
        }
        out.push('|');
        for b in row {
            out.push(if (0x20..0x7f).contains(b) {
                *b as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}

/// Write `data` to the trace log as a hex dump, under a direction
/// marker such as ">>>".
pub(crate) fn trace_bytes(label: &str, data: &[u8]) {
    tracing::trace!("{} {} bytes\n{}", label, data.len(), hexdump(data));
}
