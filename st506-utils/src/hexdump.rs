use std::fmt::Write;

/// Number of bytes shown on each row of a dump.
pub const ROW_BYTES: usize = 16;

/// Format raw track data as a hex dump. Row addresses start from `start`,
/// which is normally the byte offset of `buf` within the disk image.
///
/// Each row holds an address column, up to 16 bytes grouped in fours, and
/// the printable ASCII for those bytes between vertical bars. A short final
/// row is padded so its ASCII column lines up with the rows above it.
pub fn hex_dump(buf: &[u8], start: u64) -> String {
    // Address (12) + gap (4) + bytes (47) + group gaps (3) + ASCII (18) + newline.
    let mut out = String::with_capacity((buf.len() / ROW_BYTES + 1) * 85);
    for (row, chunk) in buf.chunks(ROW_BYTES).enumerate() {
        if row != 0 {
            out.push('\n');
        }
        let address = start + (row * ROW_BYTES) as u64;
        write!(out, "{:#012X}    ", address).unwrap();
        for col in 0..ROW_BYTES {
            if col != 0 {
                out.push_str(if col % 4 == 0 { "  " } else { " " });
            }
            match chunk.get(col) {
                Some(byte) => write!(out, "{:02X}", byte).unwrap(),
                None => out.push_str("  "),
            }
        }
        out.push_str("  |");
        out.extend(chunk.iter().copied().map(printable));
        out.push('|');
    }
    out
}

/// Count how many leading rows of `buf` are entirely `fill`. Used to skip
/// over blank stretches of a track.
pub fn blank_rows(buf: &[u8], fill: u8) -> usize {
    buf.chunks(ROW_BYTES)
        .take_while(|row| row.iter().all(|&b| b == fill))
        .count()
}

fn printable(byte: u8) -> char {
    match byte {
        32..=126 => byte.into(),
        _ => '.',
    }
}
