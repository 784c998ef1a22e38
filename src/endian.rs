//! Byte order normalization.
//!
//! Mach-O images record their byte order in the magic. When it differs
//! from the host's, every buffer read from the image is normalized by
//! reversing the bytes of each 4-byte group, leaving the groups in place.
//! Packed character arrays (segment and section names, UUIDs) go through
//! the same transformation, so rendering them as text means normalizing
//! them once more.

/// Reverses the bytes within every 4-byte group of `buf`.
///
/// A trailing group shorter than 4 bytes is reversed as well. Applying the
/// function twice yields the original buffer.
pub fn normalize(buf: &mut [u8]) {
    buf.chunks_mut(4).for_each(|group| group.reverse());
}

/// Returns a copy of `bytes`, normalized only if `swap` is set.
pub fn normalized(bytes: &[u8], swap: bool) -> Vec<u8> {
    let mut buf = bytes.to_vec();
    if swap {
        normalize(&mut buf);
    }
    buf
}

/// Renders a null-padded character array as text, stopping at the first
/// null or at the end of `bytes`.
pub fn fixed_str(bytes: &[u8], swap: bool) -> String {
    let buf = normalized(bytes, swap);
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Formats 16 UUID bytes as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
pub fn uuid_string(bytes: &[u8; 16], swap: bool) -> String {
    let buf = normalized(bytes, swap);
    let hex = |range: std::ops::Range<usize>| {
        buf[range]
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<String>()
    };
    format!(
        "{}-{}-{}-{}-{}",
        hex(0..4),
        hex(4..6),
        hex(6..8),
        hex(8..10),
        hex(10..16)
    )
}
