/// 16-bit Internet checksum (ones' complement) accumulated over several
/// slices, as if they were one contiguous buffer.
///
/// Odd-length slices are padded with a zero byte, so callers should only
/// pass an odd-length slice last.
pub fn internet_checksum(parts: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;

    for data in parts {
        let mut chunks = data.chunks_exact(2);
        for chunk in &mut chunks {
            let value = u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
            sum = sum.wrapping_add(value);
        }
        if let Some(&byte) = chunks.remainder().first() {
            sum = sum.wrapping_add((byte as u32) << 8);
        }
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
