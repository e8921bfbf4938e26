//! Variable-length numbers
//!
//! Standard MIDI uses big-endian 7-bit groups with bit 7 set on every byte
//! except the last. HMI delta times flip both: groups are little-endian and
//! bit 7 marks the *last* byte.

use crate::error::{DecodeError, Result};

/// Read an HMI delta time starting at `pos`. Returns the value and the new position.
pub fn read_hmi(data: &[u8], mut pos: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = *data.get(pos).ok_or(DecodeError::truncated(pos))?;
        pos += 1;
        if shift < 32 {
            value |= ((byte & 0x7F) as u32) << shift;
        }
        if byte & 0x80 != 0 {
            return Ok((value, pos));
        }
        shift += 7;
    }
}

pub fn write_hmi(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let group = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(group | 0x80);
            return;
        }
        out.push(group);
    }
}

/// Read a standard MIDI variable-length number (at most four bytes)
pub fn read_midi(data: &[u8], mut pos: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let byte = *data.get(pos).ok_or(DecodeError::truncated(pos))?;
        pos += 1;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }
    Err(DecodeError::truncated(pos))
}

pub fn write_midi(out: &mut Vec<u8>, value: u32) {
    let value = value & 0x0FFF_FFFF;
    let mut groups = [0u8; 4];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | more);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hmi_single_byte() {
        let mut out = Vec::new();
        write_hmi(&mut out, 0);
        write_hmi(&mut out, 0x7F);
        assert_eq!(out, vec![0x80, 0xFF]);
    }

    #[test]
    fn test_hmi_two_bytes_little_endian() {
        let mut out = Vec::new();
        write_hmi(&mut out, 0x80);
        assert_eq!(out, vec![0x00, 0x81]);
        assert_eq!(read_hmi(&out, 0).unwrap(), (0x80, 2));
    }

    #[test]
    fn test_hmi_truncated() {
        assert!(matches!(
            read_hmi(&[0x01, 0x02], 0),
            Err(DecodeError::Truncated { offset: 2 })
        ));
    }

    #[test]
    fn test_midi_known_values() {
        let mut out = Vec::new();
        write_midi(&mut out, 0x3FFF);
        assert_eq!(out, vec![0xFF, 0x7F]);
        assert_eq!(read_midi(&[0x81, 0x00], 0).unwrap(), (0x80, 2));
    }

    proptest! {
        #[test]
        fn prop_hmi_reads_what_it_writes(value in any::<u32>()) {
            let mut out = Vec::new();
            write_hmi(&mut out, value);
            prop_assert_eq!(read_hmi(&out, 0).unwrap(), (value, out.len()));
        }

        #[test]
        fn prop_midi_reads_what_it_writes(value in 0u32..0x1000_0000) {
            let mut out = Vec::new();
            write_midi(&mut out, value);
            prop_assert_eq!(read_midi(&out, 0).unwrap(), (value, out.len()));
        }
    }
}
