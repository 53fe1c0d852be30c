//! Four character point encoding for the serial stream.
//!
//! Azimuth and distance are 12 bits each, split into 6 bit groups and
//! mapped to the base64 alphabet, most significant group first:
//! `azimuth[11:6] azimuth[5:0] distance[11:6] distance[5:0]`. Azimuth is
//! two's complement.

use core::fmt::{Display, Formatter};

use crate::angle::TenthDegree;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub const POINT_LENGTH: usize = 4;

const FIELD_MASK: u16 = 0xfff;
const GROUP_MASK: u16 = 0x3f;

/// Distance value for "no valid measurement".
pub const NO_DISTANCE: u16 = 4095;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// Byte outside the encoding alphabet.
    InvalidCharacter(u8),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match *self {
            DecodeError::InvalidCharacter(c) => write!(f, "invalid character {:#04x}", c),
        }
    }
}

fn symbol(group: u16) -> u8 {
    ALPHABET[(group & GROUP_MASK) as usize]
}

fn value(c: u8) -> Option<u16> {
    let v = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };

    Some(v as u16)
}

pub fn encode(azimuth: TenthDegree, distance: u16) -> [u8; POINT_LENGTH] {
    let azimuth = azimuth as u16 & FIELD_MASK;
    let distance = distance & FIELD_MASK;

    [
        symbol(azimuth >> 6),
        symbol(azimuth),
        symbol(distance >> 6),
        symbol(distance),
    ]
}

pub fn decode(point: &[u8; POINT_LENGTH]) -> Result<(TenthDegree, u16), DecodeError> {
    let mut groups = [0u16; POINT_LENGTH];
    for (group, &c) in groups.iter_mut().zip(point) {
        *group = value(c).ok_or(DecodeError::InvalidCharacter(c))?;
    }

    let azimuth = (groups[0] << 6) | groups[1];
    let distance = (groups[2] << 6) | groups[3];

    // Sign extend from 12 bits.
    let azimuth = ((azimuth << 4) as i16) >> 4;

    Ok((azimuth, distance))
}

/// Reassembles points from a byte stream. Line breaks mark a revolution
/// boundary and drop any partial point, so a lost symbol only corrupts the
/// rest of its revolution. Other bytes outside the alphabet are skipped.
#[derive(Default)]
pub struct PointDecoder {
    buf: [u8; POINT_LENGTH],
    len: usize,
}

impl PointDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte, returns a point once four symbols are collected.
    pub fn push(&mut self, c: u8) -> Option<(TenthDegree, u16)> {
        if c == b'\r' || c == b'\n' {
            self.reset();
            return None;
        }
        value(c)?;

        self.buf[self.len] = c;
        self.len += 1;
        if self.len < POINT_LENGTH {
            return None;
        }

        self.len = 0;
        decode(&self.buf).ok()
    }

    /// Drops a partially collected point.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_encode_known() {
        assert_eq!(&encode(0, 0), b"AAAA");
        assert_eq!(&encode(1, 1), b"ABAB");
        assert_eq!(&encode(-1, 4095), b"////");
        assert_eq!(&encode(-1800, 0), b"j4AA");
        assert_eq!(&encode(1799, NO_DISTANCE), b"cH//");
    }

    #[test]
    fn test_decode_extremes() {
        assert_eq!(decode(b"j4AA"), Ok((-1800, 0)));
        assert_eq!(decode(b"cH//"), Ok((1799, 4095)));
        assert_eq!(decode(b"AA*A"), Err(DecodeError::InvalidCharacter(b'*')));
    }

    #[test]
    fn test_stream_decoder() {
        let mut decoder = PointDecoder::new();
        let mut points = Vec::new();

        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(-1188, 1500));
        stream.extend_from_slice(b"\r\n");
        stream.extend_from_slice(&encode(1188, 0));

        for c in stream {
            if let Some(point) = decoder.push(c) {
                points.push(point);
            }
        }

        assert_eq!(points, vec![(-1188, 1500), (1188, 0)]);
    }

    #[test]
    fn test_stream_decoder_resyncs_on_line_break() {
        let mut decoder = PointDecoder::new();
        let mut points = Vec::new();

        // Connected in the middle of a point.
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(500, 42)[1..]);
        stream.extend_from_slice(b"\r\n");
        stream.extend_from_slice(&encode(-1188, 1500));
        stream.extend_from_slice(&encode(1188, 0));

        for c in stream {
            if let Some(point) = decoder.push(c) {
                points.push(point);
            }
        }

        assert_eq!(points, vec![(-1188, 1500), (1188, 0)]);
    }

    quickcheck! {
        fn test_output_in_alphabet(azimuth: i16, distance: u16) -> bool {
            encode(azimuth, distance).iter().all(|c| ALPHABET.contains(c))
        }

        fn test_inverse_in_range(azimuth: i16, distance: u16) -> bool {
            let azimuth = azimuth.rem_euclid(3600) - 1800;
            let distance = distance & 0xfff;

            decode(&encode(azimuth, distance)) == Ok((azimuth, distance))
        }
    }
}
