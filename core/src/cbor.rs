// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Minimal CBOR encoder for transaction-body serialisation
//!
//! Covers exactly the subset of CBOR the signing protocol feeds through the
//! streaming builder: unsigned integers, byte strings, text strings,
//! definite-length arrays and maps, tags and null. Collections of known
//! cardinality whose elements arrive incrementally are handled by
//! [`LazyCollection`][crate::engine::LazyCollection] on top of the header
//! codec here.

use byteorder::{BigEndian, ByteOrder};
use heapless::Vec;

use crate::engine::Error;

/// Maximum encoded length of a single CBOR header
/// (initial byte + 8-byte length extension)
pub const MAX_HEADER_LEN: usize = 9;

/// CBOR major types used by the signing protocol
#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum Major {
    Unsigned = 0,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Primitive = 7,
}

/// Initial byte for CBOR null (major 7, additional info 22)
pub const NULL_BYTE: u8 = 0xf6;

/// Write a CBOR major-type header into `out`, returning the encoded length.
///
/// Short form is used for values below 24, then the 1/2/4/8-byte big-endian
/// length extensions (additional info 24..=27).
pub fn header(major: Major, value: u64, out: &mut [u8; MAX_HEADER_LEN]) -> usize {
    let t = (major as u8) << 5;

    if value < 24 {
        out[0] = t | value as u8;
        1
    } else if value < 0x100 {
        out[0] = t | 24;
        out[1] = value as u8;
        2
    } else if value < 0x1_0000 {
        out[0] = t | 25;
        BigEndian::write_u16(&mut out[1..3], value as u16);
        3
    } else if value < 0x1_0000_0000 {
        out[0] = t | 26;
        BigEndian::write_u32(&mut out[1..5], value as u32);
        5
    } else {
        out[0] = t | 27;
        BigEndian::write_u64(&mut out[1..9], value);
        9
    }
}

/// Write a CBOR major-type header into a bounded buffer
pub fn write_header<const N: usize>(
    buf: &mut Vec<u8, N>,
    major: Major,
    value: u64,
) -> Result<(), Error> {
    let mut tmp = [0u8; MAX_HEADER_LEN];
    let n = header(major, value, &mut tmp);

    buf.extend_from_slice(&tmp[..n])
        .map_err(|_| Error::EncodingFailed)
}

/// Decode a CBOR major-type header, returning `(major, value, consumed)`.
///
/// Only the majors in [`Major`] are accepted; indefinite lengths
/// (additional info 31) and the remaining simple values are rejected as the
/// signing protocol never produces them.
pub fn read_header(buf: &[u8]) -> Result<(Major, u64, usize), Error> {
    let initial = *buf.first().ok_or(Error::EncodingFailed)?;

    let major = match initial >> 5 {
        0 => Major::Unsigned,
        2 => Major::Bytes,
        3 => Major::Text,
        4 => Major::Array,
        5 => Major::Map,
        6 => Major::Tag,
        7 => Major::Primitive,
        _ => return Err(Error::EncodingFailed),
    };

    let info = initial & 0x1f;
    let (value, consumed) = match info {
        0..=23 => (info as u64, 1),
        24 => (*buf.get(1).ok_or(Error::EncodingFailed)? as u64, 2),
        25 => {
            let b = buf.get(1..3).ok_or(Error::EncodingFailed)?;
            (BigEndian::read_u16(b) as u64, 3)
        }
        26 => {
            let b = buf.get(1..5).ok_or(Error::EncodingFailed)?;
            (BigEndian::read_u32(b) as u64, 5)
        }
        27 => {
            let b = buf.get(1..9).ok_or(Error::EncodingFailed)?;
            (BigEndian::read_u64(b), 9)
        }
        _ => return Err(Error::EncodingFailed),
    };

    Ok((major, value, consumed))
}

/// Variable-length quantity encoding (base-128, big-endian, continuation
/// bit set on all bytes but the last), used for pointer/index encoding in
/// pointer addresses.
pub fn variable_length_encode<const N: usize>(
    mut value: u64,
    buf: &mut Vec<u8, N>,
) -> Result<(), Error> {
    // 64 bits / 7 bits per byte
    let mut tmp = [0u8; 10];
    let mut i = tmp.len() - 1;

    tmp[i] = (value & 0x7f) as u8;
    value >>= 7;

    while value > 0 {
        i -= 1;
        tmp[i] = (value & 0x7f) as u8 | 0x80;
        value >>= 7;
    }

    buf.extend_from_slice(&tmp[i..])
        .map_err(|_| Error::EncodingFailed)
}

/// CBOR value, borrowing its payloads from the caller
///
/// Protocol items are assembled on the stack as `Value` trees (see
/// [`assemble`][crate::engine::assemble]) and encoded into the pending-item
/// buffer of the active [`LazyCollection`][crate::engine::LazyCollection].
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Value<'a> {
    Unsigned(u64),
    Bytes(&'a [u8]),
    Text(&'a str),
    Array(&'a [Value<'a>]),
    Map(&'a [(Value<'a>, Value<'a>)]),
    Tagged(u64, &'a Value<'a>),
    Null,
}

/// One-shot encode a [`Value`] into a bounded buffer
#[cfg_attr(feature = "noinline", inline(never))]
pub fn encode<const N: usize>(value: &Value, buf: &mut Vec<u8, N>) -> Result<(), Error> {
    match value {
        Value::Unsigned(v) => write_header(buf, Major::Unsigned, *v),
        Value::Bytes(b) => {
            write_header(buf, Major::Bytes, b.len() as u64)?;
            buf.extend_from_slice(b).map_err(|_| Error::EncodingFailed)
        }
        Value::Text(s) => {
            write_header(buf, Major::Text, s.len() as u64)?;
            buf.extend_from_slice(s.as_bytes())
                .map_err(|_| Error::EncodingFailed)
        }
        Value::Array(items) => {
            write_header(buf, Major::Array, items.len() as u64)?;
            for item in items.iter() {
                encode(item, buf)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            write_header(buf, Major::Map, entries.len() as u64)?;
            for (k, v) in entries.iter() {
                encode(k, buf)?;
                encode(v, buf)?;
            }
            Ok(())
        }
        Value::Tagged(tag, inner) => {
            write_header(buf, Major::Tag, *tag)?;
            encode(inner, buf)
        }
        Value::Null => buf.push(NULL_BYTE).map_err(|_| Error::EncodingFailed),
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec::Vec as StdVec;

    use super::*;

    fn encoded(value: &Value) -> StdVec<u8> {
        let mut buf = Vec::<u8, 256>::new();
        encode(value, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn unsigned_headers() {
        // test vectors from RFC 7049 appendix A
        let tests: &[(u64, &str)] = &[
            (0, "00"),
            (1, "01"),
            (10, "0a"),
            (23, "17"),
            (24, "1818"),
            (25, "1819"),
            (100, "1864"),
            (1000, "1903e8"),
            (1000000, "1a000f4240"),
            (1000000000000, "1b000000e8d4a51000"),
        ];

        for (value, hex) in tests {
            assert_eq!(
                encoded(&Value::Unsigned(*value)),
                hex::decode(hex).unwrap(),
                "encoding mismatch for {value}"
            );
        }
    }

    #[test]
    fn header_roundtrip() {
        let tests: &[(Major, u64)] = &[
            (Major::Unsigned, 0),
            (Major::Bytes, 23),
            (Major::Array, 24),
            (Major::Map, 255),
            (Major::Text, 256),
            (Major::Tag, 65536),
            (Major::Array, u32::MAX as u64 + 1),
        ];

        for (major, value) in tests {
            let mut tmp = [0u8; MAX_HEADER_LEN];
            let n = header(*major, *value, &mut tmp);

            let (m, v, consumed) = read_header(&tmp[..n]).unwrap();
            assert_eq!((m, v, consumed), (*major, *value, n));
        }
    }

    #[test]
    fn read_header_rejects_truncated() {
        assert_eq!(read_header(&[]), Err(Error::EncodingFailed));
        // 2-byte length extension with no payload
        assert_eq!(read_header(&[0x19]), Err(Error::EncodingFailed));
        // indefinite length
        assert_eq!(read_header(&[0x9f]), Err(Error::EncodingFailed));
    }

    #[test]
    fn strings_and_collections() {
        let tests: &[(Value, &str)] = &[
            (Value::Bytes(b""), "40"),
            (Value::Bytes(&[0x01, 0x02, 0x03, 0x04]), "4401020304"),
            (Value::Text(""), "60"),
            (Value::Text("Fun"), "6346756e"),
            (Value::Array(&[]), "80"),
            (
                Value::Array(&[Value::Unsigned(1), Value::Unsigned(2), Value::Unsigned(3)]),
                "83010203",
            ),
            (
                Value::Array(&[
                    Value::Unsigned(1),
                    Value::Array(&[Value::Unsigned(2), Value::Unsigned(3)]),
                    Value::Array(&[Value::Unsigned(4), Value::Unsigned(5)]),
                ]),
                "8301820203820405",
            ),
            (Value::Map(&[]), "a0"),
            (
                Value::Map(&[
                    (Value::Unsigned(1), Value::Unsigned(2)),
                    (Value::Unsigned(3), Value::Unsigned(4)),
                ]),
                "a201020304",
            ),
            (
                Value::Tagged(1, &Value::Unsigned(1363896240)),
                "c11a514b67b0",
            ),
            (Value::Null, "f6"),
        ];

        for (value, hex) in tests {
            assert_eq!(
                encoded(value),
                hex::decode(hex).unwrap(),
                "encoding mismatch for {value:?}"
            );
        }
    }

    #[test]
    fn long_array_header() {
        // 25 elements forces the 1-byte length extension
        let items = [Value::Unsigned(0); 25];
        let b = encoded(&Value::Array(&items));
        assert_eq!(&b[..2], &[0x98, 25]);
        assert_eq!(b.len(), 2 + 25);
    }

    #[test]
    fn variable_length_quantities() {
        let tests: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x81, 0x00]),
            (129, &[0x81, 0x01]),
            (300, &[0x82, 0x2c]),
            (1 << 20, &[0xc0, 0x80, 0x00]),
        ];

        for (value, expected) in tests {
            let mut buf = Vec::<u8, 16>::new();
            variable_length_encode(*value, &mut buf).unwrap();
            assert_eq!(&buf[..], *expected, "vlq mismatch for {value}");
        }
    }

    #[test]
    fn encode_overflow_reports_error() {
        let mut buf = Vec::<u8, 4>::new();
        let r = encode(&Value::Bytes(&[0u8; 8]), &mut buf);
        assert_eq!(r, Err(Error::EncodingFailed));
    }
}
