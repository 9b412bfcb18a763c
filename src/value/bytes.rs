//! Order-preserving codec for strings and variable-length binary.
//!
//! 0x00 bytes are escaped as `0x00 0xFF` and the sequence is terminated with
//! `0x00 0x00`, so encodings stay correctly ordered and self-delimiting when
//! further key fields follow. Fixed-length binary is stored raw.

use crate::error::{Error, Result};
use crate::value::num::take_byte;

pub(crate) fn encode_escaped(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0x00 {
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(b);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

pub(crate) fn decode_escaped(input: &mut &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let b = take_byte(input)?;
        if b != 0x00 {
            out.push(b);
            continue;
        }
        match take_byte(input)? {
            0x00 => return Ok(out),
            0xFF => out.push(0x00),
            other => {
                return Err(Error::malformed(format!(
                    "invalid escape byte {other:#04x} in string encoding"
                )))
            }
        }
    }
}

pub(crate) fn encode_fixed(bytes: &[u8], len: usize, out: &mut Vec<u8>) -> Result<()> {
    if bytes.len() != len {
        return Err(Error::malformed(format!(
            "fixed binary of width {len} got {} bytes",
            bytes.len()
        )));
    }
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::test_util::hex;

    macro_rules! test_escaped {
        ( $( $name:ident: $input:expr => $expect:literal, )* ) => {
        $(
            #[test]
            fn $name() {
                let input: &[u8] = $input;
                let mut out = Vec::new();
                encode_escaped(input, &mut out);
                assert_eq!(hex(&out), $expect, "encode failed");
                let mut cursor = out.as_slice();
                assert_eq!(decode_escaped(&mut cursor).unwrap(), input, "decode failed");
                assert!(cursor.is_empty());
            }
        )*
        };
    }

    test_escaped! {
        empty: b"" => "0000",
        plain: b"foo" => "666f6f0000",
        escape: b"foo\x00bar" => "666f6f00ff6261720000",
        leading_zero: &[0x00, 0x01, 0x02] => "00ff01020000",
    }

    #[test]
    fn prefix_sorts_before_extension() {
        let mut a = Vec::new();
        encode_escaped(b"a", &mut a);
        let mut ab = Vec::new();
        encode_escaped(b"ab", &mut ab);
        let mut a_nul = Vec::new();
        encode_escaped(b"a\x00", &mut a_nul);
        assert!(a < a_nul);
        assert!(a_nul < ab);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut cursor: &[u8] = &[0x61, 0x00];
        assert!(decode_escaped(&mut cursor).is_err());
    }
}
