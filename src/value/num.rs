//! Order-preserving codecs for fixed-width integers and floats.
//!
//! Integers are big-endian with the sign bit flipped so negative values sort
//! before positive ones. Floats store their IEEE bit pattern with the sign
//! bit flipped, and all remaining bits complemented when the value is
//! negative, which yields a total order across signed zero and the
//! infinities. Every NaN bit pattern collapses to the all-0xFF encoding, the
//! greatest-sorting form.

use crate::error::{Error, Result};

pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if input.len() < n {
        return Err(Error::malformed(format!(
            "truncated encoding: need {n} bytes, have {}",
            input.len()
        )));
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

pub(crate) fn take_byte(input: &mut &[u8]) -> Result<u8> {
    Ok(take(input, 1)?[0])
}

pub(crate) fn encode_i32(v: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&((v as u32) ^ (1 << 31)).to_be_bytes());
}

pub(crate) fn decode_i32(input: &mut &[u8]) -> Result<i32> {
    let raw = take(input, 4)?;
    let bits = u32::from_be_bytes(raw.try_into().unwrap());
    Ok((bits ^ (1 << 31)) as i32)
}

pub(crate) fn encode_i64(v: i64, out: &mut Vec<u8>) {
    out.extend_from_slice(&((v as u64) ^ (1 << 63)).to_be_bytes());
}

pub(crate) fn decode_i64(input: &mut &[u8]) -> Result<i64> {
    let raw = take(input, 8)?;
    let bits = u64::from_be_bytes(raw.try_into().unwrap());
    Ok((bits ^ (1 << 63)) as i64)
}

pub(crate) fn encode_u32(v: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn decode_u32(input: &mut &[u8]) -> Result<u32> {
    let raw = take(input, 4)?;
    Ok(u32::from_be_bytes(raw.try_into().unwrap()))
}

pub(crate) fn encode_f32(v: f32, out: &mut Vec<u8>) {
    let bits = if v.is_nan() {
        u32::MAX
    } else {
        let bits = v.to_bits();
        if bits & (1 << 31) != 0 {
            !bits
        } else {
            bits ^ (1 << 31)
        }
    };
    out.extend_from_slice(&bits.to_be_bytes());
}

pub(crate) fn decode_f32(input: &mut &[u8]) -> Result<f32> {
    let raw = take(input, 4)?;
    let bits = u32::from_be_bytes(raw.try_into().unwrap());
    let bits = if bits & (1 << 31) != 0 {
        bits ^ (1 << 31)
    } else {
        !bits
    };
    Ok(f32::from_bits(bits))
}

pub(crate) fn encode_f64(v: f64, out: &mut Vec<u8>) {
    let bits = if v.is_nan() {
        u64::MAX
    } else {
        let bits = v.to_bits();
        if bits & (1 << 63) != 0 {
            !bits
        } else {
            bits ^ (1 << 63)
        }
    };
    out.extend_from_slice(&bits.to_be_bytes());
}

pub(crate) fn decode_f64(input: &mut &[u8]) -> Result<f64> {
    let raw = take(input, 8)?;
    let bits = u64::from_be_bytes(raw.try_into().unwrap());
    let bits = if bits & (1 << 63) != 0 {
        bits ^ (1 << 63)
    } else {
        !bits
    };
    Ok(f64::from_bits(bits))
}
