//! Arbitrary-precision decimal values and their order-preserving encoding.
//!
//! A decimal is kept canonical: a sign in {-1, 0, 1}, the base-10 exponent
//! of the leading significant digit, and the minimal significant-digit
//! sequence with trailing zeros stripped. Equal numeric values therefore
//! serialize identically regardless of the scale they were written with
//! ("1E1" and "10" are the same value and the same bytes).
//!
//! Encoding layout: one sign marker (negative < zero < positive), then for
//! non-zero values a self-describing 1-5 byte exponent whose unsigned byte
//! order matches numeric order over the full i32 range, then the digits
//! packed two per byte with a terminator. For negative values the exponent,
//! digit and terminator bytes are complemented, which reverses the magnitude
//! order as required.

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::error::{Error, Result};
use crate::value::num::take_byte;

const MARK_NEG: u8 = 0x10;
const MARK_ZERO: u8 = 0x80;
const MARK_POS: u8 = 0xF0;

// Exponent class bases. Each class starts where the previous one ends, so
// every exponent has exactly one (canonical) encoding.
const BASE2: u32 = 64;
const BASE3: u32 = 8_256;
const BASE4: u32 = 1_056_832;
const BASE5: u32 = 135_274_560;

/// An arbitrary-precision decimal number in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    sign: i8,
    exponent: i32,
    digits: Vec<u8>,
}

impl Decimal {
    /// The value zero.
    pub fn zero() -> Self {
        Decimal {
            sign: 0,
            exponent: 0,
            digits: Vec::new(),
        }
    }

    /// Whether this decimal is zero.
    pub fn is_zero(&self) -> bool {
        self.sign == 0
    }

    /// Sign of the value: -1, 0 or 1.
    pub fn signum(&self) -> i8 {
        self.sign
    }

    /// Base-10 exponent of the leading significant digit. Zero for the
    /// value zero.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// The significant digits, most significant first, trailing zeros
    /// stripped. Empty for the value zero.
    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    /// Parses a decimal from a string such as `10`, `-0.05` or `1.2e-3`.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let mut pos = 0;
        let mut sign: i8 = 1;
        match bytes.first() {
            Some(b'-') => {
                sign = -1;
                pos = 1;
            }
            Some(b'+') => pos = 1,
            _ => {}
        }

        let mut digits = Vec::new();
        let mut int_len: i64 = 0;
        let mut seen_point = false;
        let mut seen_digit = false;
        while pos < bytes.len() {
            match bytes[pos] {
                b @ b'0'..=b'9' => {
                    digits.push(b - b'0');
                    if !seen_point {
                        int_len += 1;
                    }
                    seen_digit = true;
                }
                b'.' if !seen_point => seen_point = true,
                b'e' | b'E' => break,
                other => {
                    return Err(Error::malformed(format!(
                        "unexpected byte {:?} in decimal {s:?}",
                        other as char
                    )))
                }
            }
            pos += 1;
        }
        if !seen_digit {
            return Err(Error::malformed(format!("decimal {s:?} has no digits")));
        }

        let mut exp: i64 = 0;
        if pos < bytes.len() {
            // bytes[pos] is 'e' or 'E'
            pos += 1;
            let mut exp_sign: i64 = 1;
            match bytes.get(pos) {
                Some(b'-') => {
                    exp_sign = -1;
                    pos += 1;
                }
                Some(b'+') => pos += 1,
                _ => {}
            }
            let mut any = false;
            while pos < bytes.len() {
                match bytes[pos] {
                    b @ b'0'..=b'9' => {
                        exp = exp
                            .checked_mul(10)
                            .and_then(|e| e.checked_add((b - b'0') as i64))
                            .ok_or_else(|| {
                                Error::malformed(format!("exponent overflow in decimal {s:?}"))
                            })?;
                        any = true;
                    }
                    other => {
                        return Err(Error::malformed(format!(
                            "unexpected byte {:?} in decimal exponent of {s:?}",
                            other as char
                        )))
                    }
                }
                pos += 1;
            }
            if !any {
                return Err(Error::malformed(format!("decimal {s:?} has empty exponent")));
            }
            exp *= exp_sign;
        }

        let first = match digits.iter().position(|&d| d != 0) {
            Some(first) => first,
            None => return Ok(Decimal::zero()),
        };
        let last = digits.iter().rposition(|&d| d != 0).unwrap();
        let exponent = int_len - 1 - first as i64 + exp;
        let exponent = i32::try_from(exponent).map_err(|_| {
            Error::malformed(format!("exponent {exponent} of decimal {s:?} exceeds i32"))
        })?;
        Ok(Decimal {
            sign,
            exponent,
            digits: digits[first..=last].to_vec(),
        })
    }

    fn from_int(negative: bool, mut magnitude: u128) -> Self {
        if magnitude == 0 {
            return Decimal::zero();
        }
        let mut digits = Vec::new();
        while magnitude > 0 {
            digits.push((magnitude % 10) as u8);
            magnitude /= 10;
        }
        digits.reverse();
        let exponent = digits.len() as i32 - 1;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        Decimal {
            sign: if negative { -1 } else { 1 },
            exponent,
            digits,
        }
    }

    fn magnitude_cmp(&self, other: &Self) -> Ordering {
        self.exponent
            .cmp(&other.exponent)
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Decimal::from_int(v < 0, v.unsigned_abs() as u128)
    }
}

impl From<u64> for Decimal {
    fn from(v: u64) -> Self {
        Decimal::from_int(false, v as u128)
    }
}

impl From<i32> for Decimal {
    fn from(v: i32) -> Self {
        Decimal::from(v as i64)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Decimal::parse(s)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.sign.cmp(&other.sign) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.sign {
            0 => Ordering::Equal,
            s if s > 0 => self.magnitude_cmp(other),
            _ => other.magnitude_cmp(self),
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign == 0 {
            return write!(f, "0");
        }
        if self.sign < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", self.digits[0])?;
        if self.digits.len() > 1 {
            write!(f, ".")?;
            for d in &self.digits[1..] {
                write!(f, "{d}")?;
            }
        }
        if self.exponent != 0 {
            write!(f, "E{}", self.exponent)?;
        }
        Ok(())
    }
}

pub(crate) fn encode(d: &Decimal, out: &mut Vec<u8>) {
    match d.sign.cmp(&0) {
        Ordering::Equal => out.push(MARK_ZERO),
        Ordering::Greater => {
            out.push(MARK_POS);
            encode_magnitude(d, out);
        }
        Ordering::Less => {
            out.push(MARK_NEG);
            let start = out.len();
            encode_magnitude(d, out);
            for b in &mut out[start..] {
                *b = !*b;
            }
        }
    }
}

fn encode_magnitude(d: &Decimal, out: &mut Vec<u8>) {
    encode_exponent(d.exponent, out);
    encode_digits(&d.digits, out);
}

fn encode_exponent(e: i32, out: &mut Vec<u8>) {
    let (n, invert) = if e >= 0 {
        (e as u32, false)
    } else {
        ((-(e as i64) - 1) as u32, true)
    };
    let start = out.len();
    if n < BASE2 {
        out.push(0x80 | n as u8);
    } else if n < BASE3 {
        let d = n - BASE2;
        out.push(0xC0 | (d >> 8) as u8);
        out.push(d as u8);
    } else if n < BASE4 {
        let d = n - BASE3;
        out.push(0xE0 | (d >> 16) as u8);
        out.push((d >> 8) as u8);
        out.push(d as u8);
    } else if n < BASE5 {
        let d = n - BASE4;
        out.push(0xF0 | (d >> 24) as u8);
        out.push((d >> 16) as u8);
        out.push((d >> 8) as u8);
        out.push(d as u8);
    } else {
        let d = n - BASE5;
        out.push(0xF8);
        out.extend_from_slice(&d.to_be_bytes());
    }
    if invert {
        for b in &mut out[start..] {
            *b = !*b;
        }
    }
}

fn encode_digits(digits: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < digits.len() {
        let pair = if i + 1 < digits.len() {
            digits[i] * 10 + digits[i + 1]
        } else {
            // Odd trailing digit packs as the pair d*10; a canonical digit
            // sequence never ends in zero, so decoding stays unambiguous.
            digits[i] * 10
        };
        out.push(pair + 1);
        i += 2;
    }
    out.push(0x00);
}

pub(crate) fn decode(input: &mut &[u8]) -> Result<Decimal> {
    match take_byte(input)? {
        MARK_ZERO => Ok(Decimal::zero()),
        MARK_POS => decode_magnitude(input, 0x00, 1),
        MARK_NEG => decode_magnitude(input, 0xFF, -1),
        other => Err(Error::malformed(format!(
            "invalid decimal sign marker {other:#04x}"
        ))),
    }
}

fn decode_magnitude(input: &mut &[u8], mask: u8, sign: i8) -> Result<Decimal> {
    let exponent = decode_exponent(input, mask)?;
    let digits = decode_digits(input, mask)?;
    Ok(Decimal {
        sign,
        exponent,
        digits,
    })
}

fn decode_exponent(input: &mut &[u8], value_mask: u8) -> Result<i32> {
    let first = take_byte(input)? ^ value_mask;
    let (neg, first) = if first < 0x80 {
        (true, !first)
    } else {
        (false, first)
    };
    let mask = if neg { !value_mask } else { value_mask };
    let mut payload = |count: usize| -> Result<u32> {
        let mut acc = 0u32;
        for _ in 0..count {
            acc = (acc << 8) | (take_byte(input)? ^ mask) as u32;
        }
        Ok(acc)
    };
    let n: u64 = match first {
        0x80..=0xBF => (first & 0x3F) as u64,
        0xC0..=0xDF => ((((first & 0x1F) as u32) << 8) | payload(1)?) as u64 + BASE2 as u64,
        0xE0..=0xEF => ((((first & 0x0F) as u32) << 16) | payload(2)?) as u64 + BASE3 as u64,
        0xF0..=0xF7 => ((((first & 0x07) as u32) << 24) | payload(3)?) as u64 + BASE4 as u64,
        0xF8 => payload(4)? as u64 + BASE5 as u64,
        other => {
            return Err(Error::malformed(format!(
                "reserved exponent prefix {other:#04x}"
            )))
        }
    };
    let e = if neg { -(n as i64) - 1 } else { n as i64 };
    i32::try_from(e).map_err(|_| Error::malformed(format!("decoded exponent {e} exceeds i32")))
}

fn decode_digits(input: &mut &[u8], mask: u8) -> Result<Vec<u8>> {
    let mut pairs = Vec::new();
    loop {
        let b = take_byte(input)? ^ mask;
        if b == 0x00 {
            break;
        }
        if b > 100 {
            return Err(Error::malformed(format!("invalid digit byte {b:#04x}")));
        }
        pairs.push(b - 1);
    }
    if pairs.is_empty() {
        return Err(Error::malformed("decimal encoding has empty significand"));
    }
    let mut digits = Vec::with_capacity(pairs.len() * 2);
    let last = pairs.len() - 1;
    for (i, pair) in pairs.into_iter().enumerate() {
        digits.push(pair / 10);
        if i != last || pair % 10 != 0 {
            digits.push(pair % 10);
        }
    }
    if digits[0] == 0 || *digits.last().unwrap() == 0 {
        return Err(Error::malformed("non-canonical decimal digit sequence"));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::next_up;
    use crate::value::test_util::hex;

    fn enc(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        encode(&Decimal::parse(s).unwrap(), &mut out);
        out
    }

    macro_rules! test_decimal {
        ( $( $name:ident: $input:literal => $expect:literal, )* ) => {
        $(
            #[test]
            fn $name() {
                let value = Decimal::parse($input).unwrap();
                let mut out = Vec::new();
                encode(&value, &mut out);
                assert_eq!(hex(&out), $expect, "encode failed");
                let mut cursor = out.as_slice();
                assert_eq!(decode(&mut cursor).unwrap(), value, "decode failed");
                assert!(cursor.is_empty());
            }
        )*
        };
    }

    test_decimal! {
        zero: "0" => "80",
        one: "1" => "f0800b00",
        ten: "10" => "f0810b00",
        half: "0.5" => "f07f3300",
        neg_one: "-1" => "107ff4ff",
        one_two_three: "1.23" => "f0800d1f00",
        hundred_twenty_three: "123" => "f0820d1f00",
    }

    #[test]
    fn equal_values_encode_identically() {
        for (a, b) in [
            ("10", "1E1"),
            ("10", "10.000"),
            ("0.5", "5e-1"),
            ("-120", "-1.2e2"),
            ("0", "0.000e5"),
        ] {
            assert_eq!(enc(a), enc(b), "{a} vs {b}");
            assert_eq!(Decimal::parse(a).unwrap(), Decimal::parse(b).unwrap());
        }
    }

    #[test]
    fn byte_order_matches_numeric_order() {
        // Spans sign classes, exponent classes and digit-length boundaries.
        let ordered = [
            "-1e2147483647",
            "-1e135274560",
            "-1e8256",
            "-1e64",
            "-123",
            "-1.23",
            "-1.2",
            "-1",
            "-1e-64",
            "-1e-2147483648",
            "0",
            "1e-2147483648",
            "1e-8256",
            "1e-64",
            "0.4",
            "0.5",
            "1",
            "1.2",
            "1.23",
            "9.99",
            "10",
            "1e63",
            "1e64",
            "1e8255",
            "1e8256",
            "1e1056831",
            "1e1056832",
            "1e135274559",
            "1e135274560",
            "1e2147483647",
        ];
        let encoded: Vec<Vec<u8>> = ordered.iter().map(|s| enc(s)).collect();
        for (i, pair) in encoded.windows(2).enumerate() {
            assert!(
                pair[0] < pair[1],
                "{} !< {} ({} vs {})",
                ordered[i],
                ordered[i + 1],
                hex(&pair[0]),
                hex(&pair[1])
            );
            assert!(
                Decimal::parse(ordered[i]).unwrap() < Decimal::parse(ordered[i + 1]).unwrap()
            );
        }
    }

    #[test]
    fn next_up_is_adjacent() {
        let ordered = ["-1.2", "-1", "0", "0.5", "1", "1.2", "1.23"];
        let encoded: Vec<Vec<u8>> = ordered.iter().map(|s| enc(s)).collect();
        for pair in encoded.windows(2) {
            let successor = next_up(&pair[0]).unwrap();
            assert!(successor > pair[0]);
            assert!(successor <= pair[1]);
        }
    }

    #[test]
    fn exponent_round_trips_at_extremes() {
        for e in [i32::MIN, -135_274_561, -8_256, -64, -1, 0, 63, 64, 8_255, 8_256, i32::MAX] {
            let mut out = Vec::new();
            encode_exponent(e, &mut out);
            assert!(out.len() <= 5);
            let mut cursor = out.as_slice();
            assert_eq!(decode_exponent(&mut cursor, 0x00).unwrap(), e);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(Decimal::parse("").is_err());
        assert!(Decimal::parse("abc").is_err());
        assert!(Decimal::parse("1e").is_err());
        assert!(Decimal::parse("1.2.3").is_err());
        assert!(Decimal::parse("1e9999999999").is_err());

        // Reserved prefix 0xF9 after a positive marker.
        let mut cursor: &[u8] = &[MARK_POS, 0xF9, 0x00];
        assert!(decode(&mut cursor).is_err());
    }

    #[test]
    fn integer_conversions_are_canonical() {
        assert_eq!(Decimal::from(1200i64), Decimal::parse("1.2e3").unwrap());
        assert_eq!(Decimal::from(0i64), Decimal::zero());
        assert_eq!(Decimal::from(-7i32), Decimal::parse("-7").unwrap());
        assert_eq!(Decimal::from(i64::MIN).to_string(), "-9.223372036854775808E18");
    }
}
