//! VDN number codec.
//!
//! A VDN number is the packed decimal format the server uses for every
//! numeric column. The first byte holds sign and exponent (biased by 128),
//! the following bytes hold two decimal digits each, most significant
//! nibble first. The value is `0.d1 d2 ... dn * 10^exponent`.
//!
//! ```text
//!   positive:  characteristic = 192 + exponent, digits as is
//!   negative:  characteristic =  64 - exponent, nine's complement on all
//!              digits but the last, ten's complement on the last
//!   zero:      0x80, no digit bytes
//! ```

use crate::error::{Error, Result};
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Largest number of significant digits a VDN number carries.
pub const MAX_DIGITS: usize = 38;

const ZERO_EXP_VALUE: u8 = 0x80;
const MAX_EXPONENT: i64 = 63;

/// Digits of a number normalised to `0.d1..dn * 10^exponent`.
///
/// `digits` has no leading or trailing zeros; an empty vector is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Unpacked {
    negative: bool,
    digits: Vec<u8>,
    exponent: i64,
}

impl Unpacked {
    fn zero() -> Self {
        Self {
            negative: false,
            digits: Vec::new(),
            exponent: 0,
        }
    }

    fn from_decimal_text(negative: bool, text: &str, exponent: i64) -> Self {
        let mut digits: Vec<u8> = text.bytes().map(|b| b - b'0').collect();
        let mut exponent = exponent;
        let leading = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading);
        exponent -= leading as i64;
        strip_trailing_zeros(&mut digits);
        if digits.is_empty() {
            return Self::zero();
        }
        Self {
            negative,
            digits,
            exponent,
        }
    }

    /// Cut to `max_digits`, rounding half up on the first dropped digit.
    fn round_to(&mut self, max_digits: usize) {
        if self.digits.len() <= max_digits {
            return;
        }
        let round_up = self.digits[max_digits] >= 5;
        self.digits.truncate(max_digits);
        if round_up {
            let mut carried_out = true;
            for digit in self.digits.iter_mut().rev() {
                if *digit == 9 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    carried_out = false;
                    break;
                }
            }
            if carried_out {
                self.digits = vec![1];
                self.exponent += 1;
            }
        }
        strip_trailing_zeros(&mut self.digits);
    }
}

fn strip_trailing_zeros(digits: &mut Vec<u8>) {
    while digits.last() == Some(&0) {
        digits.pop();
    }
}

fn pack(number: &Unpacked, raw_for_error: &dyn Fn() -> Vec<u8>) -> Result<Vec<u8>> {
    if number.digits.is_empty() {
        return Ok(vec![ZERO_EXP_VALUE]);
    }
    if !(-MAX_EXPONENT..=MAX_EXPONENT).contains(&number.exponent) {
        return Err(Error::numeric(
            format!("exponent {} out of range", number.exponent),
            &raw_for_error(),
        ));
    }

    let characteristic = if number.negative {
        (64 - number.exponent) as u8
    } else {
        (192 + number.exponent) as u8
    };

    let mut nibbles = number.digits.clone();
    if number.negative {
        let last = nibbles.len() - 1;
        for (i, nibble) in nibbles.iter_mut().enumerate() {
            *nibble = if i == last { 10 - *nibble } else { 9 - *nibble };
        }
    }

    let mut out = Vec::with_capacity(1 + nibbles.len().div_ceil(2));
    out.push(characteristic);
    for pair in nibbles.chunks(2) {
        let high = pair[0];
        let low = pair.get(1).copied().unwrap_or(0);
        out.push((high << 4) | low);
    }
    Ok(out)
}

fn unpack(bytes: &[u8]) -> Result<Unpacked> {
    let characteristic = *bytes
        .first()
        .ok_or_else(|| Error::numeric("empty number", bytes))?;
    if characteristic == ZERO_EXP_VALUE {
        return Ok(Unpacked::zero());
    }

    let mut nibbles = Vec::with_capacity((bytes.len() - 1) * 2);
    for &b in &bytes[1..] {
        for nibble in [b >> 4, b & 0x0F] {
            if nibble > 9 {
                return Err(Error::numeric(format!("invalid digit {:X}", nibble), bytes));
            }
            nibbles.push(nibble);
        }
    }

    let negative = characteristic < ZERO_EXP_VALUE;
    let exponent = if negative {
        64 - characteristic as i64
    } else {
        characteristic as i64 - 192
    };

    if negative {
        let last = nibbles
            .iter()
            .rposition(|&n| n != 0)
            .ok_or_else(|| Error::numeric("negative number without digits", bytes))?;
        nibbles.truncate(last + 1);
        for (i, nibble) in nibbles.iter_mut().enumerate() {
            *nibble = if i == last { 10 - *nibble } else { 9 - *nibble };
        }
    }
    strip_trailing_zeros(&mut nibbles);
    if nibbles.is_empty() {
        return Ok(Unpacked::zero());
    }
    Ok(Unpacked {
        negative,
        digits: nibbles,
        exponent,
    })
}

fn digit_text(digits: &[u8]) -> String {
    digits.iter().map(|d| (b'0' + d) as char).collect()
}

/// Encode a decimal with at most [`MAX_DIGITS`] significant digits.
pub fn encode_decimal(value: &BigDecimal) -> Result<Vec<u8>> {
    encode_decimal_with_digits(value, MAX_DIGITS)
}

/// Encode a decimal, rounding half up to `max_digits` significant digits.
pub fn encode_decimal_with_digits(value: &BigDecimal, max_digits: usize) -> Result<Vec<u8>> {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    let text = unscaled.magnitude().to_string();
    let mut number = Unpacked::from_decimal_text(
        unscaled.sign() == Sign::Minus,
        &text,
        text.len() as i64 - scale,
    );
    number.round_to(max_digits.clamp(1, MAX_DIGITS));
    pack(&number, &|| value.to_string().into_bytes())
}

/// Encode a 64-bit integer.
pub fn encode_i64(value: i64) -> Result<Vec<u8>> {
    let text = value.unsigned_abs().to_string();
    let number = Unpacked::from_decimal_text(value < 0, &text, text.len() as i64);
    pack(&number, &|| value.to_be_bytes().to_vec())
}

/// Decode to an arbitrary precision decimal.
pub fn decode_to_decimal(bytes: &[u8]) -> Result<BigDecimal> {
    let number = unpack(bytes)?;
    if number.digits.is_empty() {
        return Ok(BigDecimal::from(0));
    }
    let magnitude = BigInt::from_str(&digit_text(&number.digits))
        .map_err(|_| Error::numeric("digit overflow", bytes))?;
    let unscaled = if number.negative { -magnitude } else { magnitude };
    Ok(BigDecimal::new(
        unscaled,
        number.digits.len() as i64 - number.exponent,
    ))
}

/// Decode to a 64-bit integer, truncating any fraction toward zero.
pub fn decode_to_i64(bytes: &[u8]) -> Result<i64> {
    let number = unpack(bytes)?;
    if number.exponent <= 0 {
        return Ok(0);
    }
    let mut acc: i64 = 0;
    for i in 0..number.exponent as usize {
        let digit = number.digits.get(i).copied().unwrap_or(0) as i64;
        let next = acc.checked_mul(10).and_then(|v| {
            if number.negative {
                v.checked_sub(digit)
            } else {
                v.checked_add(digit)
            }
        });
        acc = next.ok_or_else(|| Error::numeric("value does not fit into 64 bits", bytes))?;
    }
    Ok(acc)
}

/// Render a VDN number as text.
///
/// With `fixed_point` the result always carries `fraction_digits` digits
/// after the decimal point; otherwise the shortest form is used and
/// exponents outside `-3..=7` switch to `0.<digits>E<exponent>`.
pub fn decode_to_string(
    bytes: &[u8],
    fixed_point: bool,
    logical_length: usize,
    fraction_digits: usize,
) -> Result<String> {
    let mut number = unpack(bytes)?;
    if number.digits.is_empty() {
        return Ok("0".to_string());
    }
    if logical_length > 0 && number.digits.len() > logical_length {
        number.digits.truncate(logical_length);
        strip_trailing_zeros(&mut number.digits);
    }

    let sign = if number.negative { "-" } else { "" };
    let mut digits = digit_text(&number.digits);
    let exponent = number.exponent;

    if fixed_point {
        if exponent > 0 {
            let int_len = exponent as usize;
            let width = logical_length.max(int_len + fraction_digits);
            if digits.len() < width {
                digits.push_str(&"0".repeat(width - digits.len()));
            }
            let mut out = format!("{}{}", sign, &digits[..int_len]);
            if fraction_digits != 0 {
                out.push('.');
                out.push_str(&digits[int_len..int_len + fraction_digits]);
            }
            Ok(out)
        } else {
            let leading = (-exponent) as usize;
            let trailing = fraction_digits.saturating_sub(leading + digits.len());
            Ok(format!(
                "{}0.{}{}{}",
                sign,
                "0".repeat(leading),
                digits,
                "0".repeat(trailing)
            ))
        }
    } else if !(-3..=7).contains(&exponent) {
        Ok(format!("{}0.{}E{}", sign, digits, exponent))
    } else if exponent <= 0 {
        Ok(format!("{}0.{}{}", sign, "0".repeat((-exponent) as usize), digits))
    } else {
        let int_len = exponent as usize;
        if digits.len() <= int_len {
            Ok(format!("{}{}{}", sign, digits, "0".repeat(int_len - digits.len())))
        } else {
            Ok(format!("{}{}.{}", sign, &digits[..int_len], &digits[int_len..]))
        }
    }
}
