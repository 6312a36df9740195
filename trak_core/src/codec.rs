//! Conversions between 16-bit register words and engineering values.

use crate::error::{ControlError, Result};

/// Interpret two consecutive registers as a little-endian word-order f32:
/// `reg_low` holds the low 16 bits, `reg_high` the high 16 bits.
#[inline]
pub fn decode_f32_le(reg_low: u16, reg_high: u16) -> f32 {
    f32::from_bits(u32::from(reg_low) | (u32::from(reg_high) << 16))
}

/// Inverse of [`decode_f32_le`]. Returns `(reg_low, reg_high)`.
#[inline]
pub fn encode_f32_le(value: f32) -> (u16, u16) {
    let bits = value.to_bits();
    ((bits & 0xFFFF) as u16, (bits >> 16) as u16)
}

/// Reinterpret a register word as a signed 16-bit value.
#[inline]
pub fn decode_i16(word: u16) -> i16 {
    word as i16
}

/// Round `value` to the nearest integer (ties away from zero) and encode it as
/// a two's-complement register word. Non-finite values and values outside
/// -32768..=32767 after rounding are rejected.
pub fn encode_i16(value: f64) -> Result<u16> {
    encode_i16_field("value", value)
}

pub(crate) fn encode_i16_field(field: &'static str, value: f64) -> Result<u16> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < f64::from(i16::MIN) || rounded > f64::from(i16::MAX) {
        return Err(ControlError::OutOfRange { field, value });
    }
    Ok((rounded as i16) as u16)
}
