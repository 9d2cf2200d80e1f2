// src/encode.rs

//! Encoding of literal `<data>` values into wire bytes.

use crate::types::{ModbusType, ValueKind};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

const F16_MAX: f64 = 65504.0;
const F32_LIMIT: f64 = 3.4e38;
const F64_LIMIT: f64 = 1.7e308;

/// Encodes an integer as `mtype`, range-checked and in its byte order.
pub fn encode_integer(value: i128, mtype: ModbusType) -> Result<Vec<u8>, String> {
    let signed = match mtype.kind() {
        ValueKind::Unsigned => false,
        ValueKind::Signed => true,
        ValueKind::Float => return Err(format!("Type {} is not an integer type", mtype)),
    };
    let out_of_range = |min: i128, max: i128| {
        format!(
            "Value '{}' outside valid range [{},{}] for type {}",
            value, min, max, mtype
        )
    };
    let order = mtype.order();

    let bytes = match (mtype.byte_size(), signed) {
        (2, false) => u16::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(0, u16::MAX.into()))?,
        (2, true) => i16::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(i16::MIN.into(), i16::MAX.into()))?,
        (4, false) => u32::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(0, u32::MAX.into()))?,
        (4, true) => i32::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(i32::MIN.into(), i32::MAX.into()))?,
        (_, false) => u64::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(0, u64::MAX.into()))?,
        (_, true) => i64::try_from(value)
            .map(|v| order.mangle(v.to_be_bytes()).to_vec())
            .map_err(|_| out_of_range(i64::MIN.into(), i64::MAX.into()))?,
    };
    Ok(bytes)
}

/// Encodes a float as the IEEE-754 format of `mtype`'s width, range-checked
/// and in its byte order.
pub fn encode_float(value: f64, mtype: ModbusType) -> Result<Vec<u8>, String> {
    if !mtype.is_float() {
        return Err(format!("Type {} is not a float type", mtype));
    }
    if value.is_nan() {
        return Err(format!("Value '{}' is not a number", value));
    }
    let order = mtype.order();
    match mtype.byte_size() {
        2 => {
            if !(-F16_MAX..=F16_MAX).contains(&value) {
                return Err(format!(
                    "Value '{}' outside valid range [-{},{}] for type {}",
                    value, F16_MAX, F16_MAX, mtype
                ));
            }
            Ok(order.mangle(f16_bits(value).to_be_bytes()).to_vec())
        }
        4 => {
            if value <= -F32_LIMIT || value >= F32_LIMIT {
                return Err(format!(
                    "Value '{}' outside valid range (-{:e},{:e}) for type {}",
                    value, F32_LIMIT, F32_LIMIT, mtype
                ));
            }
            Ok(order.mangle((value as f32).to_be_bytes()).to_vec())
        }
        _ => {
            if value <= -F64_LIMIT || value >= F64_LIMIT {
                return Err(format!(
                    "Value '{}' outside valid range (-{:e},{:e}) for type {}",
                    value, F64_LIMIT, F64_LIMIT, mtype
                ));
            }
            Ok(order.mangle(value.to_be_bytes()).to_vec())
        }
    }
}

/// Converts to IEEE-754 binary16 bits, rounding to nearest even.
///
/// Overflow yields infinity, underflow a signed zero.
pub fn f16_bits(value: f64) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 48) & 0x8000) as u16;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let man = bits & 0x000f_ffff_ffff_ffff;

    if exp == 0x7ff {
        let nan = if man != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let half_exp = exp - 1023 + 15;
    if half_exp >= 0x1f {
        return sign | 0x7c00;
    }

    let (mantissa, shift, base) = if half_exp <= 0 {
        if half_exp < -10 {
            return sign;
        }
        // Subnormal: shift the full 53-bit significand.
        (man | (1u64 << 52), (1051 - exp) as u32, 0u32)
    } else {
        (man, 42u32, (half_exp as u32) << 10)
    };

    let kept = (mantissa >> shift) as u32;
    let rest = mantissa & ((1u64 << shift) - 1);
    let halfway = 1u64 << (shift - 1);
    let mut out = u32::from(sign) | base | kept;
    if rest > halfway || (rest == halfway && kept & 1 == 1) {
        // Carry into the exponent is correct, up to infinity.
        out += 1;
    }
    out as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ByteOrder;

    fn mt(name: &str) -> ModbusType {
        ModbusType::from_name(name).unwrap()
    }

    #[test]
    fn test_f16_known_values() {
        assert_eq!(f16_bits(1.5), 0x3e00);
        assert_eq!(f16_bits(1.0), 0x3c00);
        assert_eq!(f16_bits(-2.0), 0xc000);
        assert_eq!(f16_bits(0.0), 0x0000);
        assert_eq!(f16_bits(-0.0), 0x8000);
        assert_eq!(f16_bits(65504.0), 0x7bff);
        assert_eq!(f16_bits(1e6), 0x7c00);
        assert_eq!(f16_bits(0.1), 0x2e66);
        assert_eq!(f16_bits(5.960464477539063e-8), 0x0001);
        assert_eq!(f16_bits(6.097555160522461e-5), 0x03ff);
        assert_eq!(f16_bits(1e-10), 0x0000);
    }

    #[test]
    fn test_f16_rounds_half_even() {
        // 2049 lies halfway between 2048 and 2050; ties to the even mantissa.
        assert_eq!(f16_bits(2049.0), 0x6800);
        assert_eq!(f16_bits(2051.0), 0x6802);
    }

    #[test]
    fn test_float_scenario() {
        assert_eq!(encode_float(1.5, ModbusType::F_AB).unwrap(), [0x3e, 0x00]);
        let swapped = ModbusType::new(ValueKind::Float, ByteOrder::Ba);
        assert_eq!(encode_float(1.5, swapped).unwrap(), [0x00, 0x3e]);
    }

    #[test]
    fn test_float_ranges() {
        assert!(encode_float(65504.0, ModbusType::F_AB).is_ok());
        assert!(encode_float(65505.0, ModbusType::F_AB).is_err());
        assert!(encode_float(3.4e38, mt("F_ABCD")).is_err());
        assert_eq!(
            encode_float(1.0, mt("F_CDAB")).unwrap(),
            [0x00, 0x00, 0x3f, 0x80]
        );
        assert_eq!(
            encode_float(-1.0, mt("F_ABCDEFGH")).unwrap(),
            [0xbf, 0xf0, 0, 0, 0, 0, 0, 0]
        );
        assert!(encode_float(f64::NAN, ModbusType::F_AB).is_err());
        assert!(encode_float(1.0, ModbusType::U_AB).is_err());
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(encode_integer(0xff00, ModbusType::U_AB).unwrap(), [0xff, 0x00]);
        assert!(encode_integer(65536, ModbusType::U_AB).is_err());
        assert!(encode_integer(-1, ModbusType::U_AB).is_err());
        assert_eq!(encode_integer(-1, ModbusType::S_AB).unwrap(), [0xff, 0xff]);
        assert!(encode_integer(32768, ModbusType::S_AB).is_err());
        assert_eq!(
            encode_integer(0x1122_3344, mt("U_CDAB")).unwrap(),
            [0x33, 0x44, 0x11, 0x22]
        );
        assert_eq!(
            encode_integer(-2, mt("S_DCBA")).unwrap(),
            [0xfe, 0xff, 0xff, 0xff]
        );
        assert!(encode_integer(i128::from(u64::MAX), mt("U_ABCDEFGH")).is_ok());
        assert!(encode_integer(-1, mt("U_ABCDEFGH")).is_err());
        assert!(encode_integer(i128::from(i64::MIN), mt("S_HGFEDCBA")).is_ok());
        assert!(encode_integer(1, ModbusType::F_AB).is_err());
    }
}
