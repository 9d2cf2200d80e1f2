// src/timeout.rs

//! Worst-case response timeouts.

use crate::config::CommParams;
use crate::types::{Function, ModbusType};

/// Fixed overhead of the state machine: two 8 ms slots.
pub const STATE_MACHINE_OVERHEAD_US: u32 = 2 * 8000;

/// Request plus response length in bytes for one transaction.
///
/// `count` is the number of coils for bit functions and the number of
/// `mtype` values for register functions.
pub fn frame_bytes(function: Function, count: u32, mtype: ModbusType) -> u32 {
    let coil_bytes = count.div_ceil(8);
    let data_bytes = count.saturating_mul(mtype.byte_size() as u32);
    match function {
        // Request 8, response 5 + data
        Function::ReadCoils | Function::ReadInputs => 8 + 5 + coil_bytes,
        Function::ReadRegisters | Function::ReadInputRegs => 8 + 5 + data_bytes,
        // Request 9 + data, response 8
        Function::WriteCoils => 9 + coil_bytes + 8,
        Function::WriteRegisters => 9 + data_bytes + 8,
        // Echoed 8-byte request
        Function::WriteCoil | Function::WriteRegister => 16,
    }
}

/// Estimates the timeout in microseconds.
///
/// The byte count is converted to wire bits, stretched by 2.5 for the
/// largest legal inter-character gap, doubled for margin and padded with
/// the state machine overhead.
pub fn estimate_timeout(
    function: Function,
    count: u32,
    mtype: ModbusType,
    params: &CommParams,
) -> u32 {
    let bytes = u64::from(frame_bytes(function, count, mtype));
    let bits = bytes * u64::from(params.character_bits());
    // 2.5 * 2 = 5
    let micros = (bits * 5 * 1_000_000).div_ceil(u64::from(params.baudrate.max(1)));
    u32::try_from(micros)
        .unwrap_or(u32::MAX)
        .saturating_add(STATE_MACHINE_OVERHEAD_US)
}

/// Converts a duration in bit times into microseconds, rounding up.
pub fn bits_to_micros(bits: u32, baudrate: u32) -> u32 {
    let micros = (u64::from(bits) * 1_000_000).div_ceil(u64::from(baudrate.max(1)));
    u32::try_from(micros).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parity;

    #[test]
    fn test_frame_bytes() {
        assert_eq!(frame_bytes(Function::ReadCoils, 9, ModbusType::U_AB), 15);
        assert_eq!(frame_bytes(Function::ReadRegisters, 2, ModbusType::U_AB), 17);
        assert_eq!(frame_bytes(Function::WriteCoils, 16, ModbusType::U_AB), 19);
        assert_eq!(frame_bytes(Function::WriteRegisters, 3, ModbusType::U_AB), 23);
        assert_eq!(frame_bytes(Function::WriteRegister, 1, ModbusType::U_AB), 16);
    }

    #[test]
    fn test_estimate_known_value() {
        // 17 bytes * 11 bits * 5 = 935 bits at 9600 baud -> 97396 us
        let params = CommParams::default();
        assert_eq!(
            estimate_timeout(Function::ReadRegisters, 2, ModbusType::U_AB, &params),
            97_396 + STATE_MACHINE_OVERHEAD_US
        );
    }

    #[test]
    fn test_monotonic_in_count() {
        let params = CommParams::default();
        for function in Function::ALL {
            let mut last = 0;
            for count in 1..=function.max_count() {
                let t = estimate_timeout(function, u32::from(count), ModbusType::U_AB, &params);
                assert!(t >= last, "{} count {}", function, count);
                last = t;
            }
        }
    }

    #[test]
    fn test_faster_baud_shorter_timeout() {
        let slow = CommParams::default();
        let fast = CommParams {
            baudrate: 115_200,
            ..slow
        };
        let a = estimate_timeout(Function::ReadInputRegs, 40, ModbusType::U_AB, &slow);
        let b = estimate_timeout(Function::ReadInputRegs, 40, ModbusType::U_AB, &fast);
        assert!(b < a);
    }

    #[test]
    fn test_character_bits_affect_estimate() {
        let even = CommParams::default();
        let none = CommParams {
            parity: Parity::None,
            ..even
        };
        let two_stop = CommParams {
            stopbits: 2,
            ..even
        };
        let f = Function::WriteRegisters;
        let t_none = estimate_timeout(f, 10, ModbusType::U_AB, &none);
        let t_even = estimate_timeout(f, 10, ModbusType::U_AB, &even);
        let t_two = estimate_timeout(f, 10, ModbusType::U_AB, &two_stop);
        assert!(t_none < t_even && t_even < t_two);
    }

    #[test]
    fn test_bits_to_micros_rounds_up() {
        assert_eq!(bits_to_micros(96, 9600), 10_000);
        assert_eq!(bits_to_micros(1, 9600), 105);
        assert_eq!(bits_to_micros(0, 9600), 0);
    }
}
