//! AXI4-Lite register map of the convolution accelerator.
//!
//! Offsets are relative to the peripheral base address assigned in the
//! block design. Every register is a 32-bit aligned word; only the low byte
//! (operands) or low half-word (result) carries meaning.
//!
//! ```text
//! 0x00        CTRL     bit0 = start (W), bit1 = done (R)
//! 0x04..0x24  IN0-IN8  window taps, row-major, one int8 per word
//! 0x28..0x48  W0-W8    kernel weights, row-major, one int8 per word
//! 0x4C        OUT      int16 result, sign-extended
//! ```

use crate::kernel::TAPS;

/// Typical PL peripheral base on Zynq-7000 (first AXI GP0 slot).
pub const TYPICAL_BASE_ADDR: u64 = 0x43C0_0000;

// ── Control / status ─────────────────────────────────────────────────────────

/// Control/status register.
pub const CONTROL: usize = 0x00;

// ── Operands ─────────────────────────────────────────────────────────────────

/// First window tap register.
pub const INPUT_BASE: usize = 0x04;
/// First weight register.
pub const WEIGHT_BASE: usize = 0x28;
/// Distance between consecutive operand registers.
pub const REG_STRIDE: usize = 4;
/// Operand registers per bank (window or weights).
pub const TAP_COUNT: usize = TAPS;

// ── Result ───────────────────────────────────────────────────────────────────

/// Convolution result register.
pub const OUTPUT: usize = 0x4C;

/// Bytes spanned by the whole register file (last register included).
pub const REGISTER_SPAN: usize = OUTPUT + REG_STRIDE;

/// Number of 32-bit words in the register file.
pub const REGISTER_COUNT: usize = REGISTER_SPAN / REG_STRIDE;

/// Control register bit definitions.
///
/// Bits other than these are reserved and read back unspecified values.
pub mod control {
    /// Write 1 to launch one computation on the latched operands.
    pub const START: u32 = 1 << 0;
    /// Reads 1 once the result register holds the latest result.
    pub const DONE: u32 = 1 << 1;
}

/// Offset of window tap `index`, or `None` outside `0..9`.
#[must_use]
pub const fn input_offset(index: usize) -> Option<usize> {
    if index < TAP_COUNT {
        Some(INPUT_BASE + index * REG_STRIDE)
    } else {
        None
    }
}

/// Offset of weight `index`, or `None` outside `0..9`.
#[must_use]
pub const fn weight_offset(index: usize) -> Option<usize> {
    if index < TAP_COUNT {
        Some(WEIGHT_BASE + index * REG_STRIDE)
    } else {
        None
    }
}

/// Word written to an operand register: the byte, zero-extended.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_tap(value: i8) -> u32 {
    value as u8 as u32
}

/// Operand value held by a register word (low byte).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn decode_tap(word: u32) -> i8 {
    word as u8 as i8
}

/// Word the hardware places in `OUTPUT` for a result (sign-extended).
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_result(value: i16) -> u32 {
    value as i32 as u32
}

/// Result carried by an `OUTPUT` word (low half-word).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn decode_result(word: u32) -> i16 {
    word as u16 as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_rtl() {
        assert_eq!(CONTROL, 0x00);
        assert_eq!(input_offset(0), Some(0x04));
        assert_eq!(input_offset(8), Some(0x24));
        assert_eq!(weight_offset(0), Some(0x28));
        assert_eq!(weight_offset(8), Some(0x48));
        assert_eq!(OUTPUT, 0x4C);
        assert_eq!(REGISTER_SPAN, 0x50);
        assert_eq!(REGISTER_COUNT, 20);
    }

    #[test]
    fn out_of_range_taps_have_no_offset() {
        assert_eq!(input_offset(9), None);
        assert_eq!(weight_offset(9), None);
        assert_eq!(input_offset(usize::MAX), None);
    }

    #[test]
    fn operand_banks_do_not_overlap() {
        let last_input = input_offset(TAPS - 1).unwrap();
        assert!(last_input < WEIGHT_BASE);
        let last_weight = weight_offset(TAPS - 1).unwrap();
        assert!(last_weight < OUTPUT);
    }

    #[test]
    fn tap_encoding_is_zero_extended_byte() {
        assert_eq!(encode_tap(-1), 0x0000_00FF);
        assert_eq!(encode_tap(-128), 0x0000_0080);
        assert_eq!(encode_tap(127), 0x0000_007F);
        assert_eq!(decode_tap(0xFFFF_FF80), -128);
        assert_eq!(decode_tap(encode_tap(-77)), -77);
    }

    #[test]
    fn result_encoding_sign_extends_and_truncates() {
        assert_eq!(encode_result(-2), 0xFFFF_FFFE);
        assert_eq!(encode_result(14_089), 14_089);
        assert_eq!(decode_result(0xFFFF_FFFE), -2);
        // Upper half-word is ignored on read.
        assert_eq!(decode_result(0x1234_0009), 9);
    }
}
