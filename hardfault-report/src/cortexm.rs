//! ARM Cortex-M specific constants

const THUMB_BIT: u32 = 1;

/// Placeholder the firmware's unwinder prints when it has no symbol for a frame.
pub const UNKNOWN_SYMBOL: &str = "unknown";

pub fn clear_thumb_bit(addr: u32) -> u32 {
    addr & !THUMB_BIT
}

pub fn is_thumb_bit_set(addr: u32) -> bool {
    addr & THUMB_BIT == THUMB_BIT
}

/// Formats a 32-bit address or register value the way the reports show it, e.g. `0x08001234`.
pub fn format_word(value: u32) -> String {
    format!("{value:#010x}")
}
