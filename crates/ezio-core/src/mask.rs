//! Output bit-window tables.
//!
//! Output pins are encoded in a contiguous window of the 32-bit vector whose
//! position depends on the board width: boards with up to 8 outputs map
//! logical pin i to bit 8+i, 16-output boards map pin i to bit 16+i. Input
//! pins use bit i directly and need no table.

/// Window for boards with at most 8 output pins: pin i -> bit 8+i.
pub const OUTPUT_PIN_MASKS_8: [u32; 8] = [
    0x100, // Pin 0
    0x200, // Pin 1
    0x400, // Pin 2
    0x800, // Pin 3
    0x1000, // Pin 4
    0x2000, // Pin 5
    0x4000, // Pin 6
    0x8000, // Pin 7
];

/// Window for 16-output boards: pin i -> bit 16+i.
pub const OUTPUT_PIN_MASKS_16: [u32; 16] = [
    0x1_0000,    // Pin 0
    0x2_0000,    // Pin 1
    0x4_0000,    // Pin 2
    0x8_0000,    // Pin 3
    0x10_0000,   // Pin 4
    0x20_0000,   // Pin 5
    0x40_0000,   // Pin 6
    0x80_0000,   // Pin 7
    0x100_0000,  // Pin 8
    0x200_0000,  // Pin 9
    0x400_0000,  // Pin 10
    0x800_0000,  // Pin 11
    0x1000_0000, // Pin 12
    0x2000_0000, // Pin 13
    0x4000_0000, // Pin 14
    0x8000_0000, // Pin 15
];

/// Select the bit-window table for a declared output width. Chosen once per
/// device at construction.
pub fn output_masks(output_count: usize) -> &'static [u32] {
    if output_count <= 8 {
        &OUTPUT_PIN_MASKS_8
    } else {
        &OUTPUT_PIN_MASKS_16
    }
}

/// Input pin i reads bit i of the input vector.
pub fn input_mask(pin: usize) -> u32 {
    1u32 << pin
}
