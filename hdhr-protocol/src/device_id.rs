//! Device identifier checks
//!
//! Device ids are 32-bit values whose eight hex digits carry their own
//! checksum: every other digit is passed through a fixed substitution
//! table and the XOR of all eight results must be zero. The scheme
//! catches any single mistyped digit and any swap of two different
//! adjacent digits. Swapping two equal digits leaves the id unchanged.

/// Substitution applied to the high nibble of each byte
const NIBBLE_TABLE: [u8; 16] = [
    0xA, 0x5, 0xF, 0x6, 0x7, 0xC, 0x1, 0xB, 0x9, 0x2, 0x8, 0xD, 0x4, 0x3, 0xE, 0x0,
];

/// XOR of the eight (partly substituted) nibbles of `device_id`
pub fn device_id_checksum(device_id: u32) -> u8 {
    let mut checksum = 0u8;
    for byte in 0..4 {
        let shift = 24 - byte * 8;
        let high = ((device_id >> (shift + 4)) & 0x0F) as usize;
        let low = ((device_id >> shift) & 0x0F) as u8;
        checksum ^= NIBBLE_TABLE[high];
        checksum ^= low;
    }
    checksum
}

/// True if `device_id` carries a valid self-check
pub fn validate_device_id(device_id: u32) -> bool {
    device_id_checksum(device_id) == 0
}

/// Tuner count for older devices that do not report one
///
/// Keyed on the top twelve bits of the device id.
pub fn default_tuner_count(device_id: u32) -> Option<u8> {
    match device_id >> 20 {
        0x102 => Some(1),
        0x100 | 0x101 | 0x121 => Some(2),
        _ => None,
    }
}
