//! CRC-8 used to protect scan frames.

/// Generator polynomial of the scan checksum (x^8 + x^2 + x + 1).
pub const POLYNOMIAL: u8 = 0x07;

/// Initial register value.
pub const INIT: u8 = 0x00;

static TABLE: [u8; 256] = build_table(POLYNOMIAL);

/// Builds the MSB-first lookup table for `polynomial`.
const fn build_table(polynomial: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ polynomial
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the CRC-8 (poly 0x07, MSB first, init 0x00) of `data`.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(INIT, |crc, &byte| TABLE[(crc ^ byte) as usize])
}
