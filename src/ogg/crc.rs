// Ogg page checksum
//
// CRC-32 with generator polynomial 0x04C11DB7, MSB first (not reflected),
// initial value 0 and no final XOR. This is not the zlib/IEEE CRC-32, so
// `crc32fast` and friends cannot be used here.

const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

static CRC_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ CRC_POLYNOMIAL
            } else {
                r << 1
            };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Feed `data` into a running checksum.
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[(((crc >> 24) as u8) ^ byte) as usize]
    })
}

/// Checksum of a complete byte sequence.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}
