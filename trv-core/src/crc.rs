// CRC-7, polynomial 0x37 (0x5B Koopman), MSB first. Bit 7 of a result is always clear.

const POLY: u8 = 0x37;

pub fn crc7_5b_update(crc: u8, datum: u8) -> u8 {
    let mut crc = crc;
    let mut mask = 0x80u8;
    while mask != 0 {
        let mut bit = crc & 0x40 != 0;
        if datum & mask != 0 {
            bit = !bit;
        }
        crc <<= 1;
        if bit {
            crc ^= POLY;
        }
        mask >>= 1;
    }
    crc & 0x7f
}

pub fn crc7_5b(seed: u8, bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(seed, |crc, &datum| crc7_5b_update(crc, datum))
}
