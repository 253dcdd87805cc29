//! Compact stats frames exchanged with the boiler hub.
//!
//! Minimal trailer (3 bytes):
//! ```text
//! 010P TTTT | 0TTT TTTT | 0CCC CCCC
//! ```
//! `P` low power, `T` temperature + 20 °C in 1/16 °C (11 bits), `C` CRC-7
//! of the first two bytes seeded with zero.
//!
//! Full-core frame (4..=9 bytes):
//! ```text
//! 0111 0IRS | [ID0 ID1] | [trailer body, 2 bytes] | 0110 0LOO | [light] | CRC | 0xFF
//! ```
//! `I` ID present, `R` ID bytes had their top bit set, `S` secure (never
//! accepted here), `L` light byte present, `OO` occupancy. The trailer body is
//! recognised by its `010` top bits. No byte before the terminator is `0xFF`.

use serde::{Deserialize, Serialize};

use crate::{
    config::TxSecurityLevel,
    crc::crc7_5b,
    error::FrameError,
    types::{Occupancy, TempC16},
};

pub const FRAME_TERMINATOR: u8 = 0xff;
pub const MINIMAL_TRAILER_BYTES: usize = 3;
/// Largest full-core frame, terminator included.
pub const FULL_STATS_MAX_BYTES: usize = 9;

const TRAILER_HEADER_MASK: u8 = 0xe0;
const TRAILER_HEADER_MSBS: u8 = 0x40;
const TRAILER_POWER_LOW: u8 = 0x10;
const TRAILER_TEMP_BIAS_C16: i16 = 20 << 4;
const TRAILER_BIASED_MAX: i16 = 0x7ff;
const TRAILER_CRC_SEED: u8 = 0;

const HEADER_MASK: u8 = 0xf8;
const HEADER_MSBS: u8 = 0x70;
const HEADER_ID_PRESENT: u8 = 0x04;
const HEADER_ID_HIGH: u8 = 0x02;
const HEADER_SECURE: u8 = 0x01;

const FLAGS_MASK: u8 = 0xf8;
const FLAGS_MSBS: u8 = 0x60;
const FLAGS_LIGHT_PRESENT: u8 = 0x04;
const FLAGS_OCCUPANCY: u8 = 0x03;

const FULL_CRC_SEED: u8 = 0x7f;

/// Lowest and highest temperatures the trailer can carry.
pub const TRAILER_MIN_TEMP: TempC16 = TempC16(-TRAILER_TEMP_BIAS_C16);
pub const TRAILER_MAX_TEMP: TempC16 = TempC16(TRAILER_BIASED_MAX - TRAILER_TEMP_BIAS_C16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempAndPower {
    pub temp: TempC16,
    pub power_low: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyCode {
    #[default]
    Unreported,
    Vacant,
    Possible,
    Likely,
}

impl OccupancyCode {
    pub fn bits(self) -> u8 {
        match self {
            Self::Unreported => 0,
            Self::Vacant => 1,
            Self::Possible => 2,
            Self::Likely => 3,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & FLAGS_OCCUPANCY {
            0 => Self::Unreported,
            1 => Self::Vacant,
            2 => Self::Possible,
            _ => Self::Likely,
        }
    }
}

impl From<Occupancy> for OccupancyCode {
    fn from(occupancy: Occupancy) -> Self {
        match occupancy {
            Occupancy::RecentlyOccupied => Self::Likely,
            Occupancy::LikelyOccupied => Self::Possible,
            Occupancy::Vacant | Occupancy::LongVacant => Self::Vacant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsFrame {
    pub id: Option<[u8; 2]>,
    pub temp_and_power: Option<TempAndPower>,
    /// Never 0x00 or 0xFF.
    pub ambient_light: Option<u8>,
    pub occupancy: OccupancyCode,
}

/// Two-byte temperature/power body, temperature clamped to what fits.
pub fn trailer_body(payload: TempAndPower) -> [u8; 2] {
    let biased = (payload.temp.raw().saturating_add(TRAILER_TEMP_BIAS_C16))
        .clamp(0, TRAILER_BIASED_MAX) as u16;
    let power = if payload.power_low {
        TRAILER_POWER_LOW
    } else {
        0
    };
    [
        TRAILER_HEADER_MSBS | power | (biased & 0x0f) as u8,
        ((biased >> 4) & 0x7f) as u8,
    ]
}

fn parse_trailer_body(b0: u8, b1: u8) -> Result<TempAndPower, FrameError> {
    if b0 & TRAILER_HEADER_MASK != TRAILER_HEADER_MSBS || b1 & 0x80 != 0 {
        return Err(FrameError::BadTrailer);
    }
    let biased = (i16::from(b1) << 4) | i16::from(b0 & 0x0f);
    Ok(TempAndPower {
        temp: TempC16(biased - TRAILER_TEMP_BIAS_C16),
        power_low: b0 & TRAILER_POWER_LOW != 0,
    })
}

pub fn encode_trailing_minimal(payload: TempAndPower) -> [u8; MINIMAL_TRAILER_BYTES] {
    let [b0, b1] = trailer_body(payload);
    [b0, b1, crc7_5b(TRAILER_CRC_SEED, &[b0, b1])]
}

pub fn verify_trailing_minimal(bytes: &[u8]) -> bool {
    decode_trailing_minimal(bytes).is_ok()
}

pub fn decode_trailing_minimal(bytes: &[u8]) -> Result<TempAndPower, FrameError> {
    let &[b0, b1, crc, ..] = bytes else {
        return Err(FrameError::Truncated);
    };
    let payload = parse_trailer_body(b0, b1)?;
    if crc != crc7_5b(TRAILER_CRC_SEED, &[b0, b1]) {
        return Err(FrameError::BadCrc);
    }
    Ok(payload)
}

/// Writes `frame` into `buf` and returns the offset of the terminator.
///
/// `buf` must hold [`FULL_STATS_MAX_BYTES`] whatever the frame contents.
/// Occupancy is sent only when `secure_channel` or `level` allows it.
pub fn encode_stats_frame(
    frame: &StatsFrame,
    buf: &mut [u8],
    level: TxSecurityLevel,
    secure_channel: bool,
) -> Result<usize, FrameError> {
    if buf.len() < FULL_STATS_MAX_BYTES {
        return Err(FrameError::BufferTooSmall {
            needed: FULL_STATS_MAX_BYTES,
            available: buf.len(),
        });
    }

    let mut header = HEADER_MSBS;
    if let Some([id0, id1]) = frame.id {
        if id0 == 0xff || id1 == 0xff || (id0 ^ id1) & 0x80 != 0 {
            return Err(FrameError::BadId);
        }
        header |= HEADER_ID_PRESENT;
        if id0 & 0x80 != 0 {
            header |= HEADER_ID_HIGH;
        }
    }
    if matches!(frame.ambient_light, Some(0x00 | 0xff)) {
        return Err(FrameError::BadAmbientLight);
    }

    let mut len = 0;
    let mut push = |byte: u8| {
        buf[len] = byte;
        len += 1;
    };

    push(header);
    if let Some([id0, id1]) = frame.id {
        push(id0 & 0x7f);
        push(id1 & 0x7f);
    }
    if let Some(payload) = frame.temp_and_power {
        let [b0, b1] = trailer_body(payload);
        push(b0);
        push(b1);
    }

    let occupancy = if level.permits_occupancy(secure_channel) {
        frame.occupancy
    } else {
        OccupancyCode::Unreported
    };
    let mut flags = FLAGS_MSBS | occupancy.bits();
    if frame.ambient_light.is_some() {
        flags |= FLAGS_LIGHT_PRESENT;
    }
    push(flags);
    if let Some(light) = frame.ambient_light {
        push(light);
    }

    let crc = crc7_5b(FULL_CRC_SEED, &buf[..len]);
    buf[len] = crc;
    buf[len + 1] = FRAME_TERMINATOR;
    Ok(len + 1)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Result<u8, FrameError> {
        self.buf.get(self.pos).copied().ok_or(FrameError::Truncated)
    }

    fn next(&mut self) -> Result<u8, FrameError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }
}

/// Decodes a full-core frame at the start of `buf`.
///
/// Returns the frame and the offset of its terminator.
pub fn decode_stats_frame(buf: &[u8]) -> Result<(StatsFrame, usize), FrameError> {
    let mut cursor = Cursor { buf, pos: 0 };

    let header = cursor.next()?;
    if header & HEADER_MASK != HEADER_MSBS {
        return Err(FrameError::BadHeader);
    }
    if header & HEADER_SECURE != 0 {
        return Err(FrameError::SecureUnsupported);
    }

    let mut frame = StatsFrame::default();
    if header & HEADER_ID_PRESENT != 0 {
        let id0 = cursor.next()?;
        let id1 = cursor.next()?;
        if (id0 | id1) & 0x80 != 0 {
            return Err(FrameError::BadId);
        }
        let high = if header & HEADER_ID_HIGH != 0 { 0x80 } else { 0 };
        let id = [id0 | high, id1 | high];
        if id.contains(&0xff) {
            return Err(FrameError::BadId);
        }
        frame.id = Some(id);
    } else if header & HEADER_ID_HIGH != 0 {
        return Err(FrameError::BadHeader);
    }

    if cursor.peek()? & TRAILER_HEADER_MASK == TRAILER_HEADER_MSBS {
        let b0 = cursor.next()?;
        let b1 = cursor.next()?;
        frame.temp_and_power = Some(parse_trailer_body(b0, b1)?);
    }

    let flags = cursor.next()?;
    if flags & FLAGS_MASK != FLAGS_MSBS {
        return Err(FrameError::BadFlags);
    }
    frame.occupancy = OccupancyCode::from_bits(flags);
    if flags & FLAGS_LIGHT_PRESENT != 0 {
        let light = cursor.next()?;
        if light == 0x00 || light == 0xff {
            return Err(FrameError::BadAmbientLight);
        }
        frame.ambient_light = Some(light);
    }

    let body_len = cursor.pos;
    let crc = cursor.next()?;
    if crc & 0x80 != 0 || crc != crc7_5b(FULL_CRC_SEED, &buf[..body_len]) {
        return Err(FrameError::BadCrc);
    }
    if cursor.next()? != FRAME_TERMINATOR {
        return Err(FrameError::MissingTerminator);
    }

    Ok((frame, cursor.pos - 1))
}
