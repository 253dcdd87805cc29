//! One-byte range compression of [`TempC16`] values for hourly statistics.
//!
//! Piecewise linear over [0, 100] °C: 1/2 °C steps below and above the
//! mid-band, 1/8 °C steps inside it. The top code stays below the erased-cell
//! sentinel so a stored temperature is never mistaken for "unset".

use crate::{error::ConfigError, store::ERASED, types::TempC16};

const FLOOR_C16: i16 = 0;
const CEIL_C16: i16 = 100 << 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compander {
    low_c16: i16,
    high_c16: i16,
    low_code: u8,
    high_code: u8,
    ceil_code: u8,
}

impl Compander {
    pub fn new(low_c: u8, high_c: u8) -> Result<Self, ConfigError> {
        let invalid = ConfigError::InvalidCompandBand {
            low: low_c,
            high: high_c,
        };
        if low_c >= high_c || high_c > 100 {
            return Err(invalid);
        }
        let low_c16 = i16::from(low_c) << 4;
        let high_c16 = i16::from(high_c) << 4;
        let low_code = low_c16 >> 3;
        let high_code = low_code + ((high_c16 - low_c16) >> 1);
        let ceil_code = high_code + ((CEIL_C16 - high_c16) >> 3);
        if ceil_code >= i16::from(ERASED) {
            return Err(invalid);
        }
        Ok(Self {
            low_c16,
            high_c16,
            low_code: low_code as u8,
            high_code: high_code as u8,
            ceil_code: ceil_code as u8,
        })
    }

    /// Highest code `compress_temp_c16` can produce.
    pub fn ceiling_code(&self) -> u8 {
        self.ceil_code
    }

    pub fn compress_temp_c16(&self, temp: TempC16) -> u8 {
        let t = temp.raw();
        if t <= FLOOR_C16 {
            return 0;
        }
        let code = if t < self.low_c16 {
            t >> 3
        } else if t < self.high_c16 {
            i16::from(self.low_code) + ((t - self.low_c16) >> 1)
        } else if t < CEIL_C16 {
            i16::from(self.high_code) + ((t - self.high_c16) >> 3)
        } else {
            i16::from(self.ceil_code)
        };
        code as u8
    }

    /// Inverse of [`Self::compress_temp_c16`]; `None` for the unset sentinel.
    pub fn expand_temp_c16(&self, code: u8) -> Option<TempC16> {
        if code == ERASED {
            return None;
        }
        let c = i16::from(code);
        let t = if code < self.low_code {
            c << 3
        } else if code < self.high_code {
            ((c - i16::from(self.low_code)) << 1) + self.low_c16
        } else if code >= self.ceil_code {
            CEIL_C16
        } else {
            ((c - i16::from(self.high_code)) << 3) + self.high_c16
        };
        Some(TempC16(t))
    }
}

impl Default for Compander {
    fn default() -> Self {
        Self {
            low_c16: 16 << 4,
            high_c16: 24 << 4,
            low_code: 32,
            high_code: 96,
            ceil_code: 248,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_16_to_24_band() {
        assert_eq!(Compander::new(16, 24), Ok(Compander::default()));
    }

    #[test]
    fn whole_degrees_round_trip() {
        let compander = Compander::default();
        for c in 0..=100 {
            let t = TempC16::from_celsius(c);
            let code = compander.compress_temp_c16(t);
            assert_ne!(code, ERASED);
            assert_eq!(compander.expand_temp_c16(code), Some(t), "{c}C");
        }
    }

    #[test]
    fn mid_band_keeps_eighths() {
        let compander = Compander::default();
        let t = TempC16(18 * 16 + 2);
        assert_eq!(
            compander.expand_temp_c16(compander.compress_temp_c16(t)),
            Some(t)
        );
        let t = TempC16(30 * 16 + 2);
        assert_eq!(
            compander.expand_temp_c16(compander.compress_temp_c16(t)),
            Some(TempC16(30 * 16))
        );
    }

    #[test]
    fn out_of_range_clamps() {
        let compander = Compander::default();
        assert_eq!(compander.compress_temp_c16(TempC16(-200)), 0);
        assert_eq!(
            compander.compress_temp_c16(TempC16(2000)),
            compander.ceiling_code()
        );
        assert_eq!(
            compander.expand_temp_c16(0xfe),
            Some(TempC16::from_celsius(100))
        );
    }

    #[test]
    fn sentinel_expands_to_unset() {
        assert_eq!(Compander::default().expand_temp_c16(ERASED), None);
    }

    #[test]
    fn too_wide_band_is_rejected() {
        assert!(Compander::new(14, 23).is_ok());
        assert!(Compander::new(14, 24).is_err());
        assert!(Compander::new(20, 20).is_err());
    }
}
