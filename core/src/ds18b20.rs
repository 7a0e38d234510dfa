//! DS18B20 scratchpad decoding
//!
//! Layout of the 9-byte scratchpad:
//!
//! | Byte | Content |
//! |------|---------|
//! | 0-1  | Temperature, little-endian two's complement, 1/16 °C |
//! | 2-3  | TH / TL alarm registers |
//! | 4    | Configuration (`0 R1 R0 1 1 1 1 1`) |
//! | 5-7  | Reserved |
//! | 8    | CRC-8 of bytes 0-7 |

use crate::error::SensorError;

/// Scratchpad length in bytes
pub const SCRATCHPAD_LEN: usize = 9;

/// Temperature register value after power-on reset (+85 °C)
const POWER_ON_RAW: i16 = 0x0550;

/// Configuration register bits that always read as one
const CONFIG_FIXED_BITS: u8 = 0x1F;

/// Measurement resolution, as set in the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 0.5 °C, 93.75 ms conversion
    Bits9,
    /// 0.25 °C, 187.5 ms conversion
    Bits10,
    /// 0.125 °C, 375 ms conversion
    Bits11,
    /// 0.0625 °C, 750 ms conversion
    Bits12,
}

impl Resolution {
    /// Decode the R1:R0 bits of the configuration register
    pub const fn from_config(config: u8) -> Self {
        match (config >> 5) & 0b11 {
            0 => Self::Bits9,
            1 => Self::Bits10,
            2 => Self::Bits11,
            _ => Self::Bits12,
        }
    }

    /// Configuration register value selecting this resolution
    pub const fn config_byte(&self) -> u8 {
        let bits = match self {
            Self::Bits9 => 0,
            Self::Bits10 => 1,
            Self::Bits11 => 2,
            Self::Bits12 => 3,
        };
        (bits << 5) | CONFIG_FIXED_BITS
    }

    /// Worst-case conversion time in microseconds
    pub const fn conversion_time_us(&self) -> u32 {
        match self {
            Self::Bits9 => 93_750,
            Self::Bits10 => 187_500,
            Self::Bits11 => 375_000,
            Self::Bits12 => 750_000,
        }
    }

    /// Mask clearing the undefined low bits of the temperature register
    const fn mask(&self) -> i16 {
        match self {
            Self::Bits9 => !0b111,
            Self::Bits10 => !0b11,
            Self::Bits11 => !0b1,
            Self::Bits12 => !0,
        }
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, LSB first)
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Decode a scratchpad into degrees Celsius
///
/// Rejects a floating bus (all ones), a stuck-low bus (configuration
/// register fixed bits clear), CRC mismatches, and the power-on value
/// +85 °C which means no conversion has completed since reset.
pub fn decode_scratchpad(scratchpad: &[u8; SCRATCHPAD_LEN]) -> Result<f32, SensorError> {
    if scratchpad.iter().all(|&b| b == 0xFF) {
        return Err(SensorError::NotPresent);
    }
    if crc8(&scratchpad[..8]) != scratchpad[8] {
        return Err(SensorError::CrcMismatch);
    }
    let config = scratchpad[4];
    if config & CONFIG_FIXED_BITS != CONFIG_FIXED_BITS {
        return Err(SensorError::BusFault);
    }

    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    if raw == POWER_ON_RAW {
        return Err(SensorError::ConversionPending);
    }

    let raw = raw & Resolution::from_config(config).mask();
    Ok(raw as f32 / 16.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratchpad(raw: u16, config: u8) -> [u8; SCRATCHPAD_LEN] {
        let [lsb, msb] = raw.to_le_bytes();
        let mut pad = [lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10, 0x00];
        pad[8] = crc8(&pad[..8]);
        pad
    }

    #[test]
    fn test_crc8_reference_vector() {
        // ROM code example from Maxim application note 27
        let rom = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(crc8(&rom), 0xA2);
        // A message followed by its CRC checks to zero
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]), 0);
    }

    #[test]
    fn test_datasheet_temperatures() {
        let cases: [(u16, f32); 9] = [
            (0x07D0, 125.0),
            (0x0191, 25.0625),
            (0x00A2, 10.125),
            (0x0008, 0.5),
            (0x0000, 0.0),
            (0xFFF8, -0.5),
            (0xFF5E, -10.125),
            (0xFE6F, -25.0625),
            (0xFC90, -55.0),
        ];
        let config = Resolution::Bits12.config_byte();
        for (raw, expected) in cases {
            assert_eq!(decode_scratchpad(&scratchpad(raw, config)), Ok(expected));
        }
    }

    #[test]
    fn test_power_on_value_rejected() {
        let pad = scratchpad(0x0550, Resolution::Bits12.config_byte());
        assert_eq!(decode_scratchpad(&pad), Err(SensorError::ConversionPending));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut pad = scratchpad(0x0191, Resolution::Bits12.config_byte());
        pad[0] ^= 0x01;
        assert_eq!(decode_scratchpad(&pad), Err(SensorError::CrcMismatch));
    }

    #[test]
    fn test_floating_bus() {
        assert_eq!(
            decode_scratchpad(&[0xFF; SCRATCHPAD_LEN]),
            Err(SensorError::NotPresent)
        );
    }

    #[test]
    fn test_stuck_low_bus() {
        // All zeros passes the CRC but cannot be a real scratchpad
        assert_eq!(
            decode_scratchpad(&[0x00; SCRATCHPAD_LEN]),
            Err(SensorError::BusFault)
        );
    }

    #[test]
    fn test_low_resolution_masks_undefined_bits() {
        let pad = scratchpad(0x0197, Resolution::Bits9.config_byte());
        assert_eq!(decode_scratchpad(&pad), Ok(25.0));
        let pad = scratchpad(0x0197, Resolution::Bits11.config_byte());
        assert_eq!(decode_scratchpad(&pad), Ok(25.375));
    }

    #[test]
    fn test_resolution_config_round_trip() {
        for res in [
            Resolution::Bits9,
            Resolution::Bits10,
            Resolution::Bits11,
            Resolution::Bits12,
        ] {
            assert_eq!(Resolution::from_config(res.config_byte()), res);
        }
        assert_eq!(Resolution::Bits12.config_byte(), 0x7F);
        assert_eq!(Resolution::Bits9.config_byte(), 0x1F);
    }
}
