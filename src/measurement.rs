//! Conversions from raw Scd41 words to physical units
//!
//! Copyright 2019 Ryan Kurte

/// Full scale of a raw 16-bit sensor word
const RAW_SCALE: f32 = 65535.0;

/// Temperature span covered by the raw temperature word, in degrees celsius
const TEMP_SPAN: f32 = 175.0;

/// Temperature at raw word zero, in degrees celsius
const TEMP_MIN: f32 = -45.0;

/// Scd41 measurement object
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// CO2 concentration in parts-per-million (PPM)
    /// Range: 400 - 5,000
    pub co2_ppm: u16,
    /// Temperature in degrees celsius
    /// Range: -10 - 60 C
    pub temperature_c: f32,
    /// Relative Humidity (%)
    /// Range: 0 - 100
    pub humidity_rh: f32,
}

impl Measurement {
    /// Build a measurement from CRC checked (co2, temperature, humidity) words
    ///
    /// Values are passed through unclamped, so humidity may fall outside 0 - 100 %
    /// at the extremes reported by the sensor.
    pub fn from_raw(words: [u16; 3]) -> Self {
        let [co2_raw, temp_raw, rh_raw] = words;

        Measurement {
            co2_ppm: co2_raw,
            temperature_c: TEMP_MIN + TEMP_SPAN * temp_raw as f32 / RAW_SCALE,
            humidity_rh: 100.0 * rh_raw as f32 / RAW_SCALE,
        }
    }
}

/// Convert a temperature offset in degrees celsius to its raw word
/// Returns None where the offset cannot be represented (negative or >= 175 C)
pub fn temperature_offset_to_raw(offset_c: f32) -> Option<u16> {
    if !(0.0..TEMP_SPAN).contains(&offset_c) {
        return None;
    }

    Some((offset_c * RAW_SCALE / TEMP_SPAN) as u16)
}

/// Convert a raw temperature offset word to degrees celsius
pub fn temperature_offset_from_raw(raw: u16) -> f32 {
    TEMP_SPAN * raw as f32 / RAW_SCALE
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_convert() {
        // Sample values from datasheet
        let m = Measurement::from_raw([0x01F4, 0x6667, 0x5EB9]);

        assert_eq!(m.co2_ppm, 500);
        assert_approx_eq!(m.temperature_c, 25.0, 0.1);
        assert_approx_eq!(m.humidity_rh, 37.0, 0.1);
    }

    #[test]
    fn test_convert_limits() {
        let m = Measurement::from_raw([0, 0, 0]);
        assert_eq!(m.co2_ppm, 0);
        assert_approx_eq!(m.temperature_c, -45.0, 0.001);
        assert_approx_eq!(m.humidity_rh, 0.0, 0.001);

        let m = Measurement::from_raw([0xFFFF, 0xFFFF, 0xFFFF]);
        assert_eq!(m.co2_ppm, 0xFFFF);
        assert_approx_eq!(m.temperature_c, 130.0, 0.001);
        assert_approx_eq!(m.humidity_rh, 100.0, 0.001);
    }

    #[test]
    fn test_temperature_offset() {
        // 5.4 C -> 0x07E6 per datasheet example
        assert_eq!(temperature_offset_to_raw(5.4), Some(0x07E6));
        assert_approx_eq!(temperature_offset_from_raw(0x0912), 6.2, 0.01);

        assert_eq!(temperature_offset_to_raw(-1.0), None);
        assert_eq!(temperature_offset_to_raw(175.0), None);
    }
}
