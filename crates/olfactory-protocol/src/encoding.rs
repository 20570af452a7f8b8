//! Numeric encodings: emission duration and packed orientation.

use olfactory_core::constants::{
    DURATION_WIRE_SCALE, MAX_DURATION_SECS, MAX_YAW_DEGREES, MIN_DURATION_SECS, MIN_YAW_DEGREES,
    PITCH_WRAP_DEGREES,
};
use olfactory_core::{Error, Result};

/// Clamp a duration in seconds into `[0, 10]`.
///
/// NaN is treated as zero.
#[must_use]
pub fn clamp_duration(secs: f32) -> f32 {
    if secs.is_nan() {
        return MIN_DURATION_SECS;
    }
    secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

/// Encode a duration in seconds as the firmware's release amount.
///
/// The duration is clamped into `[0, 10]`, scaled by 10, and truncated.
///
/// ```
/// use olfactory_protocol::encode_duration;
///
/// assert_eq!(encode_duration(1.0), 10);
/// assert_eq!(encode_duration(0.25), 2);
/// assert_eq!(encode_duration(15.0), 100);
/// assert_eq!(encode_duration(-1.0), 0);
/// ```
#[must_use]
pub fn encode_duration(secs: f32) -> u8 {
    (clamp_duration(secs) * DURATION_WIRE_SCALE) as u8
}

/// Emitter orientation as sent to the device.
///
/// Yaw is a signed angle in `[-90, 90]`; pitch is wrapped into `[0, 360)`.
/// Both are truncated to whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orientation {
    yaw: i16,
    pitch: u16,
}

impl Orientation {
    /// Validate and normalize an orientation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if yaw is outside `[-90, 90]` or
    /// either angle is not finite.
    ///
    /// ```
    /// use olfactory_protocol::Orientation;
    ///
    /// let a = Orientation::new(10.0, 400.0).unwrap();
    /// let b = Orientation::new(10.0, 40.0).unwrap();
    /// assert_eq!(a, b);
    ///
    /// assert!(Orientation::new(91.0, 0.0).is_err());
    /// ```
    pub fn new(yaw: f32, pitch: f32) -> Result<Self> {
        if !yaw.is_finite() || !(MIN_YAW_DEGREES..=MAX_YAW_DEGREES).contains(&yaw) {
            return Err(Error::invalid_argument(format!(
                "Yaw must be {MIN_YAW_DEGREES}-{MAX_YAW_DEGREES} degrees, got {yaw}"
            )));
        }
        if !pitch.is_finite() {
            return Err(Error::invalid_argument(format!(
                "Pitch must be finite, got {pitch}"
            )));
        }

        let wrap = PITCH_WRAP_DEGREES as u16;
        // rem_euclid may round up to exactly 360.0 for tiny negative inputs
        let pitch = (pitch.rem_euclid(PITCH_WRAP_DEGREES).trunc() as u16) % wrap;

        Ok(Self {
            yaw: yaw.trunc() as i16,
            pitch,
        })
    }

    #[must_use]
    pub fn yaw(&self) -> i16 {
        self.yaw
    }

    #[must_use]
    pub fn pitch(&self) -> u16 {
        self.pitch
    }

    /// Pack into the 32-bit wire word: yaw in the high half, pitch in the
    /// low half.
    ///
    /// ```
    /// use olfactory_protocol::Orientation;
    ///
    /// let word = Orientation::new(-1.0, 90.0).unwrap().to_word();
    /// assert_eq!(word, 0xFFFF_005A);
    /// ```
    #[must_use]
    pub fn to_word(&self) -> u32 {
        ((self.yaw as u16 as u32) << 16) | self.pitch as u32
    }

    /// Big-endian byte form of [`to_word`](Self::to_word).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.to_word().to_be_bytes()
    }

    /// Unpack a wire word.
    ///
    /// # Errors
    /// Returns `Error::MalformedMessage` if the halves are out of range.
    pub fn from_word(word: u32) -> Result<Self> {
        let yaw = (word >> 16) as u16 as i16;
        let pitch = (word & 0xFFFF) as u16;

        if !(MIN_YAW_DEGREES as i16..=MAX_YAW_DEGREES as i16).contains(&yaw)
            || pitch >= PITCH_WRAP_DEGREES as u16
        {
            return Err(Error::malformed(format!(
                "Orientation word out of range: {word:#010x}"
            )));
        }
        Ok(Self { yaw, pitch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0)]
    #[case(0.5, 5)]
    #[case(1.0, 10)]
    #[case(9.99, 99)]
    #[case(10.0, 100)]
    #[case(15.0, 100)]
    #[case(-2.0, 0)]
    #[case(f32::NAN, 0)]
    #[case(f32::INFINITY, 100)]
    fn test_encode_duration(#[case] secs: f32, #[case] expected: u8) {
        assert_eq!(encode_duration(secs), expected);
    }

    #[rstest]
    #[case(0.0, 0.0, 0, 0)]
    #[case(90.0, 359.9, 90, 359)]
    #[case(-90.0, 360.0, -90, 0)]
    #[case(45.7, 400.0, 45, 40)]
    #[case(-45.7, -30.0, -45, 330)]
    #[case(0.0, 720.0, 0, 0)]
    fn test_orientation_normalization(
        #[case] yaw: f32,
        #[case] pitch: f32,
        #[case] expected_yaw: i16,
        #[case] expected_pitch: u16,
    ) {
        let orientation = Orientation::new(yaw, pitch).unwrap();
        assert_eq!(orientation.yaw(), expected_yaw);
        assert_eq!(orientation.pitch(), expected_pitch);
    }

    #[rstest]
    #[case(90.5, 0.0)]
    #[case(-91.0, 0.0)]
    #[case(f32::NAN, 0.0)]
    #[case(0.0, f32::NAN)]
    #[case(0.0, f32::INFINITY)]
    fn test_orientation_invalid(#[case] yaw: f32, #[case] pitch: f32) {
        assert!(matches!(
            Orientation::new(yaw, pitch),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_orientation_word_layout() {
        let orientation = Orientation::new(30.0, 40.0).unwrap();
        assert_eq!(orientation.to_word(), (30 << 16) | 40);
        assert_eq!(orientation.to_bytes(), [0x00, 0x1E, 0x00, 0x28]);

        let negative = Orientation::new(-90.0, 0.0).unwrap();
        assert_eq!(negative.to_word() >> 16, 0xFFA6);
    }

    #[test]
    fn test_orientation_word_unpack() {
        let orientation = Orientation::new(-12.0, 270.0).unwrap();
        let unpacked = Orientation::from_word(orientation.to_word()).unwrap();
        assert_eq!(unpacked, orientation);

        assert!(Orientation::from_word(0x0000_0168).is_err()); // pitch 360
        assert!(Orientation::from_word(0x005B_0000).is_err()); // yaw 91
    }
}
