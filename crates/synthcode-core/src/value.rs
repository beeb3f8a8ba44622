//! Value encodings.
//!
//! A value encoding quantizes a real number into one program byte and
//! decodes it back:
//!
//! - [`Scale::Linear`] - `byte = round(v / scale) + zero`, optionally centered
//!   on byte 62 for signed values
//! - [`Scale::Exponential`] - `byte = round(log_0.94(v / scale))`, so larger
//!   values map to smaller bytes
//!
//! [`Value::Raw`] bypasses the transform entirely.

use crate::errors::*;
use crate::stream::{MAX_BYTE, NUM_VALUES};
use std::fmt;

/// Base of all exponential encodings.
pub const EXPONENT: f64 = 0.94;

/// Number of significant-digit precisions tried by [`ValueEncoding::decode_rounded`].
const ROUNDING_ATTEMPTS: i32 = 5;

/// A value handed to an encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// An already-encoded byte, written as-is.
    Raw(u8),
    /// A real number to be quantized.
    Number(f64),
}

/// Raw byte at the low end of every exponential encoding (its smallest magnitude).
pub const MIN: Value = Value::Raw(MAX_BYTE);

/// Raw byte at the high end of every exponential encoding.
pub const MAX: Value = Value::Raw(0);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Raw(b) => write!(f, "Raw({})", b),
            Value::Number(v) => write!(f, "{}", v),
        }
    }
}

/// The transform applied by an encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    Linear { scale: f64, bipolar: bool },
    Exponential { scale: f64 },
}

/// A named, immutable way of turning numbers into bytes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueEncoding {
    name: &'static str,
    scale: Scale,
}

impl ValueEncoding {
    pub const fn linear(name: &'static str, scale: f64, bipolar: bool) -> Self {
        Self {
            name,
            scale: Scale::Linear { scale, bipolar },
        }
    }

    pub const fn exponential(name: &'static str, scale: f64) -> Self {
        Self {
            name,
            scale: Scale::Exponential { scale },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Byte that decodes to zero for a linear encoding.
    fn zero(bipolar: bool) -> i64 {
        if bipolar {
            ((NUM_VALUES - 1) / 2) as i64
        } else {
            0
        }
    }

    /// Encode a value as a byte.
    ///
    /// Raw values pass through unchecked; the stream rejects them later if
    /// they are out of range.
    pub fn encode(&self, value: impl Into<Value>) -> Result<u8> {
        match value.into() {
            Value::Raw(b) => Ok(b),
            Value::Number(v) => self.encode_float(v),
        }
    }

    /// Quantize a real number, clamping the result into range.
    pub fn encode_float(&self, value: f64) -> Result<u8> {
        if !value.is_finite() {
            return Err(SynthCodeError::Validation(format!(
                "{}: cannot encode non-finite value {}",
                self.name, value
            )));
        }
        let candidate = match self.scale {
            Scale::Linear { scale, bipolar } => {
                (value / scale).round_ties_even() as i64 + Self::zero(bipolar)
            }
            Scale::Exponential { scale } => {
                if value <= 0.0 {
                    return Err(SynthCodeError::Validation(format!(
                        "{}: exponential encoding requires a positive value, got {}",
                        self.name, value
                    )));
                }
                exponent_of(value / scale)
            }
        };
        Ok(self.clamp(value, candidate))
    }

    /// Clamp an encoded candidate into `0..NUM_VALUES`, warning when it had to move.
    pub fn clamp(&self, value: f64, candidate: i64) -> u8 {
        let clamped = if candidate >= NUM_VALUES as i64 {
            MAX_BYTE
        } else if candidate < 0 {
            0
        } else {
            return candidate as u8;
        };
        let shown = self
            .decode_rounded(clamped)
            .unwrap_or_else(|_| self.decode(clamped).to_string());
        log::warn!("{}({}) clamped to {}", self.name, value, shown);
        clamped
    }

    /// Decode a byte as a floating-point number.
    pub fn decode(&self, value: u8) -> f64 {
        match self.scale {
            Scale::Linear { scale, bipolar } => scale * (value as i64 - Self::zero(bipolar)) as f64,
            Scale::Exponential { scale } => scale * EXPONENT.powf(value as f64),
        }
    }

    /// Decode a byte as decimal text using only the digits needed to identify it.
    ///
    /// Only used for diagnostics. Linear values are printed with two decimals.
    /// Exponential values use the fewest significant digits (up to five) whose
    /// neighbouring decimals re-encode within one byte of `value`.
    pub fn decode_rounded(&self, value: u8) -> Result<String> {
        let scale = match self.scale {
            Scale::Linear { .. } => return Ok(format!("{:.2}", self.decode(value))),
            Scale::Exponential { scale } => scale,
        };
        let v = self.decode(value);
        let n = decimal_exponent(v);
        let target = value as i64;
        for i in 0..ROUNDING_ATTEMPTS {
            let places = i - n;
            let text = round_significant(v, i, places);
            let y: f64 = text.parse().map_err(|_| self.rounding_error(value))?;
            let delta = 10f64.powi(n - i);
            let (y0, y1) = (y - delta, y + delta);
            if y0 <= 0.0 {
                continue;
            }
            let x0 = exponent_of(y0 / scale);
            let x1 = exponent_of(y1 / scale);
            if target - 1 <= x1 && x0 <= target + 1 {
                return Ok(text);
            }
        }
        Err(self.rounding_error(value))
    }

    fn rounding_error(&self, value: u8) -> SynthCodeError {
        SynthCodeError::DecodeRounding {
            encoding: self.name.to_string(),
            value,
        }
    }
}

/// `round(log_EXPONENT(ratio))`, ties to even.
fn exponent_of(ratio: f64) -> i64 {
    (ratio.ln() / EXPONENT.ln()).round_ties_even() as i64
}

/// Position of the leading decimal digit of a positive number, `floor(log10 v)`.
fn decimal_exponent(v: f64) -> i32 {
    let mut n = v.log10().floor() as i32;
    if 10f64.powi(n) > v {
        n -= 1;
    } else if 10f64.powi(n + 1) <= v {
        n += 1;
    }
    n
}

/// Round `v` to `extra + 1` significant digits, printed with `places` decimals
/// (or as an integer when `places` is negative).
fn round_significant(v: f64, extra: i32, places: i32) -> String {
    if places >= 0 {
        return format!("{:.*}", places as usize, v);
    }
    let rounded: f64 = format!("{:.*e}", extra as usize, v).parse().unwrap_or(v);
    format!("{:.0}", rounded)
}

/// Gain multiplier, 1.0 at byte 0.
pub const GAIN: ValueEncoding = ValueEncoding::exponential("gain", 1.0);
/// Time in seconds, 20 s at byte 0.
pub const TIME: ValueEncoding = ValueEncoding::exponential("time", 20.0);
/// Frequency in Hz, 20 kHz at byte 0.
pub const FREQUENCY: ValueEncoding = ValueEncoding::exponential("frequency", 20e3);
/// Amplitude of the random detune applied by the runtime, in cents.
pub const DETUNE: ValueEncoding = ValueEncoding::exponential("detune", 99.0 / 2.0);
/// Signed integer, 0 at byte 62.
pub const INT: ValueEncoding = ValueEncoding::linear("int", 1.0, true);
/// Stereo position in `[-1, 1]`, steps of 1/60.
pub const PAN: ValueEncoding = ValueEncoding::linear("pan", 1.0 / 60.0, true);

/// All standard encodings.
pub const STANDARD_ENCODINGS: [ValueEncoding; 6] = [GAIN, TIME, FREQUENCY, DETUNE, INT, PAN];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_bytes() {
        for encoding in STANDARD_ENCODINGS {
            for b in 0..NUM_VALUES {
                let decoded = encoding.decode(b);
                assert_eq!(
                    encoding.encode(decoded).unwrap(),
                    b,
                    "{} failed to round-trip byte {}",
                    encoding.name(),
                    b
                );
            }
        }
    }

    #[test]
    fn test_linear_bipolar_pan() {
        assert_eq!(PAN.encode(-0.5).unwrap(), 32);
        assert_eq!(PAN.encode(0.5).unwrap(), 92);
        assert_eq!(PAN.encode(0.0).unwrap(), 62);
    }

    #[test]
    fn test_int_encoding() {
        assert_eq!(INT.encode(0).unwrap(), 62);
        assert_eq!(INT.encode(-12).unwrap(), 50);
        assert_eq!(INT.encode(4.0).unwrap(), 66);
        assert_eq!(INT.decode(50), -12.0);
    }

    #[test]
    fn test_linear_unipolar_zero() {
        let enc = ValueEncoding::linear("level", 0.5, false);
        assert_eq!(enc.encode(0.0).unwrap(), 0);
        assert_eq!(enc.encode(10.0).unwrap(), 20);
        assert_eq!(enc.decode(20), 10.0);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        let enc = ValueEncoding::linear("half", 1.0, false);
        assert_eq!(enc.encode(2.5).unwrap(), 2);
        assert_eq!(enc.encode(3.5).unwrap(), 4);
    }

    #[test]
    fn test_exponential_encoding() {
        assert_eq!(TIME.encode(0.9).unwrap(), 50);
        assert_eq!(TIME.encode(0.3).unwrap(), 68);
        assert_eq!(FREQUENCY.encode(600).unwrap(), 57);
        assert_eq!(FREQUENCY.encode(1800).unwrap(), 39);
        assert_eq!(GAIN.encode(0.5).unwrap(), 11);
        assert_eq!(DETUNE.encode(10.0).unwrap(), 26);
    }

    #[test]
    fn test_clamp_to_boundaries() {
        let enc = ValueEncoding::exponential("unit", 1.0);
        // Base 0.94 < 1: tiny values land on the last byte, huge ones on byte 0.
        assert_eq!(enc.encode(1e-9).unwrap(), MAX_BYTE);
        assert_eq!(enc.encode(1e9).unwrap(), 0);
        assert_eq!(PAN.encode(5.0).unwrap(), MAX_BYTE);
        assert_eq!(PAN.encode(-5.0).unwrap(), 0);
    }

    /// Collects warnings emitted on the current thread.
    struct WarningCapture;

    thread_local! {
        static WARNINGS: std::cell::RefCell<Vec<String>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    impl log::Log for WarningCapture {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record<'_>) {
            if self.enabled(record.metadata()) {
                WARNINGS.with(|w| w.borrow_mut().push(record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: WarningCapture = WarningCapture;

    fn take_warnings() -> Vec<String> {
        WARNINGS.with(|w| std::mem::take(&mut *w.borrow_mut()))
    }

    #[test]
    fn test_clamp_logs_one_warning_per_clamp() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Warn);
        take_warnings();

        let enc = ValueEncoding::exponential("unit", 1.0);
        enc.encode(1e9).unwrap();
        enc.encode(1e-9).unwrap();
        assert_eq!(
            take_warnings(),
            [
                "unit(1000000000) clamped to 1.00",
                "unit(0.000000001) clamped to 0.00047"
            ]
        );

        assert_eq!(enc.encode(0.5).unwrap(), 11);
        assert!(take_warnings().is_empty());
    }

    #[test]
    fn test_clamp_passes_in_range_values() {
        assert_eq!(GAIN.clamp(1.0, 0), 0);
        assert_eq!(GAIN.clamp(1.0, 124), 124);
        assert_eq!(GAIN.clamp(1.0, 125), 124);
        assert_eq!(GAIN.clamp(1.0, -3), 0);
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(TIME.encode(MIN).unwrap(), 124);
        assert_eq!(TIME.encode(MAX).unwrap(), 0);
        // Out-of-range raw bytes are the stream's problem, not the encoding's.
        assert_eq!(GAIN.encode(Value::Raw(200)).unwrap(), 200);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(matches!(GAIN.encode(0.0), Err(SynthCodeError::Validation(_))));
        assert!(matches!(GAIN.encode(-1.0), Err(SynthCodeError::Validation(_))));
        assert!(matches!(INT.encode(f64::NAN), Err(SynthCodeError::Validation(_))));
        assert!(matches!(
            FREQUENCY.encode(f64::INFINITY),
            Err(SynthCodeError::Validation(_))
        ));
    }

    #[test]
    fn test_decode_rounded_exponential() {
        let gain: Vec<String> = [0u8, 1, 10, 50, 62, 100, 123, 124]
            .iter()
            .map(|&b| GAIN.decode_rounded(b).unwrap())
            .collect();
        assert_eq!(
            gain,
            ["1.00", "0.94", "0.54", "0.045", "0.022", "0.0021", "0.00050", "0.00047"]
        );

        let time: Vec<String> = [0u8, 1, 10, 50, 124]
            .iter()
            .map(|&b| TIME.decode_rounded(b).unwrap())
            .collect();
        assert_eq!(time, ["20", "19", "10.8", "0.91", "0.0093"]);

        let freq: Vec<String> = [0u8, 1, 10, 57, 124]
            .iter()
            .map(|&b| FREQUENCY.decode_rounded(b).unwrap())
            .collect();
        assert_eq!(freq, ["20000", "19000", "10800", "590", "9.3"]);

        assert_eq!(DETUNE.decode_rounded(62).unwrap(), "1.07");
        assert_eq!(DETUNE.decode_rounded(26).unwrap(), "9.9");
    }

    #[test]
    fn test_decode_rounded_linear() {
        assert_eq!(INT.decode_rounded(0).unwrap(), "-62.00");
        assert_eq!(INT.decode_rounded(62).unwrap(), "0.00");
        assert_eq!(PAN.decode_rounded(32).unwrap(), "-0.50");
        assert_eq!(PAN.decode_rounded(124).unwrap(), "1.03");
    }

    #[test]
    fn test_decode_rounded_covers_every_byte() {
        for encoding in STANDARD_ENCODINGS {
            for b in 0..NUM_VALUES {
                assert!(
                    encoding.decode_rounded(b).is_ok(),
                    "{} has no rounded form for {}",
                    encoding.name(),
                    b
                );
            }
        }
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3), Value::Number(3.0));
        assert_eq!(Value::from(0.25f32), Value::Number(0.25));
        assert_eq!(MIN, Value::Raw(124));
        assert_eq!(MIN.to_string(), "Raw(124)");
    }
}
