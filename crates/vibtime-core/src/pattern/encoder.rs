//! Time-of-day to vibration pattern encoders.
//!
//! ## Modes
//!
//! - **Decimal**: `hour % 12` long pulses, then `minute / 5` short pulses.
//! - **Binary**: hour and minute as unpadded binary digits, long = 1, short = 0.
//! - **Morse**: hour and minute as two zero-padded decimal digits each, in
//!   standard Morse numerals.
//!
//! All encoders are pure: the same `(hour, minute, mode)` always yields the
//! same pattern.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::waveform::VibrationPattern;
use crate::error::ValidationError;

const DECIMAL_LEAD_IN_MS: u64 = 100;
const HOUR_PULSE_MS: u64 = 600;
const HOUR_GAP_MS: u64 = 300;
const MINUTE_PULSE_MS: u64 = 200;
const MINUTE_GAP_MS: u64 = 200;
const ZERO_SIGNAL_MS: u64 = 300;

const SHORT_VIBRATION_MS: u64 = 200;
const LONG_VIBRATION_MS: u64 = 600;
const SHORT_PAUSE_MS: u64 = 200;
const DIGIT_PAUSE_MS: u64 = 500;
const GROUP_PAUSE_MS: u64 = 1000;
const LEAD_IN_MS: u64 = 500;

/// Morse numerals, indexed by digit.
pub const MORSE_DIGITS: [&str; 10] = [
    "-----", ".----", "..---", "...--", "....-", ".....", "-....", "--...", "---..", "----.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    #[default]
    Decimal,
    Binary,
    Morse,
}

impl EncodingMode {
    pub const ALL: [EncodingMode; 3] = [
        EncodingMode::Decimal,
        EncodingMode::Binary,
        EncodingMode::Morse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EncodingMode::Decimal => "decimal",
            EncodingMode::Binary => "binary",
            EncodingMode::Morse => "morse",
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "decimal" | "time" => Ok(EncodingMode::Decimal),
            "binary" => Ok(EncodingMode::Binary),
            "morse" => Ok(EncodingMode::Morse),
            other => Err(ValidationError::InvalidValue {
                field: "encoding_mode".into(),
                message: format!("unknown mode '{other}' (expected decimal, binary or morse)"),
            }),
        }
    }
}

/// Encode a time of day. `hour` is 0-23, `minute` 0-59.
pub fn encode(hour: u32, minute: u32, mode: EncodingMode) -> Result<VibrationPattern, ValidationError> {
    if hour > 23 || minute > 59 {
        return Err(ValidationError::TimeOutOfRange { hour, minute });
    }
    Ok(match mode {
        EncodingMode::Decimal => encode_decimal(hour, minute),
        EncodingMode::Binary => encode_binary(hour, minute),
        EncodingMode::Morse => encode_morse(hour, minute),
    })
}

/// Morse symbols for a single decimal digit.
pub fn morse_code(digit: u8) -> Option<&'static str> {
    MORSE_DIGITS.get(digit as usize).copied()
}

fn encode_decimal(hour: u32, minute: u32) -> VibrationPattern {
    let hour_count = hour % 12;
    let minute_count = minute / 5;

    let mut pattern = VibrationPattern::new();
    pattern.pause(DECIMAL_LEAD_IN_MS);

    for _ in 0..hour_count {
        pattern.pulse(HOUR_PULSE_MS).pause(HOUR_GAP_MS);
    }
    if hour_count > 0 && minute_count > 0 {
        pattern.pause(GROUP_PAUSE_MS);
    }
    for _ in 0..minute_count {
        pattern.pulse(MINUTE_PULSE_MS).pause(MINUTE_GAP_MS);
    }

    // Silence would read as "broken", so midnight/noon on the hour still buzzes.
    if hour_count == 0 && minute_count == 0 {
        pattern.pulse(ZERO_SIGNAL_MS);
    }
    pattern
}

fn encode_binary(hour: u32, minute: u32) -> VibrationPattern {
    let mut pattern = VibrationPattern::new();
    pattern.pause(LEAD_IN_MS);
    push_binary_group(&mut pattern, hour);
    pattern.pause(GROUP_PAUSE_MS);
    push_binary_group(&mut pattern, minute);
    pattern
}

fn push_binary_group(pattern: &mut VibrationPattern, value: u32) {
    for bit in format!("{value:b}").chars() {
        let on = if bit == '1' {
            LONG_VIBRATION_MS
        } else {
            SHORT_VIBRATION_MS
        };
        pattern.pulse(on).pause(SHORT_PAUSE_MS);
    }
}

fn encode_morse(hour: u32, minute: u32) -> VibrationPattern {
    let mut pattern = VibrationPattern::new();
    pattern.pause(LEAD_IN_MS);
    push_morse_group(&mut pattern, hour);
    pattern.pause(GROUP_PAUSE_MS);
    push_morse_group(&mut pattern, minute);
    pattern
}

fn push_morse_group(pattern: &mut VibrationPattern, value: u32) {
    for digit in format!("{value:02}").bytes() {
        let Some(code) = morse_code(digit - b'0') else {
            continue;
        };
        for symbol in code.chars() {
            let on = if symbol == '-' {
                LONG_VIBRATION_MS
            } else {
                SHORT_VIBRATION_MS
            };
            pattern.pulse(on).pause(SHORT_PAUSE_MS);
        }
        pattern.pause(DIGIT_PAUSE_MS);
    }
}
