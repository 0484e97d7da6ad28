mod encoder;
mod waveform;

pub use encoder::{encode, morse_code, EncodingMode, MORSE_DIGITS};
pub use waveform::{Segment, VibrationPattern};
