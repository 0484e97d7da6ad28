use serde::{Deserialize, Serialize};

/// One step of a vibration pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ms", rename_all = "lowercase")]
pub enum Segment {
    Pulse(u64),
    Pause(u64),
}

impl Segment {
    pub fn duration_ms(self) -> u64 {
        match self {
            Segment::Pulse(ms) | Segment::Pause(ms) => ms,
        }
    }

    pub fn is_pulse(self) -> bool {
        matches!(self, Segment::Pulse(_))
    }
}

/// Ordered pulses and pauses rendering a time of day.
///
/// Two views are exposed:
/// - [`durations`](Self::durations): every segment in order, as the encoders
///   emit them (adjacent pauses stay separate).
/// - [`waveform`](Self::waveform): the list handed to a waveform vibrator,
///   strictly alternating off/on and starting with an off delay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationPattern {
    segments: Vec<Segment>,
}

impl VibrationPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulse(&mut self, ms: u64) -> &mut Self {
        self.segments.push(Segment::Pulse(ms));
        self
    }

    pub fn pause(&mut self, ms: u64) -> &mut Self {
        self.segments.push(Segment::Pause(ms));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn durations(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.duration_ms()).collect()
    }

    pub fn pulse_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_pulse()).count()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.segments.iter().map(|s| s.duration_ms()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Off/on timings: even indices are silence, odd indices vibrate.
    /// Adjacent segments of the same kind are merged; a leading pulse gets a
    /// zero delay in front of it.
    pub fn waveform(&self) -> Vec<u64> {
        let mut timings: Vec<u64> = Vec::with_capacity(self.segments.len() + 1);
        for segment in &self.segments {
            // Position the next entry would take: even = off, odd = on.
            let wants_on = segment.is_pulse();
            let next_is_on = timings.len() % 2 == 1;
            match timings.last_mut() {
                Some(last) if next_is_on != wants_on => *last += segment.duration_ms(),
                None if wants_on => {
                    timings.push(0);
                    timings.push(segment.duration_ms());
                }
                _ => timings.push(segment.duration_ms()),
            }
        }
        timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_merges_adjacent_pauses() {
        let mut p = VibrationPattern::new();
        p.pause(100).pulse(600).pause(300).pause(1000).pulse(200);
        assert_eq!(p.durations(), vec![100, 600, 300, 1000, 200]);
        assert_eq!(p.waveform(), vec![100, 600, 1300, 200]);
    }

    #[test]
    fn waveform_prefixes_zero_delay_for_leading_pulse() {
        let mut p = VibrationPattern::new();
        p.pulse(200).pause(200);
        assert_eq!(p.waveform(), vec![0, 200, 200]);
    }

    #[test]
    fn waveform_merges_adjacent_pulses() {
        let mut p = VibrationPattern::new();
        p.pause(10).pulse(200).pulse(300);
        assert_eq!(p.waveform(), vec![10, 500]);
    }

    #[test]
    fn counts_and_totals() {
        let mut p = VibrationPattern::new();
        p.pause(500).pulse(600).pause(200).pulse(200).pause(200);
        assert_eq!(p.pulse_count(), 2);
        assert_eq!(p.total_duration_ms(), 1700);
        assert!(!p.is_empty());
        assert!(VibrationPattern::new().waveform().is_empty());
    }
}
