use serde::{Deserialize, Serialize};

use super::COOLDOWN_PERIOD_MS;

/// Time since the last watch-mode fire, measured against a fixed length.
///
/// Outlives any single session; `last_fire_ms` lives in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownWindow {
    pub last_fire_ms: Option<u64>,
    pub length_ms: u64,
}

impl Default for CooldownWindow {
    fn default() -> Self {
        Self {
            last_fire_ms: None,
            length_ms: COOLDOWN_PERIOD_MS,
        }
    }
}

impl CooldownWindow {
    /// A full-length window starting at `fired_ms`.
    pub fn fired_at(fired_ms: u64) -> Self {
        Self {
            last_fire_ms: Some(fired_ms),
            ..Self::default()
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_fire_ms {
            Some(fired) => self
                .length_ms
                .saturating_sub(now_ms.saturating_sub(fired)),
            None => 0,
        }
    }

    pub fn is_active(&self, now_ms: u64) -> bool {
        self.remaining_ms(now_ms) > 0
    }

    /// 0.0 right after a fire, 1.0 once the window has passed.
    pub fn progress(&self, now_ms: u64) -> f32 {
        if self.length_ms == 0 {
            return 1.0;
        }
        let remaining = self.remaining_ms(now_ms) as f32 / self.length_ms as f32;
        (1.0 - remaining).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fired_is_inactive() {
        let window = CooldownWindow::default();
        assert!(!window.is_active(0));
        assert_eq!(window.progress(0), 1.0);
    }

    #[test]
    fn counts_down_from_fire() {
        let window = CooldownWindow {
            last_fire_ms: Some(1_000),
            ..Default::default()
        };
        assert_eq!(window.remaining_ms(1_000), COOLDOWN_PERIOD_MS);
        assert_eq!(window.progress(1_000), 0.0);
        assert_eq!(window.remaining_ms(1_000 + COOLDOWN_PERIOD_MS / 2), COOLDOWN_PERIOD_MS / 2);
        assert!((window.progress(1_000 + COOLDOWN_PERIOD_MS / 2) - 0.5).abs() < 1e-6);
        assert!(!window.is_active(1_000 + COOLDOWN_PERIOD_MS));
    }

    #[test]
    fn clock_going_backwards_keeps_full_window() {
        let window = CooldownWindow {
            last_fire_ms: Some(10_000),
            ..Default::default()
        };
        assert_eq!(window.remaining_ms(5_000), COOLDOWN_PERIOD_MS);
    }
}
