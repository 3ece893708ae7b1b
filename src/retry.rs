//! Bounded retries with humanized pauses
//!
//! Taps on a live device fail for mundane reasons (an animation eats
//! the touch, a popup lands late). Most callers want "try a few times,
//! pause a human-looking moment in between, then give up".

use std::thread;
use std::time::Duration;

use rand::Rng;

/// A bounded retry policy
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    max_attempts: u32,
    delay_ms: (u64, u64),
}

impl Retry {
    pub fn new(max_attempts: u32, delay_ms: (u64, u64)) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    /// Run until the action succeeds; false when attempts run out
    pub fn run<F>(&self, mut action: F) -> bool
    where
        F: FnMut() -> bool,
    {
        for attempt in 1..=self.max_attempts {
            if action() {
                return true;
            }
            if attempt < self.max_attempts {
                self.pause();
            }
        }
        false
    }

    /// Run until the action yields a value
    pub fn run_for<T, F>(&self, mut action: F) -> Option<T>
    where
        F: FnMut() -> Option<T>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = action() {
                return Some(value);
            }
            if attempt < self.max_attempts {
                self.pause();
            }
        }
        None
    }

    fn pause(&self) {
        let (min, max) = self.delay_ms;
        let ms = if min >= max {
            min
        } else {
            rand::rng().random_range(min..=max)
        };
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_success() {
        let mut calls = 0;
        let ok = Retry::new(3, (0, 0)).run(|| {
            calls += 1;
            true
        });
        assert!(ok);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_succeeds_on_later_attempt() {
        let mut calls = 0;
        let ok = Retry::new(5, (0, 0)).run(|| {
            calls += 1;
            calls == 3
        });
        assert!(ok);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let ok = Retry::new(4, (0, 0)).run(|| {
            calls += 1;
            false
        });
        assert!(!ok);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_run_for_yields_value() {
        let mut calls = 0;
        let value = Retry::new(3, (0, 0)).run_for(|| {
            calls += 1;
            (calls == 2).then_some("hit")
        });
        assert_eq!(value, Some("hit"));
    }

    #[test]
    fn test_zero_attempts_never_runs() {
        let mut calls = 0;
        let ok = Retry::new(0, (0, 0)).run(|| {
            calls += 1;
            true
        });
        assert!(!ok);
        assert_eq!(calls, 0);
    }
}
