use std::time::{Duration, Instant};

/// Scoped timing guard. Records the construction time and logs the elapsed
/// wall-clock duration at `debug` level when dropped.
///
/// ```
/// let _timer = rime_capture::timing::ScopeTimer::new("duplication start");
/// // ... timed work ...
/// ```
pub struct ScopeTimer {
    label: &'static str,
    begin: Instant,
}

impl ScopeTimer {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            begin: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.begin.elapsed()
    }
}

impl Drop for ScopeTimer {
    fn drop(&mut self) {
        tracing::debug!(
            "{} took {:.3} ms",
            self.label,
            self.elapsed().as_secs_f64() * 1000.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_monotonic() {
        let timer = ScopeTimer::new("test scope");
        let first = timer.elapsed();
        let second = timer.elapsed();
        assert!(second >= first);
    }
}
