//! Wall-clock budget for one evaluation

use crate::error::SclError;
use crate::resource_limits::ResourceLimits;
use std::time::Instant;

pub struct TimeoutTracker {
    start_time: Instant,
    limit_ms: u64,
}

impl TimeoutTracker {
    pub fn new(limits: &ResourceLimits) -> Self {
        Self {
            start_time: Instant::now(),
            limit_ms: limits.max_evaluation_time_ms,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Fail once the evaluation has run longer than its budget
    pub fn check_timeout(&self) -> Result<(), SclError> {
        let elapsed_ms = self.elapsed_ms();
        if elapsed_ms > self.limit_ms {
            return Err(SclError::ResourceLimitExceeded {
                limit_name: "max_evaluation_time_ms".to_string(),
                limit_value: self.limit_ms.to_string(),
                actual_value: elapsed_ms.to_string(),
                suggestion: format!(
                    "Evaluation took {}ms, exceeding the limit of {}ms. Reduce recursion depth or the number of facts.",
                    elapsed_ms, self.limit_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_expires() {
        let tracker = TimeoutTracker::new(&ResourceLimits::default().with_evaluation_time_ms(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = tracker.check_timeout().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_generous_budget_passes() {
        let tracker = TimeoutTracker::new(&ResourceLimits::default());
        assert!(tracker.check_timeout().is_ok());
    }
}
