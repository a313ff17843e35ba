//! Circuit Breaker pattern implementation.
//!
//! Refuses a refresh when the event count collapses compared to the previous
//! snapshot, so a broken or half-loaded listing page is never read as
//! "every show was cancelled".

use crate::error::{AppError, Result};
use crate::models::{CircuitBreakerConfig, Event};

/// Circuit breaker for preventing bad snapshot updates.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone)]
pub enum CircuitBreakerResult {
    /// Safe to proceed with the write
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// First run or previous snapshot below baseline
    ColdStart { current_count: usize },
    /// Circuit breaker triggered - abort write
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Nothing normalized while the previous snapshot had events
    EmptyResult,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    /// Check if it's safe to replace `previous` with `current`.
    pub fn check(&self, current: &[Event], previous: &[Event]) -> CircuitBreakerResult {
        let current_count = current.len();
        let previous_count = previous.len();

        if current_count == 0 {
            if previous_count == 0 {
                return CircuitBreakerResult::ColdStart { current_count };
            }
            return CircuitBreakerResult::EmptyResult;
        }

        if previous_count < self.config.min_baseline {
            return CircuitBreakerResult::ColdStart { current_count };
        }

        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.config.max_drop_percent as f64 {
                return CircuitBreakerResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        CircuitBreakerResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Validate and return Ok if safe, Err if circuit breaker triggered.
    pub fn validate(&self, current: &[Event], previous: &[Event]) -> Result<()> {
        match self.check(current, previous) {
            CircuitBreakerResult::Safe {
                current_count,
                previous_count,
            } => {
                log::info!(
                    "Circuit breaker: SAFE ({} events, was {})",
                    current_count,
                    previous_count
                );
                Ok(())
            }
            CircuitBreakerResult::ColdStart { current_count } => {
                log::info!(
                    "Circuit breaker: COLD START ({} events, first run or below baseline)",
                    current_count
                );
                Ok(())
            }
            CircuitBreakerResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                log::error!(
                    "Circuit breaker: TRIGGERED! {} → {} events ({:.1}% drop > {}% threshold)",
                    previous_count,
                    current_count,
                    drop_percent,
                    self.config.max_drop_percent
                );
                Err(AppError::CircuitBreakerTriggered {
                    current_count,
                    previous_count,
                    drop_percent,
                    threshold_percent: self.config.max_drop_percent,
                })
            }
            CircuitBreakerResult::EmptyResult => {
                log::error!("Circuit breaker: EMPTY RESULT - refusing refresh");
                Err(AppError::EmptyResult)
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_events(count: usize) -> Vec<Event> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..count)
            .map(|i| {
                let d = base + Duration::days(i as i64);
                Event::new(d, d, &format!("Venue {i}"), "City").unwrap()
            })
            .collect()
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            max_drop_percent: 20,
            min_baseline: 10,
        })
    }

    #[test]
    fn test_safe_small_drop() {
        assert!(matches!(
            breaker().check(&make_events(85), &make_events(100)),
            CircuitBreakerResult::Safe { .. }
        ));
    }

    #[test]
    fn test_triggered_large_drop() {
        assert!(matches!(
            breaker().check(&make_events(70), &make_events(100)),
            CircuitBreakerResult::Triggered { .. }
        ));
    }

    #[test]
    fn test_cold_start() {
        assert!(matches!(
            breaker().check(&make_events(50), &[]),
            CircuitBreakerResult::ColdStart { .. }
        ));
        assert!(matches!(
            breaker().check(&[], &[]),
            CircuitBreakerResult::ColdStart { .. }
        ));
    }

    #[test]
    fn test_empty_result_even_below_baseline() {
        assert!(matches!(
            breaker().check(&[], &make_events(3)),
            CircuitBreakerResult::EmptyResult
        ));
    }

    #[test]
    fn test_increase_is_safe() {
        assert!(matches!(
            breaker().check(&make_events(150), &make_events(100)),
            CircuitBreakerResult::Safe { .. }
        ));
    }

    #[test]
    fn test_validate_returns_error() {
        let result = breaker().validate(&make_events(50), &make_events(100));
        assert!(matches!(
            result.unwrap_err(),
            AppError::CircuitBreakerTriggered { .. }
        ));
    }
}
