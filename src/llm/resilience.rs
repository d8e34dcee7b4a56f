//! LLM resilience wrapper with circuit breaking.
//!
//! After `breaker_failure_threshold` consecutive failures the circuit opens
//! and calls fail immediately until `breaker_reset_ms` has passed; one trial
//! call then decides whether it closes again.

use super::{GenerationParams, LlmProvider};
use crate::config::LlmConfig;
use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Resilience configuration for LLM calls.
#[derive(Debug, Clone)]
pub struct LlmResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl LlmResilienceConfig {
    /// Loads resilience configuration from config settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            breaker_failure_threshold: config.breaker_failure_threshold.max(1),
            breaker_reset_timeout_ms: config.breaker_reset_ms,
            ..Self::default()
        }
    }
}

/// Circuit breaker state machine.
#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &LlmResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failure; returns true if this failure opened the circuit.
    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// LLM provider wrapper with a circuit breaker and request metrics.
pub struct ResilientLlmProvider<P: LlmProvider> {
    inner: P,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientLlmProvider<P> {
    /// Creates a new resilient LLM provider wrapper.
    #[must_use]
    pub fn new(inner: P, config: LlmResilienceConfig) -> Self {
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(&config)),
        }
    }

    fn execute<F>(&self, operation: &'static str, call: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let provider = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider = provider,
            operation = operation,
            status = tracing::field::Empty,
            error = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            record_breaker_state(provider, state);
            span.record("status", "circuit_open");
            record_request(provider, operation, "circuit_open", None);
            return Err(Error::OperationFailed {
                operation: format!("llm_{operation}"),
                cause: "circuit breaker open".to_string(),
            });
        }
        drop(breaker);

        let start = Instant::now();
        let result = call();
        let elapsed = start.elapsed();

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(_) => {
                breaker.on_success();
                let state = breaker.state_value();
                drop(breaker);
                record_breaker_state(provider, state);
                span.record("status", "success");
                record_request(provider, operation, "success", Some(elapsed));
            },
            Err(err) => {
                let tripped = breaker.on_failure();
                let state = breaker.state_value();
                drop(breaker);
                record_breaker_state(provider, state);

                let status = if is_timeout_error(err) { "timeout" } else { "error" };
                span.record("status", status);
                span.record("error", tracing::field::display(err));
                record_request(provider, operation, status, Some(elapsed));
                if tripped {
                    metrics::counter!("llm_circuit_breaker_trips_total", "provider" => provider)
                        .increment(1);
                    tracing::warn!(provider, "LLM circuit breaker opened");
                }
            },
        }
        result
    }
}

impl<P: LlmProvider> LlmProvider for ResilientLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.execute("complete", || self.inner.complete(prompt, params))
    }

    fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.execute("complete_with_system", || {
            self.inner.complete_with_system(system, user, params)
        })
    }
}

fn record_request(
    provider: &'static str,
    operation: &'static str,
    status: &'static str,
    elapsed: Option<Duration>,
) {
    metrics::counter!(
        "llm_requests_total",
        "provider" => provider,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    if let Some(elapsed) = elapsed {
        metrics::histogram!(
            "llm_request_duration_ms",
            "provider" => provider,
            "operation" => operation,
            "status" => status
        )
        .record(elapsed.as_secs_f64() * 1000.0);
    }
}

fn record_breaker_state(provider: &'static str, state: u8) {
    metrics::gauge!("llm_circuit_breaker_state", "provider" => provider).set(f64::from(state));
}

fn is_timeout_error(err: &Error) -> bool {
    match err {
        Error::OperationFailed { cause, .. } => {
            let lower = cause.to_lowercase();
            lower.contains("timeout") || lower.contains("timed out")
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Flaky {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl LlmProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn complete(&self, _: &str, _: &GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::OperationFailed {
                    operation: "flaky_request".to_string(),
                    cause: "connection refused".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn config(threshold: u32, reset_ms: u64) -> LlmResilienceConfig {
        LlmResilienceConfig {
            breaker_failure_threshold: threshold,
            breaker_reset_timeout_ms: reset_ms,
            breaker_half_open_max_calls: 1,
        }
    }

    #[test]
    fn test_success_passes_through() {
        let provider = ResilientLlmProvider::new(Flaky::new(false), config(2, 60_000));
        assert_eq!(
            provider
                .complete_with_system("s", "u", &GenerationParams::default())
                .unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let provider = ResilientLlmProvider::new(Flaky::new(true), config(2, 60_000));
        let params = GenerationParams::default();
        for _ in 0..4 {
            assert!(provider.complete("p", &params).is_err());
        }
        // Two real calls, then the open circuit short-circuits.
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
        let err = provider.complete("p", &params).unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
    }

    #[test]
    fn test_half_open_allows_single_trial() {
        let provider = ResilientLlmProvider::new(Flaky::new(true), config(1, 0));
        let params = GenerationParams::default();
        assert!(provider.complete("p", &params).is_err());
        // Reset timeout of zero: next call is the half-open trial, which fails and reopens.
        assert!(provider.complete("p", &params).is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_detection() {
        let err = Error::OperationFailed {
            operation: "groq_request".to_string(),
            cause: "error sending request: operation timed out".to_string(),
        };
        assert!(is_timeout_error(&err));
        assert!(!is_timeout_error(&Error::InvalidInput("x".to_string())));
    }
}
