//! Email validation in rate-limited chunks.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::Result;
use crate::providers::{EmailValidator, EmailVerdict};
use crate::retry::{retry_with_backoff, RetryPolicy};

const CHUNK_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedEmail {
    pub email: String,
    #[serde(flatten)]
    pub verdict: EmailVerdict,
}

pub struct EmailValidationService {
    validator: Arc<dyn EmailValidator>,
    retry: RetryPolicy,
    concurrency: usize,
    fail_safe: bool,
}

impl EmailValidationService {
    pub fn new(validator: Arc<dyn EmailValidator>, config: &Config) -> Self {
        Self {
            validator,
            retry: RetryPolicy::new(config.max_retries, config.retry_delay()),
            concurrency: config.leadmagic_concurrency.max(1),
            fail_safe: config.leadmagic_fail_safe,
        }
    }

    /// Validates `emails` in order, `concurrency` at a time.
    ///
    /// Each call is retried with backoff. In fail-safe mode a validation that
    /// still fails becomes an `error` verdict; otherwise the first failure is
    /// returned.
    pub async fn validate_emails(&self, emails: &[String]) -> Result<Vec<ValidatedEmail>> {
        let mut results = Vec::with_capacity(emails.len());
        let chunks: Vec<&[String]> = emails.chunks(self.concurrency).collect();

        for (index, chunk) in chunks.iter().enumerate() {
            let verdicts = join_all(chunk.iter().map(|email| {
                retry_with_backoff(self.retry, || self.validator.validate(email))
            }))
            .await;

            for (email, verdict) in chunk.iter().zip(verdicts) {
                let verdict = match verdict {
                    Ok(verdict) => verdict,
                    Err(err) if self.fail_safe => {
                        error!(email = %email, error = %err, "email validation failed");
                        EmailVerdict {
                            valid: false,
                            status: "error".to_string(),
                            data: json!({ "error": err.to_string() }),
                        }
                    }
                    Err(err) => return Err(err),
                };
                results.push(ValidatedEmail {
                    email: email.clone(),
                    verdict,
                });
            }

            if index + 1 < chunks.len() {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
        }

        debug!(
            total = results.len(),
            valid = results.iter().filter(|r| r.verdict.valid).count(),
            "emails validated"
        );
        Ok(results)
    }

    /// Splits comma-joined entries and returns the addresses that validate.
    pub async fn filter_valid_emails(&self, emails: &[String]) -> Result<Vec<String>> {
        let flattened: Vec<String> = emails
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect();

        Ok(self
            .validate_emails(&flattened)
            .await?
            .into_iter()
            .filter(|result| result.verdict.valid)
            .map(|result| result.email)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    use crate::error::RelayError;

    /// Valid unless the address contains "bad"; "boom" always fails and
    /// "flaky" fails on its first call only.
    #[derive(Default)]
    struct FakeValidator {
        calls: AtomicUsize,
        flaky_calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailValidator for FakeValidator {
        async fn validate(&self, email: &str) -> Result<EmailVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if email.contains("flaky") && self.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RelayError::TransientNetwork("connection reset".into()));
            }
            if email.contains("boom") {
                return Err(RelayError::Timeout("validator timed out".into()));
            }
            let valid = !email.contains("bad");
            Ok(EmailVerdict {
                valid,
                status: if valid { "valid" } else { "invalid" }.to_string(),
                data: json!({}),
            })
        }
    }

    fn service(fail_safe: bool, concurrency: usize) -> (EmailValidationService, Arc<FakeValidator>) {
        let validator = Arc::new(FakeValidator::default());
        let config = Config {
            leadmagic_fail_safe: fail_safe,
            leadmagic_concurrency: concurrency,
            ..Config::default()
        };
        (EmailValidationService::new(validator.clone(), &config), validator)
    }

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_are_spaced_apart() {
        let (service, validator) = service(true, 2);
        let start = Instant::now();

        let results = service
            .validate_emails(&emails(&["a@x.com", "bad@x.com", "c@x.com", "d@x.com", "e@x.com"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[1].email, "bad@x.com");
        assert!(!results[1].verdict.valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_safe_turns_errors_into_verdicts() {
        let (service, _) = service(true, 10);
        let results = service
            .validate_emails(&emails(&["boom@x.com", "a@x.com"]))
            .await
            .unwrap();

        assert_eq!(results[0].verdict.status, "error");
        assert!(!results[0].verdict.valid);
        assert!(results[1].verdict.valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let (service, validator) = service(true, 10);
        let results = service
            .validate_emails(&emails(&["flaky@x.com"]))
            .await
            .unwrap();

        assert_eq!(results[0].verdict.status, "valid");
        assert!(results[0].verdict.valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_exhausts_retries() {
        let (service, validator) = service(true, 10);
        let results = service
            .validate_emails(&emails(&["boom@x.com"]))
            .await
            .unwrap();

        assert_eq!(results[0].verdict.status, "error");
        assert_eq!(validator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_mode_propagates_errors() {
        let (service, _) = service(false, 10);
        let result = service.validate_emails(&emails(&["boom@x.com"])).await;
        assert!(matches!(result, Err(RelayError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_splits_joined_entries() {
        let (service, validator) = service(true, 10);
        let valid = service
            .filter_valid_emails(&emails(&["a@x.com, bad@x.com", "", "c@x.com,"]))
            .await
            .unwrap();

        assert_eq!(valid, emails(&["a@x.com", "c@x.com"]));
        assert_eq!(validator.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_validated_email_serializes_flat() {
        let value = serde_json::to_value(ValidatedEmail {
            email: "a@x.com".into(),
            verdict: EmailVerdict {
                valid: true,
                status: "valid".into(),
                data: json!({ "mx": true }),
            },
        })
        .unwrap();
        assert_eq!(value["email"], "a@x.com");
        assert_eq!(value["valid"], true);
        assert_eq!(value["data"]["mx"], true);
    }
}
