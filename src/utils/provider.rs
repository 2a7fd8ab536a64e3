use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Upper bound for a single provider attempt; a hanging upstream must not
/// starve the providers behind it in the chain.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(8);

/// One external data source in an ordered fallback chain.
///
/// `Ok(Some(_))` is a usable result, `Ok(None)` an opt-out (missing
/// credentials, upstream-reported failure flag), `Err` a hard failure.
/// Everything except a usable result moves the chain to the next provider.
#[async_trait]
pub trait Provider<I, O>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, input: &I) -> Result<Option<O>>;
}

pub struct ProviderChain<I, O> {
    providers: Vec<Box<dyn Provider<I, O>>>,
    attempt_timeout: Duration,
}

impl<I: Sync, O> ProviderChain<I, O> {
    pub fn new(providers: Vec<Box<dyn Provider<I, O>>>) -> Self {
        Self {
            providers,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Try providers strictly in configured order and return the first
    /// usable result. Exhaustion yields `None`, never an error.
    pub async fn resolve(&self, input: &I) -> Option<O> {
        for provider in &self.providers {
            match tokio::time::timeout(self.attempt_timeout, provider.attempt(input)).await {
                Ok(Ok(Some(result))) => {
                    debug!(provider = provider.name(), "provider resolved");
                    return Some(result);
                }
                Ok(Ok(None)) => {
                    debug!(provider = provider.name(), "provider opted out");
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "provider attempt failed");
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        timeout_ms = self.attempt_timeout.as_millis() as u64,
                        "provider attempt timed out"
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Fixed(&'static str, &'static str);

    #[async_trait]
    impl Provider<(), String> for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn attempt(&self, _input: &()) -> Result<Option<String>> {
            Ok(Some(self.1.to_string()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Provider<(), String> for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn attempt(&self, _input: &()) -> Result<Option<String>> {
            Err(anyhow!("upstream exploded"))
        }
    }

    struct OptOut;

    #[async_trait]
    impl Provider<(), String> for OptOut {
        fn name(&self) -> &'static str {
            "opt-out"
        }

        async fn attempt(&self, _input: &()) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct Hanging;

    #[async_trait]
    impl Provider<(), String> for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn attempt(&self, _input: &()) -> Result<Option<String>> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[actix_web::test]
    async fn test_first_usable_result_wins() {
        let chain = ProviderChain::new(vec![
            Box::new(Fixed("a", "first")) as Box<dyn Provider<(), String>>,
            Box::new(Fixed("b", "second")),
        ]);
        assert_eq!(chain.resolve(&()).await, Some("first".to_string()));
    }

    #[actix_web::test]
    async fn test_failure_is_invisible_to_caller() {
        let chain = ProviderChain::new(vec![
            Box::new(Failing) as Box<dyn Provider<(), String>>,
            Box::new(Fixed("b", "second")),
        ]);
        assert_eq!(chain.resolve(&()).await, Some("second".to_string()));
    }

    #[actix_web::test]
    async fn test_opt_out_continues() {
        let chain = ProviderChain::new(vec![
            Box::new(OptOut) as Box<dyn Provider<(), String>>,
            Box::new(Fixed("b", "second")),
        ]);
        assert_eq!(chain.resolve(&()).await, Some("second".to_string()));
    }

    #[actix_web::test]
    async fn test_exhaustion_returns_none() {
        let chain = ProviderChain::new(vec![
            Box::new(Failing) as Box<dyn Provider<(), String>>,
            Box::new(OptOut),
        ]);
        assert_eq!(chain.resolve(&()).await, None);
    }

    #[actix_web::test]
    async fn test_timed_out_attempt_does_not_block_next_provider() {
        let chain = ProviderChain::new(vec![
            Box::new(Hanging) as Box<dyn Provider<(), String>>,
            Box::new(Fixed("b", "rescued")),
        ])
        .with_timeout(Duration::from_millis(20));
        assert_eq!(chain.resolve(&()).await, Some("rescued".to_string()));
    }
}
