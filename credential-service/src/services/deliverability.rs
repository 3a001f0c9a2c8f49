//! Email deliverability check via MX lookup.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait DeliverabilityChecker: Send + Sync {
    /// Whether mail can plausibly be delivered to `email`. Resolution and
    /// network failures mean "no": this backs form validation and must
    /// fail closed rather than error.
    async fn is_deliverable(&self, email: &str) -> bool;
}

pub struct MxDeliverabilityChecker {
    resolver: TokioAsyncResolver,
}

impl MxDeliverabilityChecker {
    pub fn from_system_conf() -> Result<Self, anyhow::Error> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| anyhow::anyhow!("Failed to build DNS resolver: {}", e))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl DeliverabilityChecker for MxDeliverabilityChecker {
    async fn is_deliverable(&self, email: &str) -> bool {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        if domain.is_empty() {
            return false;
        }

        match tokio::time::timeout(LOOKUP_TIMEOUT, self.resolver.mx_lookup(domain)).await {
            Ok(Ok(lookup)) => lookup.iter().next().is_some(),
            Ok(Err(e)) => {
                tracing::debug!(domain = %domain, error = %e, "MX lookup failed");
                false
            }
            Err(_) => {
                tracing::debug!(domain = %domain, "MX lookup timed out");
                false
            }
        }
    }
}

/// Test double: deliverability decided by a fixed answer.
pub struct StaticDeliverability(pub bool);

#[async_trait]
impl DeliverabilityChecker for StaticDeliverability {
    async fn is_deliverable(&self, _email: &str) -> bool {
        self.0
    }
}
