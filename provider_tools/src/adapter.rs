use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use log::*;
use reqwest::Client;
use smb_common::ServerId;

use crate::{
    config::{ProviderCode, ProviderProfile},
    fivesim::FiveSimApi,
    phantom::PhantomApi,
    smsman::SmsManApi,
    stubs::{StubsAdapter, StubsVendor},
    types::{AcquireRequest, Acquisition, CancelOutcome},
    ProviderApiError,
};

/// The uniform contract every vendor integration implements. Implementations own their URL shapes, auth schemes and
/// response grammars; nothing vendor-specific escapes past this trait.
///
/// Retry policy: `acquire` retries once internally on a transient network/parse failure before surfacing
/// [`ProviderApiError::NoStock`]. `poll` and `cancel` are never retried here; re-invocation is the caller's call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lease a number for the given vendor service code.
    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError>;

    /// Check for an OTP. `Ok(None)` means "still waiting".
    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError>;

    /// Release the number upstream.
    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError>;
}

/// `provider id → adapter` lookup table, built once at startup from the configured server entries.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ServerId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from server configuration. All adapters share one HTTP client.
    pub fn from_profiles(profiles: &[ProviderProfile]) -> Result<Self, ProviderApiError> {
        let client = Client::builder().build().map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        let mut registry = Self::new();
        for profile in profiles {
            let adapter: Arc<dyn ProviderAdapter> = match profile.provider {
                ProviderCode::FastSms => Arc::new(StubsAdapter::new(StubsVendor::fastsms(), profile, &client)),
                ProviderCode::SmsHub => Arc::new(StubsAdapter::new(StubsVendor::smshub(), profile, &client)),
                ProviderCode::TigerSms => Arc::new(StubsAdapter::new(StubsVendor::tigersms(), profile, &client)),
                ProviderCode::GrizzlySms => Arc::new(StubsAdapter::new(StubsVendor::grizzlysms(), profile, &client)),
                ProviderCode::TempNum => Arc::new(StubsAdapter::new(StubsVendor::tempnum(), profile, &client)),
                ProviderCode::FiveSim => Arc::new(FiveSimApi::new(profile, &client)),
                ProviderCode::SmsMan => Arc::new(SmsManApi::new(profile, &client, false)),
                ProviderCode::SmsManMulti => Arc::new(SmsManApi::new(profile, &client, true)),
                ProviderCode::PhantomUnion => Arc::new(PhantomApi::new(profile, &client)),
            };
            debug!("🔌️ Server {} wired to {}", profile.server, adapter.name());
            registry.register(profile.server, adapter);
        }
        Ok(registry)
    }

    pub fn register(&mut self, server: ServerId, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(server, adapter);
    }

    pub fn adapter(&self, server: ServerId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&server).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// The shared acquire retry policy: one retry on a transient failure, and a failed retry surfaces as `NoStock`
/// so callers can route the user to a different server. Business outcomes (`NoStock`, `LowBalance`) pass through
/// untouched on the first attempt.
pub(crate) async fn acquire_with_retry<F, Fut>(
    vendor: &str,
    mut attempt: F,
) -> Result<Acquisition, ProviderApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Acquisition, ProviderApiError>>,
{
    let mut last_err = ProviderApiError::NoStock;
    for try_no in 0..2 {
        match attempt().await {
            Ok(acq) => return Ok(acq),
            Err(e) if e.is_transient() => {
                if try_no == 0 {
                    debug!("🔌️ {vendor}: acquire attempt failed, retrying once: {e}");
                }
                last_err = e;
            },
            Err(e) => return Err(e),
        }
    }
    warn!("🔌️ {vendor}: acquire failed after retry: {last_err}. Reporting no stock");
    Err(ProviderApiError::NoStock)
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use super::*;

    async fn run_script(
        script: Vec<Result<Acquisition, ProviderApiError>>,
    ) -> (Result<Acquisition, ProviderApiError>, usize) {
        let mut script = VecDeque::from(script);
        let mut attempts = 0usize;
        let result = acquire_with_retry("scripted", || {
            attempts += 1;
            let next = script.pop_front().unwrap_or(Err(ProviderApiError::NoStock));
            async move { next }
        })
        .await;
        (result, attempts)
    }

    fn number() -> Acquisition {
        Acquisition { number_id: "77".to_string(), phone_number: "9000000007".to_string() }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let script = vec![Err(ProviderApiError::upstream("502")), Ok(number())];
        let (result, attempts) = run_script(script).await;
        assert_eq!(result.unwrap(), number());
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn two_transient_failures_surface_as_no_stock() {
        let script = vec![Err(ProviderApiError::upstream("502")), Err(ProviderApiError::upstream("timeout"))];
        let (result, attempts) = run_script(script).await;
        assert!(matches!(result, Err(ProviderApiError::NoStock)));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn business_outcomes_are_not_retried() {
        let (result, attempts) = run_script(vec![Err(ProviderApiError::LowBalance)]).await;
        assert!(matches!(result, Err(ProviderApiError::LowBalance)));
        assert_eq!(attempts, 1);

        let (result, attempts) = run_script(vec![Err(ProviderApiError::NoStock)]).await;
        assert!(matches!(result, Err(ProviderApiError::NoStock)));
        assert_eq!(attempts, 1);
    }
}
