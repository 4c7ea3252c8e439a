//! A scripted, in-memory vendor adapter.
//!
//! Each operation pops the next scripted result; when the script runs dry the adapter falls back to a benign
//! default (mint a fresh number, "still waiting", clean cancel). Every call is appended to a log so tests can
//! assert ordering, e.g. that queued acquires hit the vendor strictly FIFO.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use provider_tools::{async_trait, AcquireRequest, Acquisition, CancelOutcome, ProviderAdapter, ProviderApiError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Acquire(String),
    Poll(String),
    Cancel(String),
}

#[derive(Default)]
struct MockState {
    acquire_results: VecDeque<Result<Acquisition, ProviderApiError>>,
    poll_results: VecDeque<Result<Option<String>, ProviderApiError>>,
    cancel_results: VecDeque<Result<CancelOutcome, ProviderApiError>>,
    calls: Vec<MockCall>,
    next_number: u64,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    /// Artificial latency per vendor call. Lets ordering tests make interleaving observable.
    delay: Duration,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn script_acquire(&self, result: Result<Acquisition, ProviderApiError>) {
        self.state.lock().unwrap().acquire_results.push_back(result);
    }

    pub fn script_poll(&self, result: Result<Option<String>, ProviderApiError>) {
        self.state.lock().unwrap().poll_results.push_back(result);
    }

    pub fn script_cancel(&self, result: Result<CancelOutcome, ProviderApiError>) {
        self.state.lock().unwrap().cancel_results.push_back(result);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| matches!(c, MockCall::Cancel(_))).count()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Acquire(req.service_code.clone()));
        if let Some(result) = state.acquire_results.pop_front() {
            return result;
        }
        state.next_number += 1;
        let n = state.next_number;
        Ok(Acquisition { number_id: format!("act-{n}"), phone_number: format!("9{:09}", n) })
    }

    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Poll(number_id.to_string()));
        state.poll_results.pop_front().unwrap_or(Ok(None))
    }

    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Cancel(number_id.to_string()));
        state.cancel_results.pop_front().unwrap_or(Ok(CancelOutcome::Cancelled))
    }
}
