//! SMS-Man integration. Token-in-query auth, JSON replies. Registered twice: once for single-SMS activations and
//! once with `hasMultipleSms=true`, which also unlocks the `retrysms` next-code call.
use log::*;
use reqwest::Client;
use serde_json::Value;
use smb_common::Secret;

use crate::{
    adapter::{acquire_with_retry, ProviderAdapter},
    config::ProviderProfile,
    types::{strip_country_prefix, AcquireRequest, Acquisition, CancelOutcome},
    ProviderApiError,
};

const BASE_URL: &str = "https://api2.sms-man.com/control";
const COUNTRY_ID: u32 = 14;

#[derive(Clone)]
pub struct SmsManApi {
    api_key: Secret<String>,
    client: Client,
    multi_sms: bool,
}

impl SmsManApi {
    pub fn new(profile: &ProviderProfile, client: &Client, multi_sms: bool) -> Self {
        Self { api_key: profile.api_key.clone(), client: client.clone(), multi_sms }
    }

    async fn get_json(&self, url: &str) -> Result<Value, ProviderApiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderApiError::upstream(format!("sms-man returned HTTP {}", response.status())));
        }
        let body = response.text().await?;
        serde_json::from_str(body.trim())
            .map_err(|_| ProviderApiError::upstream(format!("sms-man returned non-JSON: {}", body.trim())))
    }

    fn spawn_next_otp(&self, number_id: &str) {
        let url =
            format!("{BASE_URL}/set-status?token={}&request_id={number_id}&status=retrysms", self.api_key.reveal());
        let client = self.client.clone();
        let id = number_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            match client.get(&url).send().await {
                Ok(resp) => debug!("📨️ sms-man: retrysms for {id} returned {}", resp.status()),
                Err(e) => warn!("📨️ sms-man: retrysms for {id} failed: {e}"),
            }
        });
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for SmsManApi {
    fn name(&self) -> &'static str {
        if self.multi_sms {
            "smsman_multi"
        } else {
            "smsman"
        }
    }

    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError> {
        let url = format!(
            "{BASE_URL}/get-number?token={}&application_id={}&country_id={COUNTRY_ID}&hasMultipleSms={}",
            self.api_key.reveal(),
            req.service_code,
            self.multi_sms
        );
        acquire_with_retry(self.name(), || async {
            let json = self.get_json(&url).await?;
            parse_acquire(&json)
        })
        .await
    }

    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError> {
        let url = format!("{BASE_URL}/get-sms?token={}&request_id={number_id}", self.api_key.reveal());
        let json = self.get_json(&url).await?;
        let otp = parse_poll(&json)?;
        if otp.is_some() && self.multi_sms {
            self.spawn_next_otp(number_id);
        }
        Ok(otp)
    }

    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError> {
        let url = format!("{BASE_URL}/set-status?token={}&request_id={number_id}&status=reject", self.api_key.reveal());
        let json = self.get_json(&url).await?;
        parse_cancel(&json)
    }
}

fn parse_acquire(json: &Value) -> Result<Acquisition, ProviderApiError> {
    if let (Some(id), Some(number)) = (scalar_string(&json["request_id"]), scalar_string(&json["number"])) {
        return Ok(Acquisition { number_id: id, phone_number: strip_country_prefix(&number) });
    }
    match json["error_code"].as_str() {
        Some("no_numbers") => Err(ProviderApiError::NoStock),
        Some("balance") => Err(ProviderApiError::LowBalance),
        _ => Err(ProviderApiError::upstream(format!("unexpected acquire reply: {json}"))),
    }
}

fn parse_poll(json: &Value) -> Result<Option<String>, ProviderApiError> {
    if let Some(code) = scalar_string(&json["sms_code"]) {
        return Ok(Some(code));
    }
    match json["error_code"].as_str() {
        Some("wait_sms") | None => Ok(None),
        Some("wrong_status") => Err(ProviderApiError::AlreadyCancelled),
        Some(other) => Err(ProviderApiError::upstream(format!("poll rejected: {other}"))),
    }
}

fn parse_cancel(json: &Value) -> Result<CancelOutcome, ProviderApiError> {
    if json["success"].as_bool() == Some(true) {
        return Ok(CancelOutcome::Cancelled);
    }
    // Any structured error here means the activation is no longer cancellable upstream.
    if json["error_code"].is_string() {
        return Ok(CancelOutcome::AlreadyCancelled);
    }
    Err(ProviderApiError::upstream(format!("unexpected cancel reply: {json}")))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn acquire_reply() {
        let acq = parse_acquire(&json!({"request_id": 8812, "number": "919000000002"})).unwrap();
        assert_eq!(acq.number_id, "8812");
        assert_eq!(acq.phone_number, "9000000002");

        assert!(matches!(parse_acquire(&json!({"error_code": "no_numbers"})), Err(ProviderApiError::NoStock)));
        assert!(matches!(parse_acquire(&json!({"error_code": "balance"})), Err(ProviderApiError::LowBalance)));
        assert!(matches!(parse_acquire(&json!({"nonsense": 1})), Err(ProviderApiError::UpstreamError(_))));
    }

    #[test]
    fn poll_reply() {
        assert_eq!(parse_poll(&json!({"sms_code": "987654"})).unwrap(), Some("987654".to_string()));
        assert_eq!(parse_poll(&json!({"error_code": "wait_sms"})).unwrap(), None);
        assert!(matches!(parse_poll(&json!({"error_code": "wrong_status"})), Err(ProviderApiError::AlreadyCancelled)));
    }

    #[test]
    fn cancel_reply() {
        assert_eq!(parse_cancel(&json!({"success": true})).unwrap(), CancelOutcome::Cancelled);
        assert_eq!(parse_cancel(&json!({"error_code": "wrong_status"})).unwrap(), CancelOutcome::AlreadyCancelled);
        assert!(parse_cancel(&json!({"success": false})).is_err());
    }
}
