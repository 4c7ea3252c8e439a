//! 5sim integration. Bearer-token auth, JSON replies. Activation ids are numeric in the JSON but travel as strings
//! through the rest of the system.
use reqwest::Client;
use serde::Deserialize;
use smb_common::Secret;

use crate::{
    adapter::{acquire_with_retry, ProviderAdapter},
    config::ProviderProfile,
    types::{strip_country_prefix, AcquireRequest, Acquisition, CancelOutcome},
    ProviderApiError,
};

const BASE_URL: &str = "https://5sim.net/v1";

#[derive(Clone)]
pub struct FiveSimApi {
    api_key: Secret<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BuyResponse {
    id: serde_json::Value,
    phone: String,
}

#[derive(Debug, Deserialize)]
struct SmsEntry {
    date: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    sms: Vec<SmsEntry>,
}

impl FiveSimApi {
    pub fn new(profile: &ProviderProfile, client: &Client) -> Self {
        Self { api_key: profile.api_key.clone(), client: client.clone() }
    }

    async fn get_text(&self, url: &str) -> Result<String, ProviderApiError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.reveal())
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ProviderApiError::upstream(format!("5sim returned an empty response ({status})")));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for FiveSimApi {
    fn name(&self) -> &'static str {
        "5sim"
    }

    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError> {
        let url = format!("{BASE_URL}/user/buy/activation/india/virtual21/{}", req.service_code);
        acquire_with_retry(self.name(), || async {
            let body = self.get_text(&url).await?;
            parse_acquire(&body)
        })
        .await
    }

    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError> {
        let url = format!("{BASE_URL}/user/check/{number_id}");
        let body = self.get_text(&url).await?;
        parse_poll(&body)
    }

    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError> {
        let url = format!("{BASE_URL}/user/cancel/{number_id}");
        let body = self.get_text(&url).await?;
        parse_cancel(&body)
    }
}

fn parse_acquire(body: &str) -> Result<Acquisition, ProviderApiError> {
    let trimmed = body.trim();
    match trimmed {
        "no free phones" => return Err(ProviderApiError::NoStock),
        "not enough user balance" => return Err(ProviderApiError::LowBalance),
        _ => {},
    }
    let response: BuyResponse = serde_json::from_str(trimmed)
        .map_err(|_| ProviderApiError::upstream(format!("unexpected acquire reply: {trimmed}")))?;
    let id = json_id(&response.id)
        .ok_or_else(|| ProviderApiError::upstream(format!("acquire reply without an id: {trimmed}")))?;
    Ok(Acquisition { number_id: id, phone_number: strip_country_prefix(&response.phone) })
}

fn parse_poll(body: &str) -> Result<Option<String>, ProviderApiError> {
    let response: CheckResponse = serde_json::from_str(body.trim())
        .map_err(|_| ProviderApiError::upstream(format!("unexpected poll reply: {}", body.trim())))?;
    if response.status == "CANCELED" {
        return Err(ProviderApiError::AlreadyCancelled);
    }
    // Latest message wins; dates are ISO-8601 so lexicographic order matches chronological order.
    let latest = response.sms.into_iter().max_by(|a, b| a.date.cmp(&b.date));
    Ok(latest.map(|sms| sms.text))
}

fn parse_cancel(body: &str) -> Result<CancelOutcome, ProviderApiError> {
    let trimmed = body.trim();
    if trimmed.contains("order has sms") {
        return Ok(CancelOutcome::OtpReceived);
    }
    if let Ok(response) = serde_json::from_str::<CheckResponse>(trimmed) {
        return match response.status.as_str() {
            "CANCELED" => Ok(CancelOutcome::Cancelled),
            "order has sms" => Ok(CancelOutcome::OtpReceived),
            other => Err(ProviderApiError::upstream(format!("unexpected cancel status: {other}"))),
        };
    }
    Err(ProviderApiError::upstream(format!("unexpected cancel reply: {trimmed}")))
}

fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
