//! PhantomUnion integration. The only vendor with an envelope format: replies arrive as `{code, message, data}` with
//! the payload nested under `data`. Cancellation goes through a separate relay endpoint that answers in plain text.
use reqwest::Client;
use serde::Deserialize;
use smb_common::Secret;

use crate::{
    adapter::{acquire_with_retry, ProviderAdapter},
    config::ProviderProfile,
    types::{strip_country_prefix, AcquireRequest, Acquisition, CancelOutcome},
    ProviderApiError,
};

const BASE_URL: &str = "https://phantomunion.com/api/bird";
const CANCEL_URL: &str = "https://php.paidsms.in/p/ccpay.php";

#[derive(Clone)]
pub struct PhantomApi {
    api_key: Secret<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PhoneEntry {
    #[serde(rename = "serialNumber")]
    serial_number: String,
    number: String,
}

#[derive(Debug, Deserialize, Default)]
struct BuyData {
    #[serde(rename = "phoneNumber", default)]
    phone_number: Vec<PhoneEntry>,
}

#[derive(Debug, Deserialize)]
struct BuyResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: BuyData,
}

#[derive(Debug, Deserialize)]
struct CodeEntry {
    vc: String,
}

#[derive(Debug, Deserialize, Default)]
struct CheckData {
    #[serde(rename = "verificationCode", default)]
    verification_code: Vec<CodeEntry>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    data: CheckData,
}

impl PhantomApi {
    pub fn new(profile: &ProviderProfile, client: &Client) -> Self {
        Self { api_key: profile.api_key.clone(), client: client.clone() }
    }

    async fn get_text(&self, url: &str) -> Result<String, ProviderApiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderApiError::upstream(format!("phantomunion returned HTTP {}", response.status())));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ProviderApiError::upstream("phantomunion returned an empty response".to_string()));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for PhantomApi {
    fn name(&self) -> &'static str {
        "phantomunion"
    }

    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError> {
        let url = format!(
            "{BASE_URL}/buyCandy?token={}&businessCode={}&quantity=1&country=IN&effectiveTime=10",
            self.api_key.reveal(),
            req.service_code
        );
        acquire_with_retry(self.name(), || async {
            let body = self.get_text(&url).await?;
            parse_acquire(&body)
        })
        .await
    }

    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError> {
        let url = format!("{BASE_URL}/sweetWrapper?token={}&serialNumber={number_id}", self.api_key.reveal());
        let body = self.get_text(&url).await?;
        parse_poll(&body)
    }

    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError> {
        let url = format!("{CANCEL_URL}?type=cancel&number={number_id}");
        let body = self.get_text(&url).await?;
        parse_cancel(&body)
    }
}

fn parse_acquire(body: &str) -> Result<Acquisition, ProviderApiError> {
    let trimmed = body.trim();
    let response: BuyResponse = serde_json::from_str(trimmed)
        .map_err(|_| ProviderApiError::upstream(format!("unexpected acquire reply: {trimmed}")))?;
    if response.code != "200" {
        let message = response.message.to_ascii_lowercase();
        if message.contains("balance") {
            return Err(ProviderApiError::LowBalance);
        }
        return Err(ProviderApiError::NoStock);
    }
    let entry = response.data.phone_number.into_iter().next().ok_or(ProviderApiError::NoStock)?;
    Ok(Acquisition { number_id: entry.serial_number, phone_number: strip_country_prefix(&entry.number) })
}

fn parse_poll(body: &str) -> Result<Option<String>, ProviderApiError> {
    let trimmed = body.trim();
    let response: CheckResponse = serde_json::from_str(trimmed)
        .map_err(|_| ProviderApiError::upstream(format!("unexpected poll reply: {trimmed}")))?;
    if response.code != "200" {
        return Err(ProviderApiError::upstream(format!("poll rejected with code {}", response.code)));
    }
    let code = response.data.verification_code.into_iter().next().map(|c| c.vc).filter(|vc| !vc.is_empty());
    Ok(code)
}

fn parse_cancel(body: &str) -> Result<CancelOutcome, ProviderApiError> {
    let trimmed = body.trim();
    if trimmed.to_ascii_lowercase().starts_with("success") {
        return Ok(CancelOutcome::Cancelled);
    }
    if trimmed.to_ascii_lowercase().contains("already") {
        return Ok(CancelOutcome::AlreadyCancelled);
    }
    Err(ProviderApiError::upstream(format!("unexpected cancel reply: {trimmed}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acquire_reply() {
        let body = r#"{
            "code": "200",
            "message": "success",
            "data": {"phoneNumber": [{"serialNumber": "PU-77f1", "number": "+919000000003"}]}
        }"#;
        let acq = parse_acquire(body).unwrap();
        assert_eq!(acq.number_id, "PU-77f1");
        assert_eq!(acq.phone_number, "9000000003");

        let empty = r#"{"code": "200", "message": "success", "data": {"phoneNumber": []}}"#;
        assert!(matches!(parse_acquire(empty), Err(ProviderApiError::NoStock)));

        let broke = r#"{"code": "510", "message": "Insufficient balance", "data": {}}"#;
        assert!(matches!(parse_acquire(broke), Err(ProviderApiError::LowBalance)));

        assert!(matches!(parse_acquire("<html>bad gateway</html>"), Err(ProviderApiError::UpstreamError(_))));
    }

    #[test]
    fn poll_reply() {
        let body = r#"{"code": "200", "data": {"verificationCode": [{"vc": "445566"}]}}"#;
        assert_eq!(parse_poll(body).unwrap(), Some("445566".to_string()));

        let waiting = r#"{"code": "200", "data": {"verificationCode": [{"vc": ""}]}}"#;
        assert_eq!(parse_poll(waiting).unwrap(), None);

        let none = r#"{"code": "200", "data": {"verificationCode": []}}"#;
        assert_eq!(parse_poll(none).unwrap(), None);

        assert!(parse_poll(r#"{"code": "403", "data": {}}"#).is_err());
    }

    #[test]
    fn cancel_reply() {
        assert_eq!(parse_cancel("success").unwrap(), CancelOutcome::Cancelled);
        assert_eq!(parse_cancel("Number already cancelled").unwrap(), CancelOutcome::AlreadyCancelled);
        assert!(parse_cancel("error").is_err());
    }
}
