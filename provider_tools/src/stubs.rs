//! Generic client for the `handler_api.php` ("stubs") protocol shared by FastSMS, SmsHub, Tiger SMS, Grizzly SMS and
//! TempNum. The wire grammar is colon-delimited plain text: `ACCESS_NUMBER:<id>:<number>`, `STATUS_OK:<otp>`,
//! `ACCESS_CANCEL`, and so on. Vendors differ only in base URL, which extra tokens they use to say "already
//! cancelled", and whether they support the deferred "next code" call.
use log::*;
use reqwest::Client;
use smb_common::Secret;

use crate::{
    adapter::{acquire_with_retry, ProviderAdapter},
    config::ProviderProfile,
    types::{strip_country_prefix, AcquireRequest, Acquisition, CancelOutcome},
    ProviderApiError,
};

/// Per-vendor descriptor for the shared grammar. One registered adapter instance per vendor.
#[derive(Debug, Clone, Copy)]
pub struct StubsVendor {
    pub name: &'static str,
    pub base_url: &'static str,
    /// Extra cancel-reply prefixes (beyond `ACCESS_CANCEL`) meaning the activation was already gone.
    pub already_cancelled: &'static [&'static str],
    /// SmsHub wants `operator=any&maxPrice=` on acquire.
    pub price_capped: bool,
    /// Whether a successful poll should schedule the deferred `setStatus=3` "next code" call.
    pub next_otp: bool,
}

impl StubsVendor {
    pub fn fastsms() -> Self {
        Self {
            name: "fastsms",
            base_url: "https://fastsms.su/stubs/handler_api.php",
            already_cancelled: &[],
            price_capped: false,
            next_otp: true,
        }
    }

    pub fn smshub() -> Self {
        Self {
            name: "smshub",
            base_url: "https://smshub.org/stubs/handler_api.php",
            already_cancelled: &[],
            price_capped: true,
            next_otp: true,
        }
    }

    pub fn tigersms() -> Self {
        Self {
            name: "tigersms",
            base_url: "https://api.tiger-sms.com/stubs/handler_api.php",
            already_cancelled: &["BAD_STATUS"],
            price_capped: false,
            next_otp: false,
        }
    }

    pub fn grizzlysms() -> Self {
        Self {
            name: "grizzlysms",
            base_url: "https://api.grizzlysms.com/stubs/handler_api.php",
            already_cancelled: &["BAD_ACTION"],
            price_capped: false,
            next_otp: true,
        }
    }

    pub fn tempnum() -> Self {
        Self {
            name: "tempnum",
            base_url: "https://tempnum.org/stubs/handler_api.php",
            already_cancelled: &["NO_ACTIVATION"],
            price_capped: false,
            next_otp: false,
        }
    }
}

#[derive(Clone)]
pub struct StubsAdapter {
    vendor: StubsVendor,
    api_key: Secret<String>,
    client: Client,
}

impl StubsAdapter {
    pub fn new(vendor: StubsVendor, profile: &ProviderProfile, client: &Client) -> Self {
        Self { vendor, api_key: profile.api_key.clone(), client: client.clone() }
    }

    fn acquire_url(&self, req: &AcquireRequest) -> String {
        let mut url = format!(
            "{}?api_key={}&action=getNumber&service={}",
            self.vendor.base_url,
            self.api_key.reveal(),
            req.service_code
        );
        if self.vendor.price_capped {
            url.push_str("&operator=any");
        }
        url.push_str("&country=22");
        if self.vendor.price_capped {
            if let Some(cap) = req.max_price {
                url.push_str(&format!("&maxPrice={cap}"));
            }
        }
        url
    }

    fn status_url(&self, number_id: &str) -> String {
        format!("{}?api_key={}&action=getStatus&id={number_id}", self.vendor.base_url, self.api_key.reveal())
    }

    fn set_status_url(&self, number_id: &str, status: u8) -> String {
        format!(
            "{}?api_key={}&action=setStatus&status={status}&id={number_id}",
            self.vendor.base_url,
            self.api_key.reveal()
        )
    }

    async fn get_text(&self, url: &str) -> Result<String, ProviderApiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderApiError::upstream(format!("{} returned HTTP {}", self.vendor.name, response.status())));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ProviderApiError::upstream(format!("{} returned an empty response", self.vendor.name)));
        }
        Ok(body)
    }

    /// Best-effort "advance to the next code" call, one second after a successful poll. Failures only get logged;
    /// the poll result is already on its way back to the caller.
    fn spawn_next_otp(&self, number_id: &str) {
        let url = self.set_status_url(number_id, 3);
        let client = self.client.clone();
        let vendor = self.vendor.name;
        let id = number_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            match client.get(&url).send().await {
                Ok(resp) => debug!("📨️ {vendor}: next-code request for {id} returned {}", resp.status()),
                Err(e) => warn!("📨️ {vendor}: next-code request for {id} failed: {e}"),
            }
        });
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for StubsAdapter {
    fn name(&self) -> &'static str {
        self.vendor.name
    }

    async fn acquire(&self, req: &AcquireRequest) -> Result<Acquisition, ProviderApiError> {
        let url = self.acquire_url(req);
        acquire_with_retry(self.vendor.name, || async {
            let body = self.get_text(&url).await?;
            parse_acquire(&body)
        })
        .await
    }

    async fn poll(&self, number_id: &str) -> Result<Option<String>, ProviderApiError> {
        let body = self.get_text(&self.status_url(number_id)).await?;
        let otp = parse_poll(&body)?;
        if otp.is_some() && self.vendor.next_otp {
            self.spawn_next_otp(number_id);
        }
        Ok(otp)
    }

    async fn cancel(&self, number_id: &str) -> Result<CancelOutcome, ProviderApiError> {
        let body = self.get_text(&self.set_status_url(number_id, 8)).await?;
        parse_cancel(&body, &self.vendor)
    }
}

fn parse_acquire(body: &str) -> Result<Acquisition, ProviderApiError> {
    let body = body.trim();
    if let Some(rest) = body.strip_prefix("ACCESS_NUMBER:") {
        let mut parts = rest.splitn(2, ':');
        let id = parts.next().unwrap_or_default().trim();
        let number = parts.next().unwrap_or_default().trim();
        if id.is_empty() || number.is_empty() {
            return Err(ProviderApiError::upstream(format!("malformed ACCESS_NUMBER reply: {body}")));
        }
        return Ok(Acquisition { number_id: id.to_string(), phone_number: strip_country_prefix(number) });
    }
    match body {
        "NO_NUMBERS" => Err(ProviderApiError::NoStock),
        "NO_BALANCE" => Err(ProviderApiError::LowBalance),
        other => Err(ProviderApiError::upstream(format!("unexpected acquire reply: {other}"))),
    }
}

fn parse_poll(body: &str) -> Result<Option<String>, ProviderApiError> {
    let body = body.trim();
    if let Some(otp) = body.strip_prefix("STATUS_OK:") {
        let otp = otp.trim();
        if otp.is_empty() {
            return Ok(None);
        }
        return Ok(Some(otp.to_string()));
    }
    if body.starts_with("STATUS_CANCEL") {
        return Err(ProviderApiError::AlreadyCancelled);
    }
    if body.starts_with("STATUS_WAIT") {
        return Ok(None);
    }
    if body.starts_with("BAD_") || body.starts_with("ERROR") {
        return Err(ProviderApiError::upstream(format!("poll rejected: {body}")));
    }
    // Unknown chatter while waiting is treated as "no code yet".
    Ok(None)
}

fn parse_cancel(body: &str, vendor: &StubsVendor) -> Result<CancelOutcome, ProviderApiError> {
    let body = body.trim();
    if body.starts_with("ACCESS_CANCEL") {
        return Ok(CancelOutcome::Cancelled);
    }
    if body.starts_with("ACCESS_APPROVED") {
        return Ok(CancelOutcome::OtpReceived);
    }
    if vendor.already_cancelled.iter().any(|prefix| body.starts_with(prefix)) {
        return Ok(CancelOutcome::AlreadyCancelled);
    }
    Err(ProviderApiError::upstream(format!("unexpected cancel reply: {body}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acquire_grammar() {
        let acq = parse_acquire("ACCESS_NUMBER:123456:919876543210").unwrap();
        assert_eq!(acq.number_id, "123456");
        assert_eq!(acq.phone_number, "9876543210");

        assert!(matches!(parse_acquire("NO_NUMBERS"), Err(ProviderApiError::NoStock)));
        assert!(matches!(parse_acquire("NO_BALANCE"), Err(ProviderApiError::LowBalance)));
        assert!(matches!(parse_acquire("BAD_KEY"), Err(ProviderApiError::UpstreamError(_))));
        assert!(matches!(parse_acquire("ACCESS_NUMBER:123456:"), Err(ProviderApiError::UpstreamError(_))));
    }

    #[test]
    fn poll_grammar() {
        assert_eq!(parse_poll("STATUS_OK:482913").unwrap(), Some("482913".to_string()));
        assert_eq!(parse_poll("STATUS_WAIT_CODE").unwrap(), None);
        assert_eq!(parse_poll("STATUS_WAIT_RETRY:last").unwrap(), None);
        assert!(matches!(parse_poll("STATUS_CANCEL"), Err(ProviderApiError::AlreadyCancelled)));
        assert!(matches!(parse_poll("BAD_KEY"), Err(ProviderApiError::UpstreamError(_))));
    }

    #[test]
    fn cancel_grammar_per_vendor() {
        let tiger = StubsVendor::tigersms();
        assert_eq!(parse_cancel("ACCESS_CANCEL", &tiger).unwrap(), CancelOutcome::Cancelled);
        assert_eq!(parse_cancel("BAD_STATUS", &tiger).unwrap(), CancelOutcome::AlreadyCancelled);
        assert_eq!(parse_cancel("ACCESS_APPROVED", &tiger).unwrap(), CancelOutcome::OtpReceived);

        let grizzly = StubsVendor::grizzlysms();
        assert_eq!(parse_cancel("BAD_ACTION", &grizzly).unwrap(), CancelOutcome::AlreadyCancelled);

        let tempnum = StubsVendor::tempnum();
        assert_eq!(parse_cancel("NO_ACTIVATION", &tempnum).unwrap(), CancelOutcome::AlreadyCancelled);

        let fastsms = StubsVendor::fastsms();
        assert!(parse_cancel("BAD_ACTION", &fastsms).is_err());
    }
}
