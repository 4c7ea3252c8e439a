use thiserror::Error;

/// Normalized error surface for all nine vendor integrations. Callers never see vendor response text for the
/// business outcomes; `UpstreamError` carries detail for logs only.
#[derive(Debug, Clone, Error)]
pub enum ProviderApiError {
    #[error("No numbers available. Please try a different server.")]
    NoStock,
    #[error("The upstream vendor account has insufficient balance")]
    LowBalance,
    #[error("The activation was already cancelled upstream")]
    AlreadyCancelled,
    #[error("An OTP has already been received for this activation")]
    OtpAlreadyReceived,
    #[error("Upstream vendor error: {0}")]
    UpstreamError(String),
    #[error("Could not initialize provider client: {0}")]
    Initialization(String),
}

impl ProviderApiError {
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamError(msg.into())
    }

    /// Transient failures are worth one retry on acquire; business outcomes are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamError(_))
    }
}

impl From<reqwest::Error> for ProviderApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamError(e.to_string())
    }
}
