use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use smb_common::{Secret, ServerId};
use thiserror::Error;

/// Which vendor integration a server slot is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderCode {
    FastSms,
    FiveSim,
    SmsHub,
    TigerSms,
    GrizzlySms,
    TempNum,
    SmsMan,
    SmsManMulti,
    PhantomUnion,
}

impl Display for ProviderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderCode::FastSms => "fastsms",
            ProviderCode::FiveSim => "5sim",
            ProviderCode::SmsHub => "smshub",
            ProviderCode::TigerSms => "tigersms",
            ProviderCode::GrizzlySms => "grizzlysms",
            ProviderCode::TempNum => "tempnum",
            ProviderCode::SmsMan => "smsman",
            ProviderCode::SmsManMulti => "smsman_multi",
            ProviderCode::PhantomUnion => "phantomunion",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown provider code: {0}")]
pub struct UnknownProvider(String);

impl FromStr for ProviderCode {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastsms" => Ok(Self::FastSms),
            "5sim" | "fivesim" => Ok(Self::FiveSim),
            "smshub" => Ok(Self::SmsHub),
            "tigersms" => Ok(Self::TigerSms),
            "grizzlysms" => Ok(Self::GrizzlySms),
            "tempnum" => Ok(Self::TempNum),
            "smsman" => Ok(Self::SmsMan),
            "smsman_multi" => Ok(Self::SmsManMulti),
            "phantomunion" => Ok(Self::PhantomUnion),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Static per-vendor descriptor used to build the adapter registry at startup. Not persisted state: the api key
/// comes from the server configuration table, everything else is derived from the provider code.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub server: ServerId,
    pub provider: ProviderCode,
    pub api_key: Secret<String>,
}

impl ProviderProfile {
    pub fn new(server: ServerId, provider: ProviderCode, api_key: Secret<String>) -> Self {
        Self { server, provider, api_key }
    }
}
