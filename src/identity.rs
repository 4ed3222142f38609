//! Verification of the signed identity assertion ("init data") that the chat
//! platform hands to the mini-app.
//!
//! The assertion is a URL-encoded list of `key=value` pairs. One of them,
//! `hash`, is the hex HMAC-SHA256 of the remaining pairs sorted by key and
//! joined with `\n`, keyed with `HMAC_SHA256(key = "WebAppData", msg = bot_token)`.

use std::collections::BTreeMap;
use std::fmt;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

const SECRET_KEY_SALT: &[u8] = b"WebAppData";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity assertion is empty")]
    Empty,
    #[error("identity assertion has no hash")]
    MissingHash,
    #[error("identity assertion hash is not valid hex")]
    MalformedHash,
    #[error("identity assertion signature mismatch")]
    SignatureMismatch,
    #[error("identity assertion carries no user")]
    MissingUser,
    #[error("identity assertion user is malformed: {0}")]
    MalformedUser(String),
}

/// The `user` object embedded in the assertion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifiedInitData {
    pub user: WebAppUser,
    /// Parsed but not enforced; assertions do not expire.
    pub auth_date: Option<i64>,
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any length");
    mac.update(message);
    mac
}

/// Builds the `key=value\n...` string that is signed, excluding `hash`.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: Vec<u8>,
}

impl fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitDataVerifier").finish_non_exhaustive()
    }
}

impl InitDataVerifier {
    pub fn new(bot_token: &str) -> Self {
        let secret_key = hmac_sha256(SECRET_KEY_SALT, bot_token.as_bytes())
            .finalize()
            .into_bytes()
            .to_vec();
        Self { secret_key }
    }

    /// Checks the signature and extracts the user.
    pub fn verify(&self, init_data: &str) -> Result<VerifiedInitData, IdentityError> {
        if init_data.trim().is_empty() {
            return Err(IdentityError::Empty);
        }

        let mut fields: BTreeMap<String, String> = form_urlencoded::parse(init_data.as_bytes())
            .into_owned()
            .collect();
        let hash = fields.remove("hash").ok_or(IdentityError::MissingHash)?;
        let expected = hex::decode(hash.trim()).map_err(|_| IdentityError::MalformedHash)?;

        hmac_sha256(&self.secret_key, data_check_string(&fields).as_bytes())
            .verify_slice(&expected)
            .map_err(|_| IdentityError::SignatureMismatch)?;

        let user = fields.get("user").ok_or(IdentityError::MissingUser)?;
        let user: WebAppUser = serde_json::from_str(user)
            .map_err(|e| IdentityError::MalformedUser(e.to_string()))?;
        let auth_date = fields.get("auth_date").and_then(|date| date.parse().ok());

        Ok(VerifiedInitData { user, auth_date })
    }

    /// Produces a signed assertion from `pairs`. Used by tests to play the
    /// role of the chat platform.
    #[cfg(test)]
    pub fn sign(&self, pairs: &[(&str, &str)]) -> String {
        let fields: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let hash = hex::encode(
            hmac_sha256(&self.secret_key, data_check_string(&fields).as_bytes())
                .finalize()
                .into_bytes(),
        );

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("hash", &hash);
        serializer.finish()
    }
}
