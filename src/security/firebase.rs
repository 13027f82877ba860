use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use std::time::Duration;

use super::auth::{AuthError, Identity, IdentityVerifier};
use crate::config::FirebaseConfig;

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firebase Authentication over the Identity Toolkit REST API.
///
/// Tokens are screened locally (audience, issuer, expiry) before the
/// `accounts:lookup` call resolves them to an account.
pub struct FirebaseVerifier {
    project_id: String,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl FirebaseVerifier {
    pub fn new(config: &FirebaseConfig) -> Result<Self, AuthError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Unavailable(format!("HTTP client error: {}", e)))?;
        Ok(FirebaseVerifier {
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn call(&self, method: &str, body: &Value) -> Result<Value, AuthError> {
        let url = format!("{}/accounts:{}?key={}", IDENTITY_TOOLKIT, method, self.api_key);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| AuthError::Unavailable(format!("Firebase request failed: {}", e)))?;

        let status = resp.status();
        let json: Value = resp
            .json()
            .map_err(|e| AuthError::Unavailable(format!("Firebase JSON parse error: {}", e)))?;

        if status.is_client_error() {
            let message = json["error"]["message"].as_str().unwrap_or("rejected");
            return Err(AuthError::InvalidToken(message.to_string()));
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("Firebase returned {}", status)));
        }
        Ok(json)
    }
}

/// Check the unverified claims of a Firebase ID token against a project.
pub fn check_claims(id_token: &str, project_id: &str, now: i64) -> Result<(), AuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("malformed token".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::InvalidToken("malformed payload".into()))?;
    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::InvalidToken("malformed claims".into()))?;

    if claims["aud"].as_str() != Some(project_id) {
        return Err(AuthError::InvalidToken("wrong audience".into()));
    }
    let issuer = format!("https://securetoken.google.com/{}", project_id);
    if claims["iss"].as_str() != Some(issuer.as_str()) {
        return Err(AuthError::InvalidToken("wrong issuer".into()));
    }
    match claims["exp"].as_i64() {
        Some(exp) if exp > now => Ok(()),
        _ => Err(AuthError::InvalidToken("expired".into())),
    }
}

impl IdentityVerifier for FirebaseVerifier {
    fn verify(&self, id_token: &str) -> Result<Identity, AuthError> {
        check_claims(id_token, &self.project_id, chrono::Utc::now().timestamp())?;

        let json = self.call("lookup", &json!({ "idToken": id_token }))?;
        let account = json
            .get("users")
            .and_then(|u| u.get(0))
            .ok_or_else(|| AuthError::InvalidToken("unknown account".into()))?;

        let field = |name: &str| account[name].as_str().unwrap_or("").to_string();
        let uid = field("localId");
        if uid.is_empty() {
            return Err(AuthError::InvalidToken("account without uid".into()));
        }
        Ok(Identity {
            uid,
            email: field("email"),
            display_name: field("displayName"),
        })
    }

    fn update_display_name(&self, id_token: &str, display_name: &str) -> Result<(), AuthError> {
        self.call(
            "update",
            &json!({ "idToken": id_token, "displayName": display_name, "returnSecureToken": false }),
        )?;
        Ok(())
    }

    fn delete_account(&self, id_token: &str) -> Result<(), AuthError> {
        self.call("delete", &json!({ "idToken": id_token }))?;
        Ok(())
    }
}
