use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use std::fmt;
use std::sync::Arc;

use crate::models::user::{NewUser, User};
use crate::store::Store;

// ── Client IP request guard ──

/// Extracts the real client IP from the request.
/// Checks headers in priority order:
///   1. CF-Connecting-IP (Cloudflare)
///   2. True-Client-IP (Cloudflare Enterprise / Akamai)
///   3. X-Real-IP (nginx proxy_set_header)
///   4. X-Forwarded-For (first IP in the chain = original client)
///   5. Rocket's client_ip() (socket peer address)
pub struct ClientIp(pub String);

const CLIENT_IP_HEADERS: &[&str] = &["CF-Connecting-IP", "True-Client-IP", "X-Real-IP"];

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        for name in CLIENT_IP_HEADERS {
            if let Some(ip) = headers.get_one(name).map(str::trim) {
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        // X-Forwarded-For: client, proxy1, proxy2; take the leftmost
        if let Some(ip) = headers
            .get_one("X-Forwarded-For")
            .and_then(|f| f.split(',').next())
            .map(str::trim)
        {
            if !ip.is_empty() {
                return Outcome::Success(ClientIp(ip.to_string()));
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

// ── Identity provider ──

/// A verified sign-in, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
    /// The provider could not be reached or answered unexpectedly.
    Unavailable(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "no bearer token"),
            AuthError::InvalidToken(why) => write!(f, "invalid token: {}", why),
            AuthError::Unavailable(why) => write!(f, "identity provider unavailable: {}", why),
        }
    }
}

/// Resolves bearer ID tokens and manages the provider-side account.
/// Calls block; run them off the async executor.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, id_token: &str) -> Result<Identity, AuthError>;
    fn update_display_name(&self, id_token: &str, display_name: &str) -> Result<(), AuthError>;
    fn delete_account(&self, id_token: &str) -> Result<(), AuthError>;
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Local account for a verified identity, created on first sign-in.
pub fn find_or_create_user(store: &dyn Store, identity: &Identity) -> Result<User, String> {
    if let Some(user) = store.user_get_by_firebase_uid(&identity.uid) {
        if let Err(e) = store.user_touch_last_login(user.id) {
            log::warn!("[auth] last login update failed for user {}: {}", user.id, e);
        }
        return Ok(user);
    }

    let new = NewUser::from_identity(&identity.uid, &identity.email, &identity.display_name);
    let id = match store.user_create(&new) {
        Ok(id) => id,
        // Lost a race with a concurrent first request from the same account
        Err(e) => match store.user_get_by_firebase_uid(&identity.uid) {
            Some(user) => return Ok(user),
            None => return Err(e),
        },
    };
    log::info!("[auth] created user {} for uid {}", id, identity.uid);
    store
        .user_get_by_id(id)
        .ok_or_else(|| format!("user {} vanished after create", id))
}

/// Verify a token and load (or create) the matching user.
pub fn authenticate(
    store: &dyn Store,
    verifier: &dyn IdentityVerifier,
    id_token: &str,
) -> Result<(User, Identity), AuthError> {
    let identity = verifier.verify(id_token)?;
    let user = find_or_create_user(store, &identity).map_err(AuthError::Unavailable)?;
    Ok((user, identity))
}

// ── Authenticated user guard ──

/// Guard: a request carrying a valid ID token.
pub struct AuthenticatedUser {
    pub user: User,
    pub identity: Identity,
    pub token: String,
}

async fn resolve_user(request: &Request<'_>) -> Result<AuthenticatedUser, AuthError> {
    let token = request
        .headers()
        .get_one("Authorization")
        .and_then(bearer_token)
        .ok_or(AuthError::MissingToken)?
        .to_string();

    let store = request
        .guard::<&State<Arc<dyn Store>>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Unavailable("store not managed".into()))?
        .inner()
        .clone();
    let verifier = request
        .guard::<&State<Arc<dyn IdentityVerifier>>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Unavailable("verifier not managed".into()))?
        .inner()
        .clone();

    let tok = token.clone();
    let (user, identity) =
        rocket::tokio::task::spawn_blocking(move || authenticate(&*store, &*verifier, &tok))
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))??;

    Ok(AuthenticatedUser {
        user,
        identity,
        token,
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_user(request).await {
            Ok(auth) => Outcome::Success(auth),
            Err(AuthError::MissingToken) => Outcome::Forward(Status::Unauthorized),
            Err(e) => {
                log::debug!("[auth] rejected request to {}: {}", request.uri(), e);
                Outcome::Forward(Status::Unauthorized)
            }
        }
    }
}

/// Guard: signed in if a valid token is present, anonymous otherwise.
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_user(request).await {
            Ok(auth) => Outcome::Success(OptionalUser(Some(auth))),
            Err(AuthError::MissingToken) => Outcome::Success(OptionalUser(None)),
            Err(e) => {
                log::debug!("[auth] continuing anonymously: {}", e);
                Outcome::Success(OptionalUser(None))
            }
        }
    }
}

/// Guard: requires an active premium subscription.
pub struct PremiumUser(pub AuthenticatedUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PremiumUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.guard::<AuthenticatedUser>().await {
            Outcome::Success(auth) if auth.user.is_premium() => {
                Outcome::Success(PremiumUser(auth))
            }
            Outcome::Success(_) => Outcome::Forward(Status::Forbidden),
            Outcome::Forward(s) => Outcome::Forward(s),
            Outcome::Error(e) => Outcome::Error(e),
        }
    }
}
