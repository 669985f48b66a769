/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Identity provider client for the OAuth2 authorization-code grant.
//!
//! Each login attempt is a single pass: discover endpoints, redirect out with
//! a stored state nonce + PKCE pair, exchange the returned code for an access
//! token, fetch the profile claims with that token. The access token is a
//! plain return value threaded from `request_token` into `fetch_profile`;
//! nothing about an attempt lives on shared mutable state.

use oauth2::{CsrfToken, PkceCodeChallenge};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use std::error::Error;
use std::fmt;
use tracing::error;

/// Scopes requested from the provider, space-separated per RFC 6749.
pub const SCOPES: &str = "openid email profile";

/// Query parameters Google sends back on the callback leg.
///
/// `code` is absent when the visitor refuses the consent screen; Google then
/// sends `error=access_denied` alongside the original `state`.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub state: String,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// A stored login attempt, keyed by its state nonce.
pub struct OAuthRequest {
    pub csrf_state: String,
    pub pkce_challenge: String,
    pub pkce_verifier: String,
}

/// The provider's well-known discovery document, reduced to the three
/// endpoints this flow touches.
#[derive(Debug, Deserialize)]
pub struct DiscoveryDocument {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

/// Successful token-endpoint response.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u32>,
}

/// Profile claims from the userinfo endpoint. `email_verified` is gated
/// before this struct is ever produced, so a value here is always verified.
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileClaims {
    pub sub: String,
    pub email: String,
    pub picture: String,
    pub given_name: String,
}

#[derive(Debug)]
pub enum AuthError {
    /// The one modeled rejection of the flow: `email_verified` false or absent.
    ProfileUnverified,
    /// Callback state does not match a stored login attempt (or was replayed).
    StateNotFound,
    /// Provider unreachable or a malformed discovery/userinfo response.
    Provider(String),
    /// The token endpoint refused the code, or returned an error body.
    TokenExchange(String),
    /// The state-nonce store failed.
    Store(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::ProfileUnverified => {
                write!(f, "User email not available or not verified by Google.")
            }
            AuthError::StateNotFound => write!(f, "Unknown or already used login attempt"),
            AuthError::Provider(e) => write!(f, "Identity provider error: {}", e),
            AuthError::TokenExchange(e) => write!(f, "Token exchange failed: {}", e),
            AuthError::Store(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl Error for AuthError {}

/// Fetch the provider discovery document.
///
/// Called fresh on every `/login` and every callback; the document is never
/// cached, so an endpoint rotation on the provider side is picked up
/// immediately.
pub async fn fetch_discovery(discovery_url: &str) -> Result<DiscoveryDocument, AuthError> {
    let client = Client::new();
    let response = client
        .get(discovery_url)
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("discovery request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(AuthError::Provider(format!(
            "discovery endpoint returned {status}"
        )));
    }

    response
        .json::<DiscoveryDocument>()
        .await
        .map_err(|e| AuthError::Provider(format!("failed to parse discovery document: {e}")))
}

/// Generate a state nonce and PKCE pair for a new login attempt and persist
/// them so the callback leg can correlate the redirect.
pub async fn generate_and_store_oauth_request(
    pool: &PgPool,
) -> Result<(CsrfToken, PkceCodeChallenge), AuthError> {
    let csrf_state = CsrfToken::new_random();
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    sqlx::query(
        "INSERT INTO oauth_requests (pkce_challenge, pkce_verifier, csrf_state)
         VALUES ($1, $2, $3)",
    )
    .bind(pkce_challenge.as_str())
    .bind(pkce_verifier.secret())
    .bind(csrf_state.secret())
    .execute(pool)
    .await
    .map_err(|e| AuthError::Store(e.to_string()))?;

    Ok((csrf_state, pkce_challenge))
}

/// Look up and consume the login attempt for a callback's state parameter.
///
/// The row is deleted as it is read: a state nonce correlates exactly one
/// redirect-out with one redirect-back, so a replayed callback fails with
/// `StateNotFound`.
pub async fn fetch_oauth_request(pool: &PgPool, state: &str) -> Result<OAuthRequest, AuthError> {
    let row = sqlx::query_as::<_, (String, String, String)>(
        "DELETE FROM oauth_requests WHERE csrf_state = $1
         RETURNING csrf_state, pkce_challenge, pkce_verifier",
    )
    .bind(state)
    .fetch_optional(pool)
    .await
    .map_err(|e| AuthError::Store(e.to_string()))?
    .ok_or(AuthError::StateNotFound)?;

    Ok(OAuthRequest {
        csrf_state: row.0,
        pkce_challenge: row.1,
        pkce_verifier: row.2,
    })
}

/// Craft the authorization-endpoint redirect URL for a login attempt.
pub fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_url: &str,
    state: &str,
    pkce_challenge: &str,
) -> String {
    let params = [
        ("client_id", client_id),
        ("redirect_uri", redirect_url),
        ("response_type", "code"),
        ("scope", SCOPES),
        ("state", state),
        ("code_challenge", pkce_challenge),
        ("code_challenge_method", "S256"),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", authorization_endpoint, query)
}

/// Exchange an authorization code for an access token.
///
/// The response is rejected on a non-success status *and* on an `error` field
/// in the body: Google can return `{"error": "invalid_grant"}` under HTTP 200,
/// and treating that as a bearer token would only fail later at the userinfo
/// endpoint with a much less useful message.
pub async fn request_token(
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    redirect_url: &str,
    pkce_verifier: &str,
    authorization_code: &str,
) -> Result<TokenResponse, AuthError> {
    let client = Client::new();
    let params = [
        ("grant_type", "authorization_code"),
        ("code", authorization_code),
        ("redirect_uri", redirect_url),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("code_verifier", pkce_verifier),
    ];

    let response = client
        .post(token_endpoint)
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Provider(format!("failed to read token response: {e}")))?;

    if !status.is_success() {
        error!("OAuth token request failed. Status: {status}, Body: {body}");
        return Err(AuthError::TokenExchange(format!(
            "token endpoint returned {status}"
        )));
    }

    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AuthError::Provider(format!("failed to parse token response: {e}")))?;

    if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
        error!("OAuth token response carried an error field: {err}");
        return Err(AuthError::TokenExchange(err.to_string()));
    }

    serde_json::from_value(value)
        .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))
}

/// Fetch the authenticated user's profile claims with this attempt's token.
///
/// `email_verified` is checked on the raw body before the claims are
/// deserialized, so a false *or absent* flag always surfaces as
/// `ProfileUnverified` rather than as a shape error.
pub async fn fetch_profile(
    userinfo_endpoint: &str,
    access_token: &str,
) -> Result<ProfileClaims, AuthError> {
    let client = Client::new();
    let response = client
        .get(userinfo_endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("userinfo request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(AuthError::Provider(format!(
            "userinfo endpoint returned {status}"
        )));
    }

    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("failed to parse userinfo response: {e}")))?;

    let verified = value
        .get("email_verified")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !verified {
        return Err(AuthError::ProfileUnverified);
    }

    serde_json::from_value(value)
        .map_err(|e| AuthError::Provider(format!("malformed userinfo response: {e}")))
}
