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

use actix_web::{
    cookie::{
        time::{Duration, OffsetDateTime},
        Cookie, SameSite,
    },
    error, web, Error, HttpRequest, HttpResponse,
};
use reqwest::header::LOCATION;
use sqlx::PgPool;
use tracing::{error as log_error, info};

use crate::auth::{
    build_authorization_url, fetch_discovery, fetch_oauth_request, fetch_profile,
    generate_and_store_oauth_request, request_token, AuthError, AuthRequest,
};
use crate::models::session::REMEMBER_DAYS;
use crate::models::{AppConfig, Session, User};

/// Cookie holding the session row id.
pub const SESSION_COOKIE: &str = "session";

/// Map a flow error onto its HTTP response class.
///
/// The unverified-email rejection and a state-correlation miss are the
/// visitor's fault (400); provider trouble is a gateway failure (502); the
/// nonce store is ours (500).
fn auth_error_response(err: AuthError) -> Error {
    log_error!("{:?}", err);
    match err {
        AuthError::ProfileUnverified | AuthError::StateNotFound => {
            error::ErrorBadRequest(err.to_string())
        }
        AuthError::Provider(_) | AuthError::TokenExchange(_) => {
            error::ErrorBadGateway(err.to_string())
        }
        AuthError::Store(_) => error::ErrorInternalServerError(err.to_string()),
    }
}

/// Resolve the current request's identity via the session cookie, if any.
async fn current_user(req: &HttpRequest, pool: &PgPool) -> Result<Option<User>, Error> {
    let session_id = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return Ok(None),
    };

    let session = Session::find_valid(pool, &session_id).await.map_err(|e| {
        log_error!("{:?}", e);
        error::ErrorInternalServerError(e.to_string())
    })?;

    let session = match session {
        Some(session) => session,
        None => return Ok(None),
    };

    User::find_by_id(pool, &session.user_id).await.map_err(|e| {
        log_error!("{:?}", e);
        error::ErrorInternalServerError(e.to_string())
    })
}

/// `GET /` -- authenticated greeting or a login link.
pub async fn home(req: HttpRequest, pool: web::Data<PgPool>) -> Result<HttpResponse, Error> {
    match current_user(&req, &pool).await? {
        Some(user) => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(format!(
                "<h4>Hello, {}! You're logged in!</h4>\
                 <h5>Email: {}</h5>\
                 <a class=\"button\" href=\"/logout\">Logout</a>",
                user.fullname, user.email
            ))),
        None => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body("<a class=\"button\" href=\"/login\">Login with Google</a>")),
    }
}

/// `GET /login` -- initiate the authorization-code grant.
pub async fn login(
    pool: web::Data<PgPool>,
    cfg: web::Data<AppConfig>,
) -> Result<HttpResponse, Error> {
    // 1. Discover the provider endpoints (fetched fresh, never cached).
    let discovery = fetch_discovery(&cfg.oauth_discovery_url)
        .await
        .map_err(auth_error_response)?;

    // 2. Generate and store the per-attempt state nonce and PKCE pair.
    let (csrf_token, pkce_challenge) = generate_and_store_oauth_request(&pool)
        .await
        .map_err(auth_error_response)?;

    // 3. Craft the OAuth login URL.
    let oauth_login_url = build_authorization_url(
        &discovery.authorization_endpoint,
        &cfg.oauth_client_id,
        &cfg.oauth_redirect_url,
        csrf_token.secret(),
        pkce_challenge.as_str(),
    );

    // 4. Redirect the browser to the provider.
    let mut response = HttpResponse::Found();
    response.append_header((LOCATION, oauth_login_url));
    Ok(response.finish())
}

/// `GET /login/callback` -- the provider redirected back with code + state.
pub async fn login_callback(
    pool: web::Data<PgPool>,
    info: web::Query<AuthRequest>,
    cfg: web::Data<AppConfig>,
) -> Result<HttpResponse, Error> {
    // 1. Correlate the state nonce with a stored login attempt (consumes it).
    let oauth_request = fetch_oauth_request(&pool, &info.state)
        .await
        .map_err(auth_error_response)?;

    // 2. No code means the visitor refused the consent screen. The nonce is
    //    already consumed above, so the abandoned attempt cannot be replayed.
    let code = match info.code.as_deref() {
        Some(code) => code,
        None => {
            let reason = info.error.as_deref().unwrap_or("access_denied");
            info!("Login attempt denied at the provider: {reason}");
            return Err(error::ErrorBadRequest(
                "Login was cancelled at the Google consent screen.",
            ));
        }
    };

    // 3. Discover the provider endpoints again for this leg.
    let discovery = fetch_discovery(&cfg.oauth_discovery_url)
        .await
        .map_err(auth_error_response)?;

    // 4. Exchange the authorization code for an access token.
    let token = request_token(
        &discovery.token_endpoint,
        &cfg.oauth_client_id,
        &cfg.oauth_secret,
        &cfg.oauth_redirect_url,
        &oauth_request.pkce_verifier,
        code,
    )
    .await
    .map_err(auth_error_response)?;

    // 5. Fetch the profile claims with this attempt's token.
    let claims = fetch_profile(&discovery.userinfo_endpoint, &token.access_token)
        .await
        .map_err(auth_error_response)?;

    // 6. Upsert the identity record.
    let user = User::upsert(
        &pool,
        &claims.sub,
        &claims.given_name,
        &claims.email,
        &claims.picture,
    )
    .await
    .map_err(|e| {
        log_error!("{:?}", e);
        error::ErrorInternalServerError(e.to_string())
    })?;

    // 7. Establish the login session.
    let session = Session::create(&pool, &user.id).await.map_err(|e| {
        log_error!("{:?}", e);
        error::ErrorInternalServerError(e.to_string())
    })?;

    info!("Login completed for subject {}", user.id);

    let cookie = Cookie::build(SESSION_COOKIE, session.id.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .expires(OffsetDateTime::now_utc().checked_add(Duration::days(REMEMBER_DAYS)))
        .finish();

    // 8. Send the cookie and redirect the browser back home.
    let mut response = HttpResponse::Found();
    response.append_header((LOCATION, "/"));
    response.cookie(cookie);
    Ok(response.finish())
}

/// `GET /logout` -- clear the session. Rejected without a live one.
pub async fn logout(req: HttpRequest, pool: web::Data<PgPool>) -> Result<HttpResponse, Error> {
    let session_id = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| error::ErrorUnauthorized("Login required."))?;

    let session = Session::find_valid(&pool, &session_id)
        .await
        .map_err(|e| {
            log_error!("{:?}", e);
            error::ErrorInternalServerError(e.to_string())
        })?
        .ok_or_else(|| error::ErrorUnauthorized("Login required."))?;

    Session::delete(&pool, &session.id).await.map_err(|e| {
        log_error!("{:?}", e);
        error::ErrorInternalServerError(e.to_string())
    })?;

    // Expire the cookie along with the row.
    let removal = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .expires(OffsetDateTime::now_utc().checked_sub(Duration::days(1)))
        .finish();

    let mut response = HttpResponse::Found();
    response.append_header((LOCATION, "/"));
    response.cookie(removal);
    Ok(response.finish())
}
