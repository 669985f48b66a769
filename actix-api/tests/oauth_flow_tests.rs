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
 */

//! Integration tests for the identity-provider client.
//!
//! These tests run the **real** client functions from `login_api::auth`
//! against an in-process fake provider that serves a discovery document, a
//! token endpoint and a userinfo endpoint on localhost.
//!
//! Verified scenarios:
//! - The discovery document resolves to the advertised endpoints
//! - A valid code exchange yields the access token
//! - Error statuses *and* `error` bodies under HTTP 200 are rejected
//! - `email_verified` false or missing rejects the profile
//! - An unreachable provider surfaces as a provider error

use actix_web::{web, App, HttpResponse, HttpServer};
use login_api::auth::{fetch_discovery, fetch_profile, request_token, AuthError};
use serde_json::{json, Value};
use serial_test::serial;
use std::time::Duration;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Canned responses served by the fake provider.
#[derive(Clone)]
struct FakeProvider {
    base_url: String,
    token_status: u16,
    token_body: Value,
    userinfo_body: Value,
}

async fn discovery_doc(provider: web::Data<FakeProvider>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "authorization_endpoint": format!("{}/auth", provider.base_url),
        "token_endpoint": format!("{}/token", provider.base_url),
        "userinfo_endpoint": format!("{}/userinfo", provider.base_url),
    }))
}

async fn token_endpoint(provider: web::Data<FakeProvider>) -> HttpResponse {
    HttpResponse::build(
        actix_web::http::StatusCode::from_u16(provider.token_status).unwrap(),
    )
    .json(provider.token_body.clone())
}

async fn userinfo_endpoint(provider: web::Data<FakeProvider>) -> HttpResponse {
    HttpResponse::Ok().json(provider.userinfo_body.clone())
}

/// Start the fake provider on the given port and return its base URL.
async fn start_fake_provider(port: u16, token_status: u16, token_body: Value, userinfo_body: Value) {
    let provider = FakeProvider {
        base_url: format!("http://127.0.0.1:{port}"),
        token_status,
        token_body,
        userinfo_body,
    };

    actix_rt::spawn(async move {
        let _ = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(provider.clone()))
                .service(web::resource(DISCOVERY_PATH).route(web::get().to(discovery_doc)))
                .service(web::resource("/token").route(web::post().to(token_endpoint)))
                .service(web::resource("/userinfo").route(web::get().to(userinfo_endpoint)))
        })
        .bind(format!("127.0.0.1:{port}"))
        .expect("Failed to bind fake provider")
        .run()
        .await;
    });

    wait_for_provider(port).await.unwrap();
}

async fn wait_for_provider(port: u16) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{port}{DISCOVERY_PATH}");
    for _ in 0..50 {
        if reqwest::get(&url).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("Fake provider not ready after 5 seconds on port {port}")
}

fn discovery_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}{DISCOVERY_PATH}")
}

fn good_token_body() -> Value {
    json!({"access_token": "T1", "token_type": "Bearer", "expires_in": 3599})
}

fn verified_userinfo_body() -> Value {
    json!({
        "sub": "u1",
        "email": "a@x.com",
        "email_verified": true,
        "picture": "http://p/1.png",
        "given_name": "Ada",
    })
}

// =========================================================================
// Discovery
// =========================================================================

#[actix_rt::test]
#[serial]
async fn discovery_document_resolves_endpoints() {
    let port = 18100;
    start_fake_provider(port, 200, good_token_body(), verified_userinfo_body()).await;

    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();
    assert_eq!(
        discovery.authorization_endpoint,
        format!("http://127.0.0.1:{port}/auth")
    );
    assert_eq!(discovery.token_endpoint, format!("http://127.0.0.1:{port}/token"));
    assert_eq!(
        discovery.userinfo_endpoint,
        format!("http://127.0.0.1:{port}/userinfo")
    );
}

#[actix_rt::test]
#[serial]
async fn unreachable_provider_is_a_provider_error() {
    // Nothing listens on this port.
    let result = fetch_discovery("http://127.0.0.1:18199/.well-known/openid-configuration").await;
    assert!(matches!(result, Err(AuthError::Provider(_))));
}

// =========================================================================
// Token exchange
// =========================================================================

#[actix_rt::test]
#[serial]
async fn code_exchange_yields_the_access_token() {
    let port = 18101;
    start_fake_provider(port, 200, good_token_body(), verified_userinfo_body()).await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let token = request_token(
        &discovery.token_endpoint,
        "client-id",
        "client-secret",
        "http://127.0.0.1:8080/login/callback",
        "verifier",
        "ABC",
    )
    .await
    .unwrap();

    assert_eq!(token.access_token, "T1");
    assert_eq!(token.token_type, "Bearer");
}

#[actix_rt::test]
#[serial]
async fn token_error_status_is_rejected() {
    let port = 18102;
    start_fake_provider(
        port,
        400,
        json!({"error": "invalid_grant"}),
        verified_userinfo_body(),
    )
    .await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let result = request_token(
        &discovery.token_endpoint,
        "client-id",
        "client-secret",
        "http://127.0.0.1:8080/login/callback",
        "verifier",
        "EXPIRED",
    )
    .await;

    assert!(matches!(result, Err(AuthError::TokenExchange(_))));
}

#[actix_rt::test]
#[serial]
async fn token_error_body_under_http_200_is_rejected() {
    let port = 18103;
    start_fake_provider(
        port,
        200,
        json!({"error": "invalid_grant", "error_description": "Bad code"}),
        verified_userinfo_body(),
    )
    .await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let result = request_token(
        &discovery.token_endpoint,
        "client-id",
        "client-secret",
        "http://127.0.0.1:8080/login/callback",
        "verifier",
        "EXPIRED",
    )
    .await;

    match result {
        Err(AuthError::TokenExchange(reason)) => assert_eq!(reason, "invalid_grant"),
        other => panic!("expected TokenExchange error, got {:?}", other),
    }
}

// =========================================================================
// Profile claims
// =========================================================================

#[actix_rt::test]
#[serial]
async fn verified_profile_claims_are_returned() {
    let port = 18104;
    start_fake_provider(port, 200, good_token_body(), verified_userinfo_body()).await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let claims = fetch_profile(&discovery.userinfo_endpoint, "T1").await.unwrap();
    assert_eq!(claims.sub, "u1");
    assert_eq!(claims.email, "a@x.com");
    assert_eq!(claims.picture, "http://p/1.png");
    assert_eq!(claims.given_name, "Ada");
}

#[actix_rt::test]
#[serial]
async fn unverified_email_is_rejected() {
    let port = 18105;
    let mut body = verified_userinfo_body();
    body["email_verified"] = json!(false);
    start_fake_provider(port, 200, good_token_body(), body).await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let result = fetch_profile(&discovery.userinfo_endpoint, "T1").await;
    assert!(matches!(result, Err(AuthError::ProfileUnverified)));
}

#[actix_rt::test]
#[serial]
async fn missing_email_verified_flag_is_rejected() {
    let port = 18106;
    let mut body = verified_userinfo_body();
    body.as_object_mut().unwrap().remove("email_verified");
    start_fake_provider(port, 200, good_token_body(), body).await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let result = fetch_profile(&discovery.userinfo_endpoint, "T1").await;
    assert!(matches!(result, Err(AuthError::ProfileUnverified)));
}

// =========================================================================
// Full exchange sequence (token then profile, as the callback runs it)
// =========================================================================

#[actix_rt::test]
#[serial]
async fn exchange_then_fetch_carries_the_token_through() {
    let port = 18107;
    start_fake_provider(port, 200, good_token_body(), verified_userinfo_body()).await;
    let discovery = fetch_discovery(&discovery_url(port)).await.unwrap();

    let token = request_token(
        &discovery.token_endpoint,
        "client-id",
        "client-secret",
        "http://127.0.0.1:8080/login/callback",
        "verifier",
        "ABC",
    )
    .await
    .unwrap();

    let claims = fetch_profile(&discovery.userinfo_endpoint, &token.access_token)
        .await
        .unwrap();
    assert_eq!(claims.sub, "u1");
    assert_eq!(claims.given_name, "Ada");
}
