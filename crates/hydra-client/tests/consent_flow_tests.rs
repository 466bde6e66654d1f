//! Login/consent flow integration tests.
//!
//! Drives a whole login and consent round against a mocked Hydra, the way a
//! consent application would.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use chrono::TimeDelta;
use hydra_client::consent::{AcceptConsentRequest, AcceptLoginRequest, RejectRequest};
use hydra_client::secret::ExposeSecret;
use hydra_client::{AdminApiStyle, HydraError};
use hydra_test_utils::{ManualClock, MockHydra, TEST_ACCESS_TOKEN};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn redirect_to(url: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "redirect_to": url }))
}

#[tokio::test]
async fn test_full_login_and_consent_round() -> Result<()> {
    let mock = MockHydra::start().await;
    let bearer = format!("bearer {TEST_ACCESS_TOKEN}");

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_ACCESS_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(mock.server())
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/auth/requests/login"))
        .and(query_param("login_challenge", "login-1"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "challenge": "login-1",
            "skip": false,
            "subject": "",
            "requested_scope": ["openid", "offline"]
        })))
        .expect(1)
        .mount(mock.server())
        .await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/login/accept"))
        .and(query_param("login_challenge", "login-1"))
        .and(body_json(json!({"subject": "foo", "remember": true})))
        .respond_with(redirect_to("https://hydra.example.com/oauth2/auth?login_verifier=lv"))
        .expect(1)
        .mount(mock.server())
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/auth/requests/consent"))
        .and(query_param("consent_challenge", "consent-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "challenge": "consent-1",
            "subject": "foo",
            "requested_scope": ["openid", "offline"]
        })))
        .expect(1)
        .mount(mock.server())
        .await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/consent/accept"))
        .and(query_param("consent_challenge", "consent-1"))
        .and(body_json(json!({"grant_scope": ["openid", "offline"]})))
        .respond_with(redirect_to("https://hydra.example.com/oauth2/auth?consent_verifier=cv"))
        .expect(1)
        .mount(mock.server())
        .await;

    let hydra = mock.hydra(AdminApiStyle::QueryParameter);
    let consent = hydra.consent();

    let login = consent.get_login_request("login-1").await?;
    assert!(!login.skip);

    let accepted = consent
        .accept_login_request(
            "login-1",
            &AcceptLoginRequest {
                remember: Some(true),
                ..AcceptLoginRequest::new("foo")
            },
        )
        .await?;
    assert!(accepted.redirect_to.contains("login_verifier=lv"));

    let request = consent.get_consent_request("consent-1").await?;
    let accepted = consent
        .accept_consent_request(
            "consent-1",
            &AcceptConsentRequest::new(request.requested_scope),
        )
        .await?;
    assert!(accepted.redirect_to.contains("consent_verifier=cv"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_consent_path_segment() -> Result<()> {
    let mock = MockHydra::start().await;
    mock.mount_token_endpoint().await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/consent/consent-1/reject"))
        .and(body_json(json!({
            "error": "access_denied",
            "error_description": "The user declined",
            "status_code": 403
        })))
        .respond_with(redirect_to("https://app.example.com/cb?error=access_denied"))
        .expect(1)
        .mount(mock.server())
        .await;

    let hydra = mock.hydra(AdminApiStyle::PathSegment);
    let rejected = hydra
        .consent()
        .reject_consent_request(
            "consent-1",
            &RejectRequest {
                status_code: Some(403),
                ..RejectRequest::new("access_denied", "The user declined")
            },
        )
        .await?;

    assert!(rejected.redirect_to.ends_with("error=access_denied"));
    Ok(())
}

#[tokio::test]
async fn test_expired_admin_token_is_refreshed() -> Result<()> {
    let mock = MockHydra::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_ACCESS_TOKEN,
            "token_type": "bearer",
            "expires_in": 60
        })))
        .expect(2)
        .mount(mock.server())
        .await;

    Mock::given(method("DELETE"))
        .and(path("/oauth2/auth/sessions/login/foo"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(mock.server())
        .await;

    let clock = Arc::new(ManualClock::starting_now());
    let hydra = mock.hydra_with_clock(AdminApiStyle::PathSegment, clock.clone());

    hydra.consent().revoke_login_sessions(Some("foo")).await?;
    hydra.consent().revoke_login_sessions(Some("foo")).await?;

    clock.advance(TimeDelta::seconds(60));
    hydra.consent().revoke_login_sessions(Some("foo")).await?;

    let token = hydra.tokens().get_token(None).await?;
    assert_eq!(token.value().expose_secret(), TEST_ACCESS_TOKEN);
    Ok(())
}

#[tokio::test]
async fn test_server_rejection_is_surfaced() -> Result<()> {
    let mock = MockHydra::start().await;
    mock.mount_token_endpoint().await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/login/used/accept"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "request already handled"})),
        )
        .mount(mock.server())
        .await;

    let hydra = mock.hydra(AdminApiStyle::PathSegment);
    let err = hydra
        .consent()
        .accept_login_request("used", &AcceptLoginRequest::new("foo"))
        .await
        .unwrap_err();

    assert!(matches!(err, HydraError::Transport { status: Some(409), .. }));
    assert!(err.to_string().contains("already handled"));
    Ok(())
}
