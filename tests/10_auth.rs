mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use college_api_rust::types::Role;
use common::{assert_error, data, TestServer};

#[tokio::test]
async fn public_routes_need_no_token() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.client.get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(data(&body)["version"].is_string());

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(data(&body)["status"], "ok");
    assert_eq!(data(&body)["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn whoami_echoes_token_identity() -> Result<()> {
    let server = TestServer::spawn().await?;
    let id = Uuid::new_v4();
    let token = server.token(Role::Teacher, id)?;

    let (status, body) = server.get(&token, "/api/auth/whoami").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["id"], id.to_string());
    assert_eq!(data(&body)["role"], "teacher");
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.client.get(server.url("/api/marks")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_error(&res.json().await?, "UNAUTHORIZED");

    let (status, body) = server.get("not-a-jwt", "/api/auth/whoami").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "UNAUTHORIZED");

    // Signed with a different secret
    let forged = college_api_rust::auth::generate_jwt(
        &college_api_rust::auth::Claims::new(Uuid::new_v4(), Role::Admin, 1),
        "some-other-secret",
    )?;
    let (status, _) = server.get(&forged, "/api/auth/whoami").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
