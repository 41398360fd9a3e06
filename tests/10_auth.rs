mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{spawn_server, PASSWORD};
use smart_office_api::identity::local::OutboxKind;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = spawn_server().await?;
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["storage"], json!("memory"));
    Ok(())
}

#[tokio::test]
async fn signup_requires_every_field() -> Result<()> {
    let server = spawn_server().await?;
    let (status, body) = server
        .post("/auth/signup", None, json!({ "email": "a@acme.test", "password": PASSWORD }))
        .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(true));
    assert_eq!(body["message"], json!("companyName is required"));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let server = spawn_server().await?;
    let res = reqwest::Client::new()
        .post(format!("{}/auth/login", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_is_rejected() -> Result<()> {
    let server = spawn_server().await?;
    let body = json!({ "email": "a@acme.test", "password": PASSWORD, "companyName": "Acme" });

    let (status, first) = server.post("/auth/signup", None, body.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(first["data"]["userSub"].is_string());

    let (status, second) = server.post("/auth/signup", None, body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(second["message"], json!("User already exists"));
    Ok(())
}

#[tokio::test]
async fn unconfirmed_login_is_forbidden_until_confirmed() -> Result<()> {
    let server = spawn_server().await?;
    server
        .post(
            "/auth/signup",
            None,
            json!({ "email": "a@acme.test", "password": PASSWORD, "companyName": "Acme" }),
        )
        .await?;

    let (status, _) = server.login("a@acme.test", PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .post("/auth/confirm", None, json!({ "email": "a@acme.test", "code": "000000x" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post("/auth/resend-code", None, json!({ "email": "a@acme.test" }))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let code = server.secret("a@acme.test", OutboxKind::ConfirmationCode).await?;
    let (status, body) = server
        .post(
            "/auth/confirm",
            None,
            json!({ "email": "a@acme.test", "code": code, "companyName": "Acme" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orgAlias"], json!("Acme"));

    let (status, _) = server.login("a@acme.test", PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let server = spawn_server().await?;
    server.admin_session("a@acme.test", "Acme").await?;

    let (status, body) = server.login("a@acme.test", "Wrong-pass1!", "Acme").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Invalid username or password"));
    Ok(())
}

#[tokio::test]
async fn forgot_password_resets_the_password() -> Result<()> {
    let server = spawn_server().await?;
    server.admin_session("a@acme.test", "Acme").await?;

    let (status, _) = server
        .post("/auth/forgot-password", None, json!({ "username": "a@acme.test" }))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let code = server.secret("a@acme.test", OutboxKind::PasswordReset).await?;
    let (status, _) = server
        .post(
            "/auth/confirm-forgot-password",
            None,
            json!({ "username": "a@acme.test", "code": code, "newPassword": "N3w-password!" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.login("a@acme.test", PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.login("a@acme.test", "N3w-password!", "Acme").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_access_token() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("a@acme.test", "Acme").await?;

    let (status, _) = server.get("/api/offices?orgAlias=Acme", &token).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .post("/auth/logout", None, json!({ "access_token": token }))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.get("/api/offices?orgAlias=Acme", &token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post("/auth/logout", None, json!({ "access_token": token }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Token expired or invalid"));
    Ok(())
}

#[tokio::test]
async fn confirm_cannot_claim_another_admins_organization() -> Result<()> {
    let server = spawn_server().await?;
    server.admin_session("a@acme.test", "Acme").await?;
    server.admin_session("b@globex.test", "Globex").await?;

    let (status, body) = server
        .post(
            "/auth/confirm",
            None,
            json!({ "email": "b@globex.test", "code": "123456", "companyName": "Acme" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Organization name already exists"));

    let (status, body) = server.login("a@acme.test", PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], json!("admin"));

    let (status, _) = server.login("b@globex.test", PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Re-confirming one's own organization stays idempotent
    let (status, _) = server
        .post(
            "/auth/confirm",
            None,
            json!({ "email": "a@acme.test", "code": "123456", "companyName": "Acme" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
