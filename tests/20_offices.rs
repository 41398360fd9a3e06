mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::spawn_server;

#[tokio::test]
async fn api_routes_require_a_bearer_token() -> Result<()> {
    let server = spawn_server().await?;
    let res = reqwest::get(format!("{}/api/offices?orgAlias=Acme", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = server.get("/api/offices?orgAlias=Acme", "not-a-token").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!(true));
    Ok(())
}

#[tokio::test]
async fn creating_two_offices_lists_both_with_managers() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;

    let first = server.create_office(&token, "Acme", "Head Office", "m1@acme.test").await?;
    let second = server.create_office(&token, "Acme", "Branch", "m2@acme.test").await?;
    assert_ne!(first, second);

    let (status, body) = server.get("/api/offices?orgAlias=Acme", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], json!(2));
    let offices = body["data"]["offices"].as_array().cloned().unwrap_or_default();
    let head = offices.iter().find(|o| o["officeId"] == json!(first)).unwrap();
    assert_eq!(head["name"], json!("Head Office"));
    assert_eq!(head["managerEmail"], json!("m1@acme.test"));
    assert_eq!(head["managerStatus"], json!("ACTIVE"));

    let (status, body) = server
        .get(&format!("/api/offices/detail?orgAlias=Acme&officeId={}", second), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["office"]["manager"]["managerEmail"], json!("m2@acme.test"));
    assert!(body["data"]["office"]["manager"]["userId"].is_string());
    Ok(())
}

#[tokio::test]
async fn create_office_validates_required_fields() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;

    let (status, body) = server
        .post("/api/offices", Some(&token), json!({ "orgAlias": "Acme", "officeName": "HQ" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("managerEmail is required"));
    Ok(())
}

#[tokio::test]
async fn updates_apply_only_allow_listed_fields() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;
    let office_id = server.create_office(&token, "Acme", "Head Office", "m1@acme.test").await?;

    let (status, body) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "OFFICE",
                "orgAlias": "Acme",
                "officeId": office_id,
                "updates": { "name": "Main Office", "orgAlias": "Evil" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updatedFields"], json!(["name"]));

    let (status, _) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "OFFICE",
                "orgAlias": "Acme",
                "officeId": office_id,
                "updates": { "entityId": "organization" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .put(
            "/api/offices",
            &token,
            json!({ "target": "ROOM", "orgAlias": "Acme", "updates": { "name": "x" } }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid target 'ROOM'. Must be OFFICE or MANAGER"));

    let (_, body) = server
        .get(&format!("/api/offices/detail?orgAlias=Acme&officeId={}", office_id), &token)
        .await?;
    assert_eq!(body["data"]["office"]["name"], json!("Main Office"));
    assert_eq!(body["data"]["office"]["orgAlias"], json!("Acme"));

    let manager_id = body["data"]["office"]["manager"]["userId"].clone();
    let (status, _) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "MANAGER",
                "orgAlias": "Acme",
                "userId": manager_id,
                "updates": { "status": "SUSPENDED" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "OFFICE",
                "orgAlias": "Acme",
                "officeId": "missing",
                "updates": { "name": "x" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn mistyped_updates_are_rejected_and_the_tenant_stays_usable() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;
    let office_id = server.create_office(&token, "Acme", "Head Office", "m1@acme.test").await?;
    server.create_office(&token, "Acme", "Branch", "m2@acme.test").await?;
    let (status, _) = server.manager_session("m1@acme.test", "Acme").await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server
        .get(&format!("/api/offices/detail?orgAlias=Acme&officeId={}", office_id), &token)
        .await?;
    let manager_id = body["data"]["office"]["manager"]["userId"].clone();

    let (status, body) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "MANAGER",
                "orgAlias": "Acme",
                "userId": manager_id,
                "updates": { "status": 5 }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("status must be a non-empty string"));

    let (status, body) = server
        .put(
            "/api/offices",
            &token,
            json!({
                "target": "OFFICE",
                "orgAlias": "Acme",
                "officeId": office_id,
                "updates": { "name": null }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("name must be a non-empty string"));

    let (status, body) = server.get("/api/offices?orgAlias=Acme", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], json!(2));

    let (status, body) = server.login("m1@acme.test", common::PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["officeId"], json!(office_id));
    Ok(())
}

#[tokio::test]
async fn deleting_an_office_removes_its_manager_identity() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;
    let office_id = server.create_office(&token, "Acme", "Head Office", "m1@acme.test").await?;

    let (status, _) = server
        .delete(
            "/api/offices",
            &token,
            json!({ "action": "REMOVE", "orgAlias": "Acme", "officeId": office_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .delete(
            "/api/offices",
            &token,
            json!({ "action": "DELETE_OFFICE", "orgAlias": "Acme", "officeId": office_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["managerEmail"], json!("m1@acme.test"));
    assert_eq!(body["data"]["identityDeleted"], json!(true));

    let (status, _) = server
        .get(&format!("/api/offices/detail?orgAlias=Acme&officeId={}", office_id), &token)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.login("m1@acme.test", "whatever-1A!", "Acme").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .delete(
            "/api/offices",
            &token,
            json!({ "action": "DELETE_OFFICE", "orgAlias": "Acme", "officeId": office_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deleting_an_admins_office_keeps_the_identity() -> Result<()> {
    let server = spawn_server().await?;
    let token = server.admin_session("admin@acme.test", "Acme").await?;

    let (status, body) = server
        .post(
            "/api/offices",
            Some(&token),
            json!({ "orgAlias": "Acme", "officeName": "HQ", "managerEmail": "admin@acme.test" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["identityCreated"], json!(false));
    let office_id = body["data"]["officeId"].as_str().unwrap_or_default().to_string();

    let (status, body) = server
        .delete(
            "/api/offices",
            &token,
            json!({ "action": "DELETE_OFFICE", "orgAlias": "Acme", "officeId": office_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["identityDeleted"], json!(false));

    let (status, body) = server.login("admin@acme.test", common::PASSWORD, "Acme").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], json!("admin"));
    assert_eq!(body["data"]["user"]["officeId"], json!("Acme"));
    Ok(())
}
