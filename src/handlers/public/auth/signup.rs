use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::SignupResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub company_name: String,
}

/// POST /auth/signup - Register the admin identity of a new organization
///
/// ```json
/// { "email": "a@x.com", "password": "P@ssw0rd!", "companyName": "Acme" }
/// ```
///
/// A confirmation code is sent to the e-mail address; the organization is
/// only recorded once `/auth/confirm` succeeds.
pub async fn signup_post(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<SignupResult> {
    let Json(body) = payload?;
    let result = state
        .auth
        .signup(body.email.trim(), &body.password, body.company_name.trim())
        .await?;
    Ok(ApiResponse::success(result))
}
