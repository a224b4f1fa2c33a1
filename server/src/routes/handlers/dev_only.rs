//! Development-only handlers. These are only compiled in debug builds.

use axum::{
    extract::{Query, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    auth::jwt::generate_dev_token,
    error::{AppError, AppJsonResult},
    model::user::UserCtrl,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTokenParams {
    pub user_id: Option<i32>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct DevTokenResponse {
    token: String,
}

/// # GET /dev/token
///
/// Issues a long-lived token for an existing user, looked up by
/// `userId` or `email`.
pub async fn dev_token(
    State(conn): State<DatabaseConnection>,
    Query(params): Query<DevTokenParams>,
) -> AppJsonResult<DevTokenResponse> {
    let user = match (params.user_id, params.email) {
        (Some(user_id), _) => UserCtrl::get_by_id(&conn, user_id).await?,
        (None, Some(email)) => UserCtrl::get_by_email(&conn, &email).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Must provide either userId or email".to_string(),
            ))
        }
    };

    let token = generate_dev_token(user.id, &user.email)?;
    tracing::debug!("Issued dev token for user {}", user.id);

    Ok(Json(DevTokenResponse { token }))
}
