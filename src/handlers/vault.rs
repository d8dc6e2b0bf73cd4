// handlers/vault.rs - Secret sealing helpers for operators

use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::vault::EncryptedSecret;

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub plaintext: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedPassword {
    pub password: String,
    pub secret: EncryptedSecret,
}

/// POST /vault/encrypt - `{ "plaintext": "..." }` to `{ "iv", "content" }`
pub async fn encrypt_post(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<EncryptRequest>, JsonRejection>,
) -> ApiResult<EncryptedSecret> {
    let Json(request) = payload?;
    if request.plaintext.is_empty() {
        return Err(ApiError::validation_error("plaintext must not be empty", None));
    }
    Ok(ApiResponse::success(state.vault.encrypt(&request.plaintext)?))
}

/// POST /vault/password - fresh password, in clear and sealed
pub async fn password_post(Extension(state): Extension<Arc<AppState>>) -> ApiResult<GeneratedPassword> {
    let password = state.vault.generate_password();
    let secret = state.vault.encrypt(&password)?;
    Ok(ApiResponse::success(GeneratedPassword { password, secret }))
}
