//! Vendor utilities: address validation and single-tag translation

use axum::{
    extract::Query,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tagsync_common::{CanonicalTag, Vendor};
use tracing::debug;

use super::parse_vendor;
use crate::error::{ApiError, ApiResult};
use crate::vendor::{dialect, to_vendor_format, translate_tag, VendorRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub vendor: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub vendor: Vendor,
    pub address: String,
    /// Canonical spelling when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/address/validate?vendor=&address=
pub async fn validate_address(
    Query(params): Query<ValidateParams>,
) -> ApiResult<Json<ValidateResponse>> {
    let vendor = parse_vendor(&params.vendor)?;
    let response = match dialect(vendor).parse_address(&params.address) {
        Ok(parsed) => ValidateResponse {
            valid: true,
            vendor,
            address: params.address,
            normalized: Some(parsed.normalized),
            message: None,
        },
        Err(e) => ValidateResponse {
            valid: false,
            vendor,
            address: params.address,
            normalized: None,
            message: Some(e.to_string()),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub tag: CanonicalTag,
    pub target_vendor: Vendor,
}

/// POST /api/translate
pub async fn translate(Json(request): Json<TranslateRequest>) -> ApiResult<Json<VendorRecord>> {
    debug!(
        "Translating '{}' from {} to {}",
        request.tag.name, request.tag.vendor, request.target_vendor
    );
    let translated = translate_tag(&request.tag, request.target_vendor)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(to_vendor_format(&translated)))
}

pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/api/address/validate", get(validate_address))
        .route("/api/translate", post(translate))
}
