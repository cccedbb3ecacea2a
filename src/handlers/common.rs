use crate::{
    config::AppConfig,
    errors::{ApiError, ServiceError},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Runs the `validator` rules of a request body, naming the offending fields
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(|errors| {
        let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        if fields.is_empty() {
            ApiError::ValidationError(format!("invalid request: {}", errors))
        } else {
            ApiError::ValidationError(format!("invalid value for {}", fields.join(", ")))
        }
    })
}

pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// `?page=&per_page=` on back office listings
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Rows per page; the configured default when omitted
    pub per_page: Option<u64>,
}

/// Page request after applying configured defaults and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageQuery {
    pub fn resolve(&self, config: &AppConfig) -> PageRequest {
        let max = config.api_max_page_size.max(1);
        PageRequest {
            page: self.page.unwrap_or(1).max(1),
            per_page: self
                .per_page
                .unwrap_or(config.api_default_page_size)
                .clamp(1, max),
        }
    }
}

/// One page of a listing plus the counts needed to render a pager
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages: total.div_ceil(request.per_page),
        }
    }
}
