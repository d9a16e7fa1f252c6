use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound("Order not found".to_string()),
            DomainError::InvalidInput(msg) => AppError::BadRequest(msg),
            DomainError::InvalidSignature => AppError::BadRequest("Invalid signature".to_string()),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::Payment(msg) => AppError::Internal(format!("payment provider: {msg}")),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(detail) => {
                log::error!("{detail}");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.error_response().into_body())
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound("Order not found".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn internal_details_are_not_leaked() {
        let body = body_of(AppError::Internal("password authentication failed".to_string())).await;
        assert_eq!(body, serde_json::json!({ "message": "Server error" }));
    }

    #[actix_web::test]
    async fn bad_request_carries_message() {
        let body = body_of(AppError::BadRequest("Invalid status".to_string())).await;
        assert_eq!(body, serde_json::json!({ "message": "Invalid status" }));
    }

    #[test]
    fn domain_not_found_maps_to_app_not_found() {
        let app_err: AppError = DomainError::NotFound.into();
        assert!(matches!(app_err, AppError::NotFound(_)));
        assert_eq!(app_err.to_string(), "Order not found");
    }

    #[test]
    fn domain_invalid_input_maps_to_bad_request() {
        let app_err: AppError = DomainError::InvalidInput("bad value".to_string()).into();
        assert!(matches!(app_err, AppError::BadRequest(ref m) if m == "bad value"));
    }

    #[test]
    fn invalid_signature_maps_to_bad_request() {
        let app_err: AppError = DomainError::InvalidSignature.into();
        assert_eq!(app_err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(app_err.to_string(), "Invalid signature");
    }

    #[test]
    fn conflict_maps_to_409() {
        let app_err: AppError = DomainError::Conflict("Order payment state conflict".to_string()).into();
        assert_eq!(app_err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn provider_failure_maps_to_internal() {
        let app_err: AppError = DomainError::Payment("timeout".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }
}
