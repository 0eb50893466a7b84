//! Unified service-layer error type for order-cloud
//!
//! `ServiceError` bridges store errors and the API-layer error (`AppError`)
//! so services can use `?` on both without hand-written `map_err` logging.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::store::StoreError;

/// Service-layer error
///
/// - `Store`: storage/infrastructure errors (logged, mapped to a system code)
/// - `App`: business-rule errors (passed through to the client)
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    App(AppError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Store(StoreError::AlreadyExists { collection, id }) => {
                AppError::already_exists(ErrorCode::AlreadyExists, id)
                    .with_detail("collection", collection)
            }
            ServiceError::Store(StoreError::InvalidKey(key)) => {
                AppError::invalid_argument(format!("Invalid document id: {key:?}"))
            }
            ServiceError::Store(err @ StoreError::Serialization(_)) => {
                tracing::error!(error = %err, "Stored document could not be decoded");
                AppError::new(ErrorCode::InternalError)
            }
            ServiceError::Store(err) => {
                tracing::error!(error = %err, "Service storage error");
                AppError::new(ErrorCode::StorageUnavailable)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
