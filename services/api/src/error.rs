use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crmirror_common::error::CrmirrorError;

pub struct ApiError(pub CrmirrorError);

impl From<CrmirrorError> for ApiError {
    fn from(err: CrmirrorError) -> Self {
        Self(err)
    }
}

// Extractor rejections answer with the same JSON error body as everything else.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CrmirrorError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(CrmirrorError::Validation(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CrmirrorError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CrmirrorError::Validation(_) => StatusCode::BAD_REQUEST,
            CrmirrorError::NotFound(_) => StatusCode::NOT_FOUND,
            CrmirrorError::Conflict(_) => StatusCode::CONFLICT,
            CrmirrorError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CrmirrorError::AggregationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            // a feature the server was started without
            CrmirrorError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            CrmirrorError::NotFound(msg) | CrmirrorError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_per_variant() {
        let cases = [
            (CrmirrorError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CrmirrorError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CrmirrorError::Conflict("x".into()), StatusCode::CONFLICT),
            (CrmirrorError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (CrmirrorError::AggregationTimeout(5000), StatusCode::GATEWAY_TIMEOUT),
            (CrmirrorError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
