use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_i18n::t;
use serde::Serialize;
use thiserror::Error;

use super::i18n::get_locale;
use crate::services::showplan::ParseError;

/// API error returned by every handler
///
/// Codes are grouped by range: 3xxx not found, 4xxx bad request, 5xxx server.
#[derive(Error, Debug)]
pub enum ApiError {
    // Resource errors 3xxx
    #[error("Statement {index} not found (plan has {count} statements)")]
    StatementNotFound { index: usize, count: usize },

    // Validation errors 4xxx
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    // Plan errors 41xx
    #[error("Invalid plan: {0}")]
    InvalidPlan(ParseError),

    // System errors 5xxx
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn payload_too_large(size: usize, limit: usize) -> Self {
        Self::PayloadTooLarge { size, limit }
    }

    pub fn error_code(&self) -> i32 {
        match self {
            // Resource errors 3xxx
            Self::StatementNotFound { .. } => 3001,

            // Validation errors 4xxx
            Self::ValidationError(_) => 4001,
            Self::PayloadTooLarge { .. } => 4003,

            // Plan errors 41xx
            Self::InvalidPlan(err) => match err {
                ParseError::UnrecognizedPlanSource(_) => 4101,
                ParseError::InvalidXml(_) => 4102,
                ParseError::MissingOperator { .. } => 4103,
                ParseError::MissingAttribute { .. } => 4104,
                ParseError::InvalidRecordSet(_) => 4105,
                ParseError::StatementIndexOutOfRange { .. } => 3001,
                ParseError::XmlWrite(_) => 5003,
            },

            // System errors 5xxx
            Self::InternalError(_) => 5001,
            Self::Other(_) => 5001,
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Message in the locale of the current request
    pub fn localized_message(&self) -> String {
        let locale = get_locale();
        match self {
            Self::StatementNotFound { index, count } => {
                t!("showplan.statement_out_of_range", locale = &locale, index = index, count = count).to_string()
            }
            Self::ValidationError(details) => {
                t!("validation.failed", locale = &locale, details = details).to_string()
            }
            Self::PayloadTooLarge { size, limit } => {
                t!("validation.payload_too_large", locale = &locale, size = size, limit = limit).to_string()
            }
            Self::InvalidPlan(err) => localized_parse_error(err, &locale),
            Self::InternalError(msg) => {
                t!("internal.error", locale = &locale, message = msg).to_string()
            }
            Self::Other(err) => {
                t!("internal.error", locale = &locale, message = err.to_string()).to_string()
            }
        }
    }
}

fn localized_parse_error(err: &ParseError, locale: &str) -> String {
    match err {
        ParseError::UnrecognizedPlanSource(reason) => {
            t!("showplan.unrecognized_source", locale = locale, reason = reason).to_string()
        }
        ParseError::InvalidXml(reason) => {
            t!("showplan.invalid_xml", locale = locale, reason = reason).to_string()
        }
        ParseError::MissingOperator { node_id } => {
            t!("showplan.missing_operator", locale = locale, node_id = node_id).to_string()
        }
        ParseError::MissingAttribute { element, attribute } => {
            t!("showplan.missing_attribute", locale = locale, element = element, attribute = attribute).to_string()
        }
        ParseError::StatementIndexOutOfRange { index, count } => {
            t!("showplan.statement_out_of_range", locale = locale, index = index, count = count).to_string()
        }
        ParseError::InvalidRecordSet(reason) => {
            t!("showplan.invalid_record_set", locale = locale, reason = reason).to_string()
        }
        ParseError::XmlWrite(reason) => {
            t!("internal.error", locale = locale, message = reason).to_string()
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::StatementIndexOutOfRange { index, count } => Self::StatementNotFound { index, count },
            other => Self::InvalidPlan(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let message = self.localized_message();

        let status = match code {
            3000..=3999 => StatusCode::NOT_FOUND,
            4003 => StatusCode::PAYLOAD_TOO_LARGE,
            4001..=4999 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = ApiErrorResponse { code, message, details: None };

        (status, Json(response)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal_error(format!("JSON serialization error: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_map_to_codes() {
        let range: ApiError = ParseError::StatementIndexOutOfRange { index: 3, count: 1 }.into();
        assert_eq!(range.error_code(), 3001);
        assert!(matches!(range, ApiError::StatementNotFound { index: 3, count: 1 }));

        let format: ApiError = ParseError::MissingOperator { node_id: "4".to_string() }.into();
        assert_eq!(format.error_code(), 4103);

        let write: ApiError = ParseError::XmlWrite("closed".to_string()).into();
        assert_eq!(write.error_code(), 5003);
    }

    #[test]
    fn test_status_codes() {
        let not_found = ApiError::StatementNotFound { index: 1, count: 0 }.into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad = ApiError::from(ParseError::InvalidXml("eof".to_string())).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let large = ApiError::payload_too_large(10, 5).into_response();
        assert_eq!(large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let internal = ApiError::internal_error("boom").into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_localized_message_in_english() {
        crate::utils::i18n::set_locale("en");
        let err = ApiError::from(ParseError::MissingOperator { node_id: "7".to_string() });
        assert_eq!(err.localized_message(), "RelOp 7 has neither a physical nor a logical operator");
    }
}
