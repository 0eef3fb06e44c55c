//! # Changelist Errors
//!
//! Every stage of the changelist pipeline reports failures through
//! [`ChangeListError`]. The variants fall in two groups:
//!
//! - **Client errors** (`400 Bad Request`): [`ChangeListError::IncorrectLookupParameters`]
//!   and [`ChangeListError::InvalidLookup`]. These come from crafted or stale query
//!   strings: an unknown ordering column, a page outside the page range, a filter
//!   value that no filter choice offers.
//! - **Server errors** (`500 Internal Server Error`): [`ChangeListError::ImproperlyConfigured`]
//!   for list options that fail validation, and [`ChangeListError::Database`] for
//!   anything the data store reports. Details are logged, never sent to users.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use changelist::ChangeListError;
//!
//! async fn list_bands(db: &DatabaseConnection) -> Result<Json<Value>, ChangeListError> {
//!     let cl = BandAdmin::default()
//!         .changelist(db, &Requester::anonymous(), pairs)
//!         .await?;
//!     Ok(Json(json!({ "count": cl.page.total_count })))
//! }
//! ```
//!
//! Internal errors are logged using the `tracing` crate; install a subscriber
//! (for example `tracing_subscriber::fmt().compact().init()`) to see them.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// Error raised by the changelist pipeline.
#[derive(Debug)]
pub enum ChangeListError {
    /// 400 Bad Request - unknown lookup, ordering column, or out-of-range page
    IncorrectLookupParameters {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - a filter value that matches none of the filter's choices
    InvalidLookup {
        /// Filter field path (e.g. `genres`, `child__name`)
        field: String,
        /// The offending value as supplied
        value: String,
    },

    /// 500 Internal Server Error - list options failed validation
    ImproperlyConfigured {
        /// Description of the misconfiguration (logged, not sent to user)
        message: String,
    },

    /// 500 Internal Server Error - data store failure (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },
}

impl ChangeListError {
    /// Create a 400 error for lookups that do not fit the configuration
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ChangeListError::incorrect_lookup("Invalid page (7)"));
    /// ```
    pub fn incorrect_lookup(message: impl Into<String>) -> Self {
        Self::IncorrectLookupParameters {
            message: message.into(),
        }
    }

    /// Create a 400 error for a filter value outside the enumerated choices
    pub fn invalid_lookup(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidLookup {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a configuration error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ChangeListError::improperly_configured(
    ///     "list_display_links refers to 'age', which is not in list_display",
    /// ));
    /// ```
    pub fn improperly_configured(message: impl Into<String>) -> Self {
        Self::ImproperlyConfigured {
            message: message.into(),
        }
    }

    /// Wrap a data store error. The details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Whether the caller, not the server, is at fault
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::IncorrectLookupParameters { .. } | Self::InvalidLookup { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ImproperlyConfigured { .. } | Self::Database { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// User-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::IncorrectLookupParameters { message } => message.clone(),
            Self::InvalidLookup { field, value } => {
                format!("Invalid value '{value}' for filter '{field}'")
            }
            Self::ImproperlyConfigured { .. } => "The list view is misconfigured".to_string(),
            Self::Database { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::ImproperlyConfigured { message } => {
                tracing::error!(details = %message, "Changelist improperly configured");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "Changelist lookup rejected"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for ChangeListError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let field = match &self {
            Self::InvalidLookup { field, .. } => Some(field.clone()),
            _ => None,
        };
        let response = ErrorResponse {
            error: self.user_message(),
            field,
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ChangeListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImproperlyConfigured { message } => write!(f, "Improperly configured: {message}"),
            _ => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for ChangeListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database { internal, .. } => Some(internal),
            _ => None,
        }
    }
}

/// Data store errors are opaque to the pipeline; they always become 500s.
impl From<DbErr> for ChangeListError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}
