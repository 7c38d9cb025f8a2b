//! Error types
//!
//! Two layers, mirroring the split between the mapping layer and the
//! document-store driver underneath it:
//!
//! - [`FirestoreError`] is what a driver reports (status codes, transport
//!   failures, rejected arguments).
//! - [`OdmError`] is what the document mapper reports. Driver errors pass
//!   through it unchanged via [`OdmError::Firestore`].
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. All errors implement
//! std::error::Error and convert into [`OdmError`] via `From`.

use crate::odm::lookup::Lookup;
use thiserror::Error;

/// Result type used throughout the mapping layer
pub type Result<T, E = OdmError> = std::result::Result<T, E>;

/// Errors raised by the document mapper
///
/// `DoesNotExist` and `MultipleObjectsFound` are part of normal control
/// flow ("get or 404"). The remaining variants signal programmer mistakes.
///
/// # Example
/// ```
/// use firestore_odm::{FirestoreError, OdmError};
///
/// let err: OdmError = FirestoreError::Unavailable.into();
/// assert!(!err.is_usage_error());
/// ```
#[derive(Debug, Error)]
pub enum OdmError {
    /// A `get` by pk or by unique filter matched nothing
    #[error("{document_type} matching {lookup} does not exist")]
    DoesNotExist {
        /// Short name of the document type
        document_type: &'static str,
        /// The pk or filters that were looked up
        lookup: Lookup,
    },

    /// A `get` by filter matched more than one record
    #[error("Multiple {document_type} documents match {lookup}")]
    MultipleObjectsFound {
        /// Short name of the document type
        document_type: &'static str,
        /// The filters that were looked up
        lookup: Lookup,
    },

    /// A cursor was neither a mapping nor a typed record
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// The document type does not carry its primary key under `id`
    #[error("No primary key field found on {document_type}: the pk must serialize as `id`")]
    MissingPrimaryKey {
        /// Short name of the document type
        document_type: &'static str,
    },

    /// The document type's declaration is unusable
    #[error("Invalid declaration of {document_type}: {reason}")]
    InvalidDefinition {
        /// Short name of the document type
        document_type: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Both a pk and filters were passed to `get`
    #[error("Cannot use pk and filters together")]
    PkWithFilters,

    /// An instance operation needs a persisted document
    #[error("Cannot {operation} a {document_type} without a primary key")]
    UnsavedDocument {
        /// The attempted operation (`update`, `refresh`, `delete`)
        operation: &'static str,
        /// Short name of the document type
        document_type: &'static str,
    },

    /// `start_after`/`start_at` were used without `order_by`
    #[error("`order_by` is required when using `start_after` or `start_at`")]
    CursorRequiresOrderBy,

    /// A batch scope was opened inside another one
    #[error("Cannot start a new batch within an existing one")]
    NestedBatch,

    /// A write inside a batch scope came from a manager of another database
    #[error("Cannot stage a {document_type} write in a batch of a different database")]
    ForeignBatch {
        /// Short name of the document type
        document_type: &'static str,
    },

    /// A primary key that cannot address a document
    #[error("Invalid primary key {pk:?} for {document_type}: it must be non-empty and contain no `/`")]
    InvalidPrimaryKey {
        /// Short name of the document type
        document_type: &'static str,
        /// The rejected key
        pk: String,
    },

    /// A subcollection was accessed on an unsaved parent
    #[error("Cannot access subcollection `{collection}` on a {parent_type} without a primary key")]
    ParentNotSaved {
        /// Short name of the parent document type
        parent_type: &'static str,
        /// Name of the subcollection
        collection: String,
    },

    /// Document data did not serialize to a map of fields
    #[error("Invalid document data: {0}")]
    InvalidDocument(String),

    /// Error reported by the document-store driver
    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by a document-store driver
///
/// Maps Firestore status codes to Rust enum variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FirestoreError {
    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied")]
    PermissionDenied,

    /// Resource already exists
    #[error("Resource already exists")]
    AlreadyExists,

    /// Resource exhausted (e.g., quota exceeded)
    #[error("Resource exhausted")]
    ResourceExhausted,

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Deadline exceeded
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Operation was cancelled, typically by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation was aborted
    #[error("Operation aborted")]
    Aborted,

    /// Failed precondition (e.g., missing index)
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Out of range error
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Unimplemented feature
    #[error("Feature not implemented")]
    Unimplemented,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable
    #[error("Service unavailable")]
    Unavailable,

    /// Data loss or corruption
    #[error("Data loss")]
    DataLoss,

    /// Unauthenticated
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Connection or network error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Unknown error with code
    #[error("Unknown Firestore error: code {0}")]
    Unknown(i32),
}

impl OdmError {
    /// True for `DoesNotExist` and for a driver `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DoesNotExist { .. } | Self::Firestore(FirestoreError::NotFound(_))
        )
    }

    /// True for errors that indicate a programming mistake
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::PkWithFilters
                | Self::UnsavedDocument { .. }
                | Self::CursorRequiresOrderBy
                | Self::NestedBatch
                | Self::ForeignBatch { .. }
                | Self::InvalidPrimaryKey { .. }
                | Self::ParentNotSaved { .. }
                | Self::InvalidCursor(_)
                | Self::MissingPrimaryKey { .. }
                | Self::InvalidDefinition { .. }
        )
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Firestore(
                FirestoreError::Unavailable
                    | FirestoreError::DeadlineExceeded
                    | FirestoreError::ResourceExhausted
                    | FirestoreError::Aborted
                    | FirestoreError::Connection(_)
            )
        )
    }
}

impl FirestoreError {
    /// Create from gRPC status code
    pub fn from_grpc_code(code: i32) -> Self {
        match code {
            1 => Self::Cancelled,
            2 => Self::Unknown(code),
            3 => Self::InvalidArgument(String::new()),
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound(String::new()),
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition(String::new()),
            10 => Self::Aborted,
            11 => Self::OutOfRange(String::new()),
            12 => Self::Unimplemented,
            13 => Self::Internal(String::new()),
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown(code),
        }
    }

    /// Create from gRPC status code, keeping the server's message
    pub fn from_grpc_status(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match Self::from_grpc_code(code) {
            Self::InvalidArgument(_) => Self::InvalidArgument(message),
            Self::NotFound(_) => Self::NotFound(message),
            Self::FailedPrecondition(_) => Self::FailedPrecondition(message),
            Self::OutOfRange(_) => Self::OutOfRange(message),
            Self::Internal(_) => Self::Internal(message),
            other => other,
        }
    }
}
