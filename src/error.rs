use thiserror::Error;

use crate::entity::PayloadError;
use crate::request::RequestStatus;
use crate::store::StoreError;

/// Every way a lifecycle, ledger, or notification operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RideError {
    /// A request was malformed at creation; nothing was written.
    #[error("invalid request: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    /// The request's current status does not allow this operation.
    #[error("cannot {operation} request {request_id} while {status}")]
    InvalidTransition {
        request_id: String,
        status: RequestStatus,
        operation: &'static str,
    },

    #[error("driver {driver} already offered on request {request_id}")]
    DuplicateOffer { request_id: String, driver: String },

    #[error("driver {driver} has no offer on request {request_id}")]
    UnknownOffer { request_id: String, driver: String },

    #[error("request {request_id} already confirmed driver {confirmed}")]
    AlreadyConfirmed {
        request_id: String,
        confirmed: String,
    },

    /// The store could not be reached; transport failures only.
    #[error("store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// The store answered but refused the operation (missing record, bad document).
    #[error("store rejected the operation: {0}")]
    Store(StoreError),

    /// The reconciliation budget ran out before the view converged.
    #[error("view did not converge after {attempts} attempts")]
    ConsistencyTimeout { attempts: u32 },

    /// An event could not be encoded, decoded, or replayed.
    #[error("history error: {0}")]
    History(String),

    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl RideError {
    /// Guard violations are raised before any write and carry no store state.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            RideError::Validation { .. }
                | RideError::InvalidTransition { .. }
                | RideError::DuplicateOffer { .. }
                | RideError::UnknownOffer { .. }
                | RideError::AlreadyConfirmed { .. }
        )
    }
}

impl From<StoreError> for RideError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => RideError::StoreUnavailable(err),
            _ => RideError::Store(err),
        }
    }
}

impl From<PayloadError> for RideError {
    fn from(err: PayloadError) -> Self {
        RideError::History(err.to_string())
    }
}

pub type RideResult<T> = Result<T, RideError>;
