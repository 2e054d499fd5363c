use thiserror::Error;
use ulid::Ulid;

use crate::layout::LayoutError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("{entity} does not belong to user {user}")]
    NotOwner { entity: Ulid, user: Ulid },
    #[error("booking must end at least one minute after it starts")]
    InvalidBookingRange,
    #[error("availability active range is inverted")]
    InvalidActiveRange,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}
