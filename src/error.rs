use crate::model::{BookingCategory, UserId};
use std::fmt;
use thiserror::Error;

/// Failure of a single backend request
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Hard failures collected per booking category
#[derive(Debug, Default)]
pub struct CategoryFailures(pub Vec<(BookingCategory, ApiError)>);

impl CategoryFailures {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn categories(&self) -> Vec<BookingCategory> {
        self.0.iter().map(|(category, _)| *category).collect()
    }
}

impl fmt::Display for CategoryFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (category, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", category, err)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("user {0} is not in the loaded user list")]
    UnknownUser(UserId),

    #[error("user {user_id} is a {role} account; only User accounts are managed here")]
    NotManaged { user_id: UserId, role: &'static str },

    #[error("user {0} is already deactivated")]
    AlreadyInactive(UserId),

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("checking future bookings failed ({0})")]
    Lookup(CategoryFailures),

    #[error("cancelling future bookings failed ({0}); user is still active")]
    Cascade(CategoryFailures),

    #[error("user {user_id} still reports active={actual} after toggling")]
    StatusMismatch { user_id: UserId, actual: bool },

    #[error(transparent)]
    Api(#[from] ApiError),
}
