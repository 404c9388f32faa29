//! Deactivation workflow for a single user.
//!
//! A user may only become inactive once none of the three booking stores hold
//! future bookings for them. The flow is an explicit state machine:
//!
//! ```text
//! Idle --evaluate (nothing booked)--> Deactivated
//! Idle --evaluate (bookings found)--> PendingConfirm
//! PendingConfirm --cancel_future_bookings--> AwaitingFinalConfirm
//! AwaitingFinalConfirm --confirm--> Deactivated
//! any --dismiss--> Idle
//! ```
//!
//! 404 from a future-booking read means "none"; from a delete it means
//! "nothing to delete". Everything else is a hard failure.

use crate::api::FbsApi;
use crate::config::{CascadePolicy, WorkflowConfig};
use crate::error::{ApiError, ApiResult, CategoryFailures, WorkflowError};
use crate::model::{BookingCategory, FutureBookings, Role, User, UserId};
use crate::users::UserDirectory;
use serde::Serialize;
use std::thread;

/// Normalize a future-booking read: not-found is an empty list
pub fn not_found_as_empty<T>(result: ApiResult<Vec<T>>) -> ApiResult<Vec<T>> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// What a future-booking delete did in one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Deleted,
    NothingToDelete,
}

/// Normalize a future-booking delete: not-found is a successful no-op
pub fn not_found_as_noop(result: ApiResult<()>) -> ApiResult<Removal> {
    match result {
        Ok(()) => Ok(Removal::Deleted),
        Err(e) if e.is_not_found() => Ok(Removal::NothingToDelete),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    PendingConfirm {
        user_id: UserId,
        bookings: FutureBookings,
    },
    AwaitingFinalConfirm {
        user_id: UserId,
    },
    Deactivated {
        user: User,
    },
}

impl FlowState {
    pub fn describe(&self) -> String {
        match self {
            Self::Idle => "idle".to_string(),
            Self::PendingConfirm { user_id, bookings } => format!(
                "waiting to cancel {} future booking(s) of user {}",
                bookings.total(),
                user_id
            ),
            Self::AwaitingFinalConfirm { user_id } => {
                format!("waiting for final confirmation to deactivate user {}", user_id)
            }
            Self::Deactivated { user } => format!("user {} deactivated", user.user_id),
        }
    }
}

/// Result of `evaluate`
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Nothing was booked; the user is now inactive
    Deactivated(User),
    /// Bookings must be cancelled first; nothing was changed
    PendingConfirm(FutureBookings),
}

/// Per-category outcome of a successful cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub facility: Removal,
    pub equipment: Removal,
    pub session: Removal,
}

impl CascadeReport {
    pub fn get(&self, category: BookingCategory) -> Removal {
        match category {
            BookingCategory::Facility => self.facility,
            BookingCategory::Equipment => self.equipment,
            BookingCategory::Session => self.session,
        }
    }

    pub fn deleted(&self) -> Vec<BookingCategory> {
        BookingCategory::ALL
            .into_iter()
            .filter(|c| self.get(*c) == Removal::Deleted)
            .collect()
    }
}

/// Collects per-category results, keeping every hard failure
struct Settled {
    failures: Vec<(BookingCategory, ApiError)>,
}

impl Settled {
    fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    fn take<T>(&mut self, category: BookingCategory, result: ApiResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.failures.push((category, e));
                None
            }
        }
    }

    fn into_failures(self) -> CategoryFailures {
        CategoryFailures(self.failures)
    }
}

fn joined<T>(handle: thread::ScopedJoinHandle<'_, ApiResult<T>>) -> ApiResult<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(ApiError::Transport("request worker panicked".to_string())))
}

pub struct DeactivationFlow {
    state: FlowState,
    policy: CascadePolicy,
    parallel: bool,
}

impl DeactivationFlow {
    pub fn new(config: &WorkflowConfig) -> Self {
        let policy = config.cascade();
        Self {
            state: FlowState::Idle,
            policy,
            // fail-fast is defined by its order
            parallel: config.parallel() && policy == CascadePolicy::AttemptAll,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    /// Check the three booking stores and deactivate immediately if all are empty.
    ///
    /// Only `Role::User` accounts qualify. Allowed from `Idle`, or from
    /// `Deactivated` which starts a new interaction.
    pub fn evaluate(
        &mut self,
        api: &dyn FbsApi,
        directory: &mut UserDirectory,
        user_id: &UserId,
    ) -> Result<Evaluation, WorkflowError> {
        if !matches!(self.state, FlowState::Idle | FlowState::Deactivated { .. }) {
            return Err(self.invalid("start a new deactivation"));
        }
        self.state = FlowState::Idle;

        let user = directory
            .get(user_id)
            .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;
        if user.role != Role::User {
            return Err(WorkflowError::NotManaged {
                user_id: user_id.clone(),
                role: user.role.as_str(),
            });
        }
        if !user.is_active {
            return Err(WorkflowError::AlreadyInactive(user_id.clone()));
        }

        let bookings = self.lookup(api, user_id)?;
        if bookings.is_empty() {
            let user = directory.set_active(api, user_id, false)?;
            self.state = FlowState::Deactivated { user: user.clone() };
            return Ok(Evaluation::Deactivated(user));
        }

        self.state = FlowState::PendingConfirm {
            user_id: user_id.clone(),
            bookings: bookings.clone(),
        };
        Ok(Evaluation::PendingConfirm(bookings))
    }

    /// Delete the user's future bookings in all three stores.
    ///
    /// On success the held bookings are dropped and the flow waits for the
    /// final confirmation. On any hard failure the flow stays where it was and
    /// the active flag is untouched; deletes are idempotent so a retry is safe.
    /// Running it again after success only produces no-op deletes.
    pub fn cancel_future_bookings(
        &mut self,
        api: &dyn FbsApi,
        user_id: &UserId,
    ) -> Result<CascadeReport, WorkflowError> {
        match &self.state {
            FlowState::PendingConfirm { user_id: pending, .. }
            | FlowState::AwaitingFinalConfirm { user_id: pending }
                if pending == user_id => {}
            _ => return Err(self.invalid("cancel future bookings")),
        }

        let report = self.cascade(api, user_id)?;
        self.state = FlowState::AwaitingFinalConfirm {
            user_id: user_id.clone(),
        };
        Ok(report)
    }

    /// Second, explicit confirmation: flip the active flag
    pub fn confirm(
        &mut self,
        api: &dyn FbsApi,
        directory: &mut UserDirectory,
        user_id: &UserId,
    ) -> Result<User, WorkflowError> {
        match &self.state {
            FlowState::AwaitingFinalConfirm { user_id: pending } if pending == user_id => {}
            _ => return Err(self.invalid("deactivate")),
        }

        let user = directory.set_active(api, user_id, false)?;
        self.state = FlowState::Deactivated { user: user.clone() };
        Ok(user)
    }

    /// Abandon the interaction without any mutation; returns the state left
    pub fn dismiss(&mut self) -> FlowState {
        std::mem::replace(&mut self.state, FlowState::Idle)
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition {
            action,
            state: self.state.describe(),
        }
    }

    fn lookup(&self, api: &dyn FbsApi, user_id: &UserId) -> Result<FutureBookings, WorkflowError> {
        let (facility, equipment, session) = if self.parallel {
            thread::scope(|s| {
                let facility =
                    s.spawn(|| not_found_as_empty(api.future_facility_bookings(user_id)));
                let equipment =
                    s.spawn(|| not_found_as_empty(api.future_equipment_bookings(user_id)));
                let session = s.spawn(|| not_found_as_empty(api.future_session_bookings(user_id)));
                (joined(facility), joined(equipment), joined(session))
            })
        } else {
            let facility = not_found_as_empty(api.future_facility_bookings(user_id));
            if self.stops_at(&facility) {
                return Err(single_failure(BookingCategory::Facility, facility));
            }
            let equipment = not_found_as_empty(api.future_equipment_bookings(user_id));
            if self.stops_at(&equipment) {
                return Err(single_failure(BookingCategory::Equipment, equipment));
            }
            let session = not_found_as_empty(api.future_session_bookings(user_id));
            (facility, equipment, session)
        };

        let mut settled = Settled::new();
        let facility = settled.take(BookingCategory::Facility, facility);
        let equipment = settled.take(BookingCategory::Equipment, equipment);
        let session = settled.take(BookingCategory::Session, session);

        match (facility, equipment, session) {
            (Some(facility), Some(equipment), Some(session)) => Ok(FutureBookings {
                facility,
                equipment,
                session,
            }),
            _ => Err(WorkflowError::Lookup(settled.into_failures())),
        }
    }

    fn cascade(&self, api: &dyn FbsApi, user_id: &UserId) -> Result<CascadeReport, WorkflowError> {
        let delete = |category: BookingCategory| {
            not_found_as_noop(api.delete_future_bookings(category, user_id))
        };

        let results: Vec<(BookingCategory, ApiResult<Removal>)> = if self.parallel {
            thread::scope(|s| {
                let handles: Vec<_> = BookingCategory::ALL
                    .into_iter()
                    .map(|category| (category, s.spawn(move || delete(category))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(category, handle)| (category, joined(handle)))
                    .collect()
            })
        } else {
            let mut results = Vec::new();
            for category in BookingCategory::ALL {
                let result = delete(category);
                let stop = self.stops_at(&result);
                results.push((category, result));
                if stop {
                    break;
                }
            }
            results
        };

        let mut settled = Settled::new();
        let mut removals = Vec::new();
        for (category, result) in results {
            if let Some(removal) = settled.take(category, result) {
                removals.push(removal);
            }
        }

        match removals.as_slice() {
            [facility, equipment, session] if settled.failures.is_empty() => Ok(CascadeReport {
                facility: *facility,
                equipment: *equipment,
                session: *session,
            }),
            _ => Err(WorkflowError::Cascade(settled.into_failures())),
        }
    }

    fn stops_at<T>(&self, result: &ApiResult<T>) -> bool {
        self.policy == CascadePolicy::FailFast && result.is_err()
    }
}

fn single_failure<T>(category: BookingCategory, result: ApiResult<T>) -> WorkflowError {
    let mut settled = Settled::new();
    settled.take(category, result);
    WorkflowError::Lookup(settled.into_failures())
}
