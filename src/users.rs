//! User directory: the locally held copy of the user list plus the
//! filter/search state of the management table.
//!
//! The directory is owned by whoever presents it. It is refreshed by
//! re-querying the backend, or by applying the single record returned from a
//! status change; nothing here reloads the whole list implicitly.

use crate::api::FbsApi;
use crate::error::{ApiResult, WorkflowError};
use crate::model::{Role, User, UserId};

/// Status filter of the management table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Deactive,
}

impl StatusFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "all statuses" => Some(Self::All),
            "active" | "active user" => Some(Self::Active),
            "deactive" | "deactive user" | "inactive" | "deactivated" => Some(Self::Deactive),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Active => "Active User",
            Self::Deactive => "Deactive User",
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::All => true,
            Self::Active => user.is_active,
            Self::Deactive => !user.is_active,
        }
    }
}

/// Label shown in the Status column
pub fn status_label(is_active: bool) -> &'static str {
    if is_active {
        "Active User"
    } else {
        "Deactive User"
    }
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Vec<User>,
    filter: StatusFilter,
    search: String,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_users(users: Vec<User>) -> Self {
        Self {
            users,
            ..Self::default()
        }
    }

    /// Replace the held list with a fresh copy from the backend
    pub fn refresh(&mut self, api: &dyn FbsApi) -> ApiResult<usize> {
        self.users = api.list_users()?;
        Ok(self.users.len())
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, user_id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.user_id == user_id)
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    /// Rows of the management table for the given filter and search text.
    ///
    /// Only `Role::User` rows are listed; admins and coaches never show here.
    /// Search is a case-insensitive substring match on the display name.
    /// Source order is preserved.
    pub fn list_users(&self, filter: StatusFilter, search: &str) -> Vec<&User> {
        let needle = search.to_lowercase();
        self.users
            .iter()
            .filter(|u| u.role == Role::User)
            .filter(|u| filter.matches(u))
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Rows for the directory's own filter and search state
    pub fn visible(&self) -> Vec<&User> {
        self.list_users(self.filter, &self.search)
    }

    /// Apply a status change reported by the backend to the cached record
    pub fn apply_status(&mut self, user_id: &UserId, is_active: bool) -> Option<&User> {
        let user = self.users.iter_mut().find(|u| &u.user_id == user_id)?;
        user.is_active = is_active;
        Some(user)
    }

    /// Set a user's active flag and return the updated record.
    ///
    /// The backend only offers a toggle. When the cached flag already matches,
    /// the stored flag is read back first and no toggle is sent if it agrees.
    /// When a toggle lands on the wrong value the store changed underneath
    /// us, so one more toggle converges it.
    pub fn set_active(
        &mut self,
        api: &dyn FbsApi,
        user_id: &UserId,
        desired: bool,
    ) -> Result<User, WorkflowError> {
        let cached = self
            .get(user_id)
            .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?
            .is_active;
        if cached == desired {
            let stored = api
                .list_users()?
                .into_iter()
                .find(|u| &u.user_id == user_id)
                .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?
                .is_active;
            if stored == desired {
                return self
                    .apply_status(user_id, stored)
                    .cloned()
                    .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()));
            }
        }

        let mut actual = api.toggle_user(user_id)?;
        if actual != desired {
            actual = api.toggle_user(user_id)?;
        }

        let updated = self
            .apply_status(user_id, actual)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownUser(user_id.clone()))?;

        if actual != desired {
            return Err(WorkflowError::StatusMismatch {
                user_id: user_id.clone(),
                actual,
            });
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeApi};
    use crate::model::fixtures::user;

    fn sample() -> Vec<User> {
        vec![
            user("1", "Kasun Perera", Role::User, true),
            user("2", "Admin One", Role::Admin, true),
            user("3", "Nimali Silva", Role::User, false),
            user("4", "Coach Ruwan", Role::Coach, true),
            user("5", "kasuni Fernando", Role::User, true),
            user("6", "Dinuka", Role::Other, true),
        ]
    }

    fn ids(rows: &[&User]) -> Vec<String> {
        rows.iter().map(|u| u.user_id.to_string()).collect()
    }

    #[test]
    fn test_list_excludes_non_user_roles() {
        let dir = UserDirectory::from_users(sample());
        for filter in [StatusFilter::All, StatusFilter::Active, StatusFilter::Deactive] {
            for search in ["", "a", "admin", "coach", "dinuka"] {
                assert!(dir
                    .list_users(filter, search)
                    .iter()
                    .all(|u| u.role == Role::User));
            }
        }
    }

    #[test]
    fn test_active_filter_keeps_source_order() {
        let dir = UserDirectory::from_users(sample());
        assert_eq!(ids(&dir.list_users(StatusFilter::Active, "")), vec!["1", "5"]);
        assert_eq!(ids(&dir.list_users(StatusFilter::Deactive, "")), vec!["3"]);
        assert_eq!(ids(&dir.list_users(StatusFilter::All, "")), vec!["1", "3", "5"]);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let dir = UserDirectory::from_users(sample());
        assert_eq!(ids(&dir.list_users(StatusFilter::All, "KASUN")), vec!["1", "5"]);
        assert_eq!(ids(&dir.list_users(StatusFilter::All, "silva")), vec!["3"]);
        assert!(dir.list_users(StatusFilter::Active, "silva").is_empty());
    }

    #[test]
    fn test_visible_uses_held_state() {
        let mut dir = UserDirectory::from_users(sample());
        dir.set_filter(StatusFilter::Active);
        dir.set_search("fern");
        assert_eq!(ids(&dir.visible()), vec!["5"]);
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!(StatusFilter::from_str("Active User"), Some(StatusFilter::Active));
        assert_eq!(StatusFilter::from_str("deactive"), Some(StatusFilter::Deactive));
        assert_eq!(StatusFilter::from_str("ALL"), Some(StatusFilter::All));
        assert!(StatusFilter::from_str("banned").is_none());
        assert_eq!(StatusFilter::Deactive.label(), status_label(false));
    }

    #[test]
    fn test_refresh_replaces_list() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::new();
        assert_eq!(dir.refresh(&api).unwrap(), 6);
        assert_eq!(dir.users().len(), 6);
        assert_eq!(api.calls(), vec![Call::ListUsers]);
    }

    #[test]
    fn test_set_active_toggles_and_updates_cache() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::from_users(sample());

        let updated = dir.set_active(&api, &UserId::new("3"), true).unwrap();
        assert!(updated.is_active);
        assert!(dir.get(&UserId::new("3")).unwrap().is_active);
        assert_eq!(api.calls(), vec![Call::Toggle("3".to_string())]);
    }

    #[test]
    fn test_set_active_is_idempotent() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::from_users(sample());

        let user = dir.set_active(&api, &UserId::new("1"), true).unwrap();
        assert!(user.is_active);
        assert_eq!(api.calls(), vec![Call::ListUsers]);
    }

    #[test]
    fn test_set_active_rechecks_store_when_cache_agrees() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::from_users(sample());
        // cache says active, the store was deactivated elsewhere
        api.flip_remotely("1");

        let user = dir.set_active(&api, &UserId::new("1"), true).unwrap();
        assert!(user.is_active);
        assert!(api.remote_user("1").unwrap().is_active);
        assert!(dir.get(&UserId::new("1")).unwrap().is_active);
        assert_eq!(
            api.calls(),
            vec![Call::ListUsers, Call::Toggle("1".to_string())]
        );
    }

    #[test]
    fn test_set_active_converges_on_stale_cache() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::from_users(sample());
        // someone else already deactivated user 1
        api.flip_remotely("1");

        let user = dir.set_active(&api, &UserId::new("1"), false).unwrap();
        assert!(!user.is_active);
        assert!(!api.remote_user("1").unwrap().is_active);
        assert_eq!(api.count(|c| matches!(c, Call::Toggle(_))), 2);
    }

    #[test]
    fn test_set_active_unknown_user() {
        let api = FakeApi::with_users(sample());
        let mut dir = UserDirectory::from_users(sample());
        let err = dir.set_active(&api, &UserId::new("99"), false).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownUser(_)));
        assert!(api.calls().is_empty());
    }
}
