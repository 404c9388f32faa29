use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    BookingCategory, EquipmentBooking, FacilityBooking, SessionBooking, User, UserId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Body of `PUT /user/toggle/{id}`; the rest of the user record is ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResponse {
    is_active: bool,
}

/// Trait for the booking backend to allow mocking and abstraction.
///
/// `Sync` so the three per-category requests can be issued from scoped threads.
pub trait FbsApi: Sync {
    fn list_users(&self) -> ApiResult<Vec<User>>;
    /// Flip the active flag and return the new value
    fn toggle_user(&self, user_id: &UserId) -> ApiResult<bool>;
    fn future_facility_bookings(&self, user_id: &UserId) -> ApiResult<Vec<FacilityBooking>>;
    fn future_equipment_bookings(&self, user_id: &UserId) -> ApiResult<Vec<EquipmentBooking>>;
    fn future_session_bookings(&self, user_id: &UserId) -> ApiResult<Vec<SessionBooking>>;
    fn delete_future_bookings(&self, category: BookingCategory, user_id: &UserId)
        -> ApiResult<()>;
}

pub struct Client {
    base_url: String,
    auth_header: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(config: &ApiConfig, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms()))
            .build();
        Self {
            base_url: config.base_url().trim_end_matches('/').to_string(),
            auth_header: config.auth_header().to_string(),
            token,
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let req = self.agent.request(method, &self.url(path));
        match &self.token {
            Some(token) if self.auth_header.eq_ignore_ascii_case("authorization") => {
                req.set(&self.auth_header, &format!("Bearer {}", token))
            }
            Some(token) => req.set(&self.auth_header, token),
            None => req,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let resp = self.request("GET", path).call().map_err(classify)?;
        decode(resp)
    }
}

fn future_path(category: BookingCategory, user_id: &UserId) -> String {
    format!("{}/user/{}/future", category.resource(), user_id)
}

fn decode<T: DeserializeOwned>(resp: ureq::Response) -> ApiResult<T> {
    resp.into_json::<T>()
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn classify(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            status_error(code, body)
        }
        ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
    }
}

fn status_error(status: u16, body: String) -> ApiError {
    if status == 404 {
        ApiError::NotFound(body)
    } else {
        ApiError::Status { status, body }
    }
}

impl FbsApi for Client {
    fn list_users(&self) -> ApiResult<Vec<User>> {
        self.get_json("user/all")
    }

    fn toggle_user(&self, user_id: &UserId) -> ApiResult<bool> {
        let resp = self
            .request("PUT", &format!("user/toggle/{}", user_id))
            .send_json(serde_json::json!({}))
            .map_err(classify)?;
        let body: ToggleResponse = decode(resp)?;
        Ok(body.is_active)
    }

    fn future_facility_bookings(&self, user_id: &UserId) -> ApiResult<Vec<FacilityBooking>> {
        self.get_json(&future_path(BookingCategory::Facility, user_id))
    }

    fn future_equipment_bookings(&self, user_id: &UserId) -> ApiResult<Vec<EquipmentBooking>> {
        self.get_json(&future_path(BookingCategory::Equipment, user_id))
    }

    fn future_session_bookings(&self, user_id: &UserId) -> ApiResult<Vec<SessionBooking>> {
        self.get_json(&future_path(BookingCategory::Session, user_id))
    }

    fn delete_future_bookings(
        &self,
        category: BookingCategory,
        user_id: &UserId,
    ) -> ApiResult<()> {
        self.request("DELETE", &future_path(category, user_id))
            .call()
            .map_err(classify)?;
        Ok(())
    }
}

/// In-memory backend that behaves like the real one: an empty category
/// answers 404, and every call is recorded.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::model::FutureBookings;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        ListUsers,
        Toggle(String),
        Read(BookingCategory, String),
        Delete(BookingCategory, String),
    }

    #[derive(Default)]
    pub struct FakeApi {
        users: Mutex<Vec<User>>,
        bookings: Mutex<HashMap<String, FutureBookings>>,
        read_failures: Mutex<HashMap<BookingCategory, u16>>,
        delete_failures: Mutex<HashMap<BookingCategory, u16>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeApi {
        pub fn with_users(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Default::default()
            }
        }

        pub fn set_bookings(&self, user_id: &str, bookings: FutureBookings) {
            self.bookings
                .lock()
                .unwrap()
                .insert(user_id.to_string(), bookings);
        }

        pub fn bookings_of(&self, user_id: &str) -> FutureBookings {
            self.bookings
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn fail_read(&self, category: BookingCategory, status: u16) {
            self.read_failures.lock().unwrap().insert(category, status);
        }

        pub fn fail_delete(&self, category: BookingCategory, status: u16) {
            self.delete_failures
                .lock()
                .unwrap()
                .insert(category, status);
        }

        pub fn clear_failures(&self) {
            self.read_failures.lock().unwrap().clear();
            self.delete_failures.lock().unwrap().clear();
        }

        /// Flip a user's flag behind the client's back
        pub fn flip_remotely(&self, user_id: &str) {
            for user in self.users.lock().unwrap().iter_mut() {
                if user.user_id.as_str() == user_id {
                    user.is_active = !user.is_active;
                }
            }
        }

        pub fn remote_user(&self, user_id: &str) -> Option<User> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.user_id.as_str() == user_id)
                .cloned()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
        }

        pub fn reset_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn read<T: Clone>(
            &self,
            category: BookingCategory,
            user_id: &UserId,
            pick: impl Fn(&FutureBookings) -> &Vec<T>,
        ) -> ApiResult<Vec<T>> {
            self.record(Call::Read(category, user_id.to_string()));
            if let Some(status) = self.read_failures.lock().unwrap().get(&category) {
                return Err(status_error(*status, "scripted failure".to_string()));
            }
            let bookings = self.bookings.lock().unwrap();
            match bookings.get(user_id.as_str()).map(&pick) {
                Some(list) if !list.is_empty() => Ok(list.clone()),
                _ => Err(ApiError::NotFound("No future bookings found".to_string())),
            }
        }
    }

    impl FbsApi for FakeApi {
        fn list_users(&self) -> ApiResult<Vec<User>> {
            self.record(Call::ListUsers);
            Ok(self.users.lock().unwrap().clone())
        }

        fn toggle_user(&self, user_id: &UserId) -> ApiResult<bool> {
            self.record(Call::Toggle(user_id.to_string()));
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| &u.user_id == user_id)
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
            user.is_active = !user.is_active;
            Ok(user.is_active)
        }

        fn future_facility_bookings(&self, user_id: &UserId) -> ApiResult<Vec<FacilityBooking>> {
            self.read(BookingCategory::Facility, user_id, |b| &b.facility)
        }

        fn future_equipment_bookings(
            &self,
            user_id: &UserId,
        ) -> ApiResult<Vec<EquipmentBooking>> {
            self.read(BookingCategory::Equipment, user_id, |b| &b.equipment)
        }

        fn future_session_bookings(&self, user_id: &UserId) -> ApiResult<Vec<SessionBooking>> {
            self.read(BookingCategory::Session, user_id, |b| &b.session)
        }

        fn delete_future_bookings(
            &self,
            category: BookingCategory,
            user_id: &UserId,
        ) -> ApiResult<()> {
            self.record(Call::Delete(category, user_id.to_string()));
            if let Some(status) = self.delete_failures.lock().unwrap().get(&category) {
                return Err(status_error(*status, "scripted failure".to_string()));
            }
            let mut bookings = self.bookings.lock().unwrap();
            let Some(entry) = bookings.get_mut(user_id.as_str()) else {
                return Err(ApiError::NotFound("No future bookings found".to_string()));
            };
            let removed = match category {
                BookingCategory::Facility => std::mem::take(&mut entry.facility).len(),
                BookingCategory::Equipment => std::mem::take(&mut entry.equipment).len(),
                BookingCategory::Session => std::mem::take(&mut entry.session).len(),
            };
            if removed == 0 {
                return Err(ApiError::NotFound("No future bookings found".to_string()));
            }
            Ok(())
        }
    }
}
