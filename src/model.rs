//! Wire and domain types for users and the three booking categories.
//!
//! Field names follow the backend's camelCase JSON. Identifiers and money
//! amounts arrive either as JSON strings or numbers depending on the backing
//! table, so they are kept as display text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Accept RFC 3339, a SQL-style `YYYY-MM-DD HH:MM[:SS]` or a bare date (taken as midnight UTC)
fn de_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_instant(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date '{}'", text)))
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
}

/// Accept a JSON string or number and keep its textual form
fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_text")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(s)| s))
}

/// Opaque user identifier as issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de_text(deserializer).map(UserId)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Role {
    User,
    Coach,
    Admin,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Coach => "Coach",
            Self::Admin => "Admin",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

/// The three booking stores consulted before a user is deactivated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingCategory {
    Facility,
    Equipment,
    Session,
}

impl BookingCategory {
    /// Fixed processing order used by sequential runs and reports
    pub const ALL: [BookingCategory; 3] = [Self::Facility, Self::Equipment, Self::Session];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facility => "facility",
            Self::Equipment => "equipment",
            Self::Session => "session",
        }
    }

    /// Resource prefix on the backend router
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Facility => "facility-booking",
            Self::Equipment => "equipment-booking",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for BookingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityBooking {
    #[serde(deserialize_with = "de_text")]
    pub booking_id: String,
    #[serde(default)]
    pub sport_name: String,
    #[serde(deserialize_with = "de_text")]
    pub court_number: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub court_price: Option<String>,
    #[serde(deserialize_with = "de_instant")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub time_slots: Vec<String>,
    #[serde(default)]
    pub user_phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentBooking {
    #[serde(deserialize_with = "de_text")]
    pub booking_id: String,
    #[serde(default)]
    pub sport_name: String,
    #[serde(default)]
    pub equipment_name: String,
    #[serde(deserialize_with = "de_instant")]
    pub date_time: DateTime<Utc>,
    #[serde(deserialize_with = "de_text")]
    pub quantity: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub equipment_price: Option<String>,
    #[serde(default)]
    pub user_phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedTimeSlot {
    pub date: String,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBooking {
    #[serde(deserialize_with = "de_text")]
    pub session_id: String,
    #[serde(default)]
    pub sport_name: String,
    #[serde(default)]
    pub session_type: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub court_no: Option<String>,
    #[serde(default)]
    pub coach_name: String,
    #[serde(default)]
    pub booked_time_slots: Vec<BookedTimeSlot>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub session_fee: Option<String>,
    #[serde(default)]
    pub user_phone: Option<String>,
}

/// Start time of a `"HH:MM - HH:MM"` slot label
pub fn slot_start(label: &str) -> Option<NaiveTime> {
    let start = label.split('-').next()?.trim();
    NaiveTime::parse_from_str(start, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(start, "%I:%M %p"))
        .or_else(|_| NaiveTime::parse_from_str(start, "%I:%M%p"))
        .ok()
}

/// Calendar date of either a plain `YYYY-MM-DD` or a full timestamp
fn slot_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn at(date: NaiveDate, label: &str) -> DateTime<Utc> {
    let time = slot_start(label).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

/// Anything with one or more scheduled instants
pub trait Scheduled {
    fn scheduled_at(&self) -> Vec<DateTime<Utc>>;

    /// A booking is future when any of its slots is strictly after `now`
    fn is_future_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at().into_iter().any(|t| t > now)
    }

    fn next_slot_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.scheduled_at().into_iter().filter(|t| *t > now).min()
    }
}

impl Scheduled for FacilityBooking {
    fn scheduled_at(&self) -> Vec<DateTime<Utc>> {
        if self.time_slots.is_empty() {
            return vec![self.date];
        }
        let day = self.date.date_naive();
        self.time_slots.iter().map(|slot| at(day, slot)).collect()
    }
}

impl Scheduled for EquipmentBooking {
    fn scheduled_at(&self) -> Vec<DateTime<Utc>> {
        vec![self.date_time]
    }
}

impl Scheduled for SessionBooking {
    fn scheduled_at(&self) -> Vec<DateTime<Utc>> {
        self.booked_time_slots
            .iter()
            .filter_map(|slot| slot_date(&slot.date).map(|day| at(day, &slot.time_slot)))
            .collect()
    }
}

/// Future bookings of one user across all three stores
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FutureBookings {
    pub facility: Vec<FacilityBooking>,
    pub equipment: Vec<EquipmentBooking>,
    pub session: Vec<SessionBooking>,
}

impl FutureBookings {
    pub fn is_empty(&self) -> bool {
        self.facility.is_empty() && self.equipment.is_empty() && self.session.is_empty()
    }

    pub fn total(&self) -> usize {
        self.facility.len() + self.equipment.len() + self.session.len()
    }

    pub fn count(&self, category: BookingCategory) -> usize {
        match category {
            BookingCategory::Facility => self.facility.len(),
            BookingCategory::Equipment => self.equipment.len(),
            BookingCategory::Session => self.session.len(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_user_accepts_numeric_and_text_ids() {
        let numeric: User = serde_json::from_value(json!({
            "userId": 42, "name": "Kasun", "email": "k@x.lk", "role": "User", "isActive": true
        }))
        .unwrap();
        assert_eq!(numeric.user_id.as_str(), "42");

        let text: User = serde_json::from_value(json!({
            "userId": "U-007", "name": "Ama", "email": "a@x.lk", "role": "Coach", "isActive": false
        }))
        .unwrap();
        assert_eq!(text.user_id, UserId::new("U-007"));
        assert_eq!(text.role, Role::Coach);
    }

    #[test]
    fn test_unknown_role_is_other() {
        let user: User = serde_json::from_value(json!({
            "userId": "1", "name": "Root", "email": "r@x.lk", "role": "SuperAdmin", "isActive": true
        }))
        .unwrap();
        assert_eq!(user.role, Role::Other);
    }

    #[test]
    fn test_facility_booking_from_backend_json() {
        let booking: FacilityBooking = serde_json::from_value(json!({
            "bookingId": 9,
            "sportName": "Futsal",
            "courtNumber": 3,
            "courtPrice": "2500.00",
            "date": "2030-01-05T00:00:00.000Z",
            "timeSlots": ["08:00 - 09:00", "09:00 - 10:00"],
            "userPhoneNumber": "0712345678"
        }))
        .unwrap();
        assert_eq!(booking.booking_id, "9");
        assert_eq!(booking.court_number, "3");
        assert_eq!(booking.court_price.as_deref(), Some("2500.00"));
        assert_eq!(
            booking.scheduled_at(),
            vec![
                Utc.with_ymd_and_hms(2030, 1, 5, 8, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2030, 1, 5, 9, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_facility_booking_with_plain_date() {
        let booking: FacilityBooking = serde_json::from_value(json!({
            "bookingId": 9,
            "sportName": "Futsal",
            "courtNumber": 3,
            "date": "2030-01-05",
            "timeSlots": ["08:00 - 09:00"]
        }))
        .unwrap();
        assert_eq!(booking.date, Utc.with_ymd_and_hms(2030, 1, 5, 0, 0, 0).unwrap());
        assert_eq!(
            booking.scheduled_at(),
            vec![Utc.with_ymd_and_hms(2030, 1, 5, 8, 0, 0).unwrap()]
        );
    }

    #[test]
    fn test_equipment_booking_with_sql_datetime() {
        let booking: EquipmentBooking = serde_json::from_value(json!({
            "bookingId": "E-1",
            "sportName": "Tennis",
            "equipmentName": "Racket",
            "dateTime": "2030-01-05 10:00:00",
            "quantity": 2
        }))
        .unwrap();
        assert_eq!(
            booking.date_time,
            Utc.with_ymd_and_hms(2030, 1, 5, 10, 0, 0).unwrap()
        );
        assert_eq!(booking.quantity, "2");
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 5, 10, 30, 0).unwrap();
        assert_eq!(parse_instant("2030-01-05T10:30:00.000Z"), Some(expected));
        assert_eq!(parse_instant("2030-01-05T16:00:00+05:30"), Some(expected));
        assert_eq!(parse_instant("2030-01-05 10:30"), Some(expected));
        assert_eq!(parse_instant("2030-01-05T10:30:00"), Some(expected));
        assert_eq!(parse_instant("next tuesday"), None);

        let err = serde_json::from_value::<EquipmentBooking>(json!({
            "bookingId": 1, "dateTime": "soon", "quantity": 1
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unrecognized date"));
    }

    #[test]
    fn test_slot_start_formats() {
        assert_eq!(slot_start("10:00 - 11:00"), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(slot_start("07:30 PM - 08:30 PM"), NaiveTime::from_hms_opt(19, 30, 0));
        assert_eq!(slot_start("whenever"), None);
    }

    #[test]
    fn test_future_is_strictly_after_now() {
        let booking = fixtures::equipment("e1");
        let exactly = booking.date_time;
        assert!(!booking.is_future_at(exactly));
        assert!(booking.is_future_at(exactly - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_session_next_slot_skips_past_slots() {
        let mut booking = fixtures::session("s1");
        booking.booked_time_slots.insert(
            0,
            BookedTimeSlot {
                date: "2020-01-01".to_string(),
                time_slot: "10:00 - 11:00".to_string(),
            },
        );
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            booking.next_slot_after(now),
            Some(Utc.with_ymd_and_hms(2030, 3, 16, 17, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_future_bookings_counts() {
        let mut bookings = FutureBookings::default();
        assert!(bookings.is_empty());

        bookings.facility.push(fixtures::facility("f1"));
        bookings.session.push(fixtures::session("s1"));
        assert!(!bookings.is_empty());
        assert_eq!(bookings.total(), 2);
        assert_eq!(bookings.count(BookingCategory::Facility), 1);
        assert_eq!(bookings.count(BookingCategory::Equipment), 0);
    }
}
