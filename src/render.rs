//! Plain-text tables for the terminal.

use crate::deactivation::{CascadeReport, Removal};
use crate::model::{BookingCategory, FutureBookings, Scheduled, User};
use crate::users::status_label;
use chrono::{DateTime, Utc};

/// Column-aligned text table
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: Vec<&str>| -> String {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(self.headers.clone()));
        let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push(line(rules.iter().map(String::as_str).collect()));
        for row in &self.rows {
            out.push(line(row.iter().map(String::as_str).collect()));
        }
        out.join("\n")
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

fn when(next: Option<DateTime<Utc>>) -> String {
    next.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn users_table(users: &[&User]) -> String {
    if users.is_empty() {
        return "No users match.".to_string();
    }
    let mut table = Table::new(vec!["User Id", "Full Name", "Email Address", "Role", "Status"]);
    for user in users {
        table.push(vec![
            user.user_id.to_string(),
            user.name.clone(),
            user.email.clone(),
            user.role.as_str().to_string(),
            status_label(user.is_active).to_string(),
        ]);
    }
    table.render()
}

pub fn future_bookings(bookings: &FutureBookings, now: DateTime<Utc>) -> String {
    let mut sections = Vec::new();

    let mut facility = Table::new(vec![
        "Sport Name",
        "Court Number",
        "Court Price",
        "Booking Date",
        "Time Slots",
        "Phone Number",
        "Next",
    ]);
    for b in &bookings.facility {
        facility.push(vec![
            b.sport_name.clone(),
            b.court_number.clone(),
            or_dash(b.court_price.as_deref()),
            b.date.format("%Y-%m-%d").to_string(),
            b.time_slots.join(", "),
            or_dash(b.user_phone_number.as_deref()),
            when(b.next_slot_after(now)),
        ]);
    }

    let mut equipment = Table::new(vec![
        "Sport Name",
        "Equipment Name",
        "Booking Date",
        "Quantity",
        "Price",
        "Phone Number",
        "Next",
    ]);
    for b in &bookings.equipment {
        equipment.push(vec![
            b.sport_name.clone(),
            b.equipment_name.clone(),
            b.date_time.format("%Y-%m-%d").to_string(),
            b.quantity.clone(),
            or_dash(b.equipment_price.as_deref()),
            or_dash(b.user_phone_number.as_deref()),
            when(b.next_slot_after(now)),
        ]);
    }

    let mut session = Table::new(vec![
        "Sport",
        "Session Type",
        "Court",
        "Coach",
        "Date / Time Slot",
        "Fee",
        "Phone Number",
        "Next",
    ]);
    for b in &bookings.session {
        let slots: Vec<String> = b
            .booked_time_slots
            .iter()
            .map(|s| format!("{} {}", s.date, s.time_slot))
            .collect();
        session.push(vec![
            b.sport_name.clone(),
            b.session_type.clone(),
            or_dash(b.court_no.as_deref()),
            b.coach_name.clone(),
            slots.join(", "),
            or_dash(b.session_fee.as_deref()),
            or_dash(b.user_phone.as_deref()),
            when(b.next_slot_after(now)),
        ]);
    }

    for (category, table) in [
        (BookingCategory::Facility, facility),
        (BookingCategory::Equipment, equipment),
        (BookingCategory::Session, session),
    ] {
        let title = match category {
            BookingCategory::Facility => "Facility Bookings",
            BookingCategory::Equipment => "Equipment Bookings",
            BookingCategory::Session => "Session Bookings",
        };
        if table.rows.is_empty() {
            sections.push(format!("{}: none", title));
        } else {
            sections.push(format!("{} ({})\n{}", title, table.rows.len(), table.render()));
        }
    }

    sections.join("\n\n")
}

pub fn cascade_report(report: &CascadeReport) -> String {
    BookingCategory::ALL
        .iter()
        .map(|c| {
            let outcome = match report.get(*c) {
                Removal::Deleted => "cancelled",
                Removal::NothingToDelete => "nothing to cancel",
            };
            format!("  {}: {}", c, outcome)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{facility, session, user};
    use crate::model::Role;
    use chrono::TimeZone;

    #[test]
    fn test_users_table_aligns_columns() {
        let a = user("1", "Kasun Perera", Role::User, true);
        let b = user("12", "Ama", Role::User, false);
        let out = users_table(&[&a, &b]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("User Id  Full Name"));
        assert!(lines[2].contains("Active User"));
        assert!(lines[3].ends_with("Deactive User"));
        // every row starts the name column at the same offset
        let offset = lines[0].find("Full Name").unwrap();
        assert_eq!(lines[2].find("Kasun").unwrap(), offset);
        assert_eq!(lines[3].find("Ama").unwrap(), offset);
    }

    #[test]
    fn test_empty_users_table() {
        assert_eq!(users_table(&[]), "No users match.");
    }

    #[test]
    fn test_future_bookings_sections() {
        let bookings = FutureBookings {
            facility: vec![facility("f1")],
            equipment: Vec::new(),
            session: vec![session("s1")],
        };
        let now = Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap();
        let out = future_bookings(&bookings, now);
        assert!(out.contains("Facility Bookings (1)"));
        assert!(out.contains("Equipment Bookings: none"));
        assert!(out.contains("Session Bookings (1)"));
        assert!(out.contains("2030-03-14 10:00"));
        assert!(out.contains("2030-03-16 17:00 - 18:00"));
    }

    #[test]
    fn test_cascade_report_lines() {
        let report = CascadeReport {
            facility: Removal::Deleted,
            equipment: Removal::NothingToDelete,
            session: Removal::NothingToDelete,
        };
        assert_eq!(
            cascade_report(&report),
            "  facility: cancelled\n  equipment: nothing to cancel\n  session: nothing to cancel"
        );
    }
}
