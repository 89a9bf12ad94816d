//! Simulated calendar backend
//!
//! Stands in for a real calendar integration. Keeps booked intervals in
//! memory and answers overlap queries. Replaceable later without touching
//! the tool layer, which only speaks availability and booking.

use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;
use uuid::Uuid;

/// A confirmed booking
#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub customer_name: String,
}

/// In-memory calendar with overlap-based availability
#[derive(Default)]
pub struct SimulatedCalendar {
    appointments: RwLock<Vec<Appointment>>,
}

impl SimulatedCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no existing appointment overlaps `[start, start + duration)`.
    pub fn is_available(&self, start: NaiveDateTime, duration: Duration) -> bool {
        let end = start + duration;
        !self
            .appointments
            .read()
            .iter()
            .any(|a| a.start < end && start < a.end)
    }

    /// Book an appointment. Fails if the slot overlaps an existing booking.
    pub fn book(
        &self,
        start: NaiveDateTime,
        duration: Duration,
        customer_name: &str,
    ) -> Result<Appointment, String> {
        let mut appointments = self.appointments.write();
        let end = start + duration;
        // Re-check under the write lock so two concurrent bookings cannot
        // both land on the same slot.
        if appointments.iter().any(|a| a.start < end && start < a.end) {
            return Err("That time slot is no longer available".to_string());
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            start,
            end,
            customer_name: customer_name.to_string(),
        };
        appointments.push(appointment.clone());
        tracing::info!(
            appointment_id = %appointment.id,
            start = %start,
            "Appointment booked"
        );
        Ok(appointment)
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn test_empty_calendar_is_available() {
        let cal = SimulatedCalendar::new();
        assert!(cal.is_available(dt("2025-06-02T14:00:00"), Duration::minutes(30)));
    }

    #[test]
    fn test_overlapping_booking_rejected() {
        let cal = SimulatedCalendar::new();
        cal.book(dt("2025-06-02T14:00:00"), Duration::minutes(30), "Ana")
            .unwrap();

        // Exact same slot
        assert!(cal
            .book(dt("2025-06-02T14:00:00"), Duration::minutes(30), "Ben")
            .is_err());
        // Partial overlap
        assert!(!cal.is_available(dt("2025-06-02T14:15:00"), Duration::minutes(30)));
        // Back-to-back is fine
        assert!(cal.is_available(dt("2025-06-02T14:30:00"), Duration::minutes(30)));
    }
}
