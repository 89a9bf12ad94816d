//! Receptionist tools
//!
//! The three functions offered to the model during a call: availability
//! checks, booking, and caller self-identification. Booking is the only
//! write-classified tool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde_json::Value;

use crate::calendar::SimulatedCalendar;
use crate::interface::{required_str, InputSchema, PropertySchema, Tool, ToolError};
use crate::registry::ToolRegistry;

const DEFAULT_DURATION_MINUTES: i64 = 30;

fn parse_start(arguments: &Value) -> Result<NaiveDateTime, ToolError> {
    let raw = required_str(arguments, "start_iso")?;
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| ToolError::InvalidParams(format!("'start_iso' is not an ISO datetime: {raw}")))
}

fn parse_duration(arguments: &Value) -> Duration {
    let minutes = arguments
        .get("duration_minutes")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    Duration::minutes(minutes.clamp(5, 480))
}

/// Checks whether a slot is open on the calendar
pub struct AvailabilityTool {
    calendar: Arc<SimulatedCalendar>,
}

impl AvailabilityTool {
    pub fn new(calendar: Arc<SimulatedCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for AvailabilityTool {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Checks if a specific date and time is available on the calendar."
    }

    fn parameters(&self) -> InputSchema {
        InputSchema::object()
            .property(
                "start_iso",
                PropertySchema::string("ISO format start time (e.g. 2024-05-01T14:00:00)"),
                true,
            )
            .property(
                "duration_minutes",
                PropertySchema::integer("Duration in minutes (default 30)"),
                false,
            )
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let start = parse_start(&arguments)?;
        let duration = parse_duration(&arguments);
        if self.calendar.is_available(start, duration) {
            Ok(format!(
                "The slot on {} is available.",
                start.format("%B %d at %I:%M %p")
            ))
        } else {
            Ok("That time slot is already taken. Please suggest another time.".to_string())
        }
    }
}

/// Books an appointment. The one tool with a caller-visible side effect.
pub struct BookingTool {
    calendar: Arc<SimulatedCalendar>,
}

impl BookingTool {
    pub fn new(calendar: Arc<SimulatedCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for BookingTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Books an appointment on the calendar. Use ONLY after checking availability."
    }

    fn parameters(&self) -> InputSchema {
        InputSchema::object()
            .property(
                "start_iso",
                PropertySchema::string("ISO format start time"),
                true,
            )
            .property(
                "customer_name",
                PropertySchema::string("Full name of the caller"),
                true,
            )
            .property(
                "duration_minutes",
                PropertySchema::integer("Duration in minutes"),
                false,
            )
    }

    fn is_write_action(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let start = parse_start(&arguments)?;
        let duration = parse_duration(&arguments);
        let customer_name = required_str(&arguments, "customer_name")?;

        match self.calendar.book(start, duration, customer_name) {
            Ok(appointment) => Ok(format!(
                "Appointment confirmed for {}. Confirmation ID: {}",
                start.format("%B %d at %I:%M %p"),
                appointment.id
            )),
            Err(message) => Ok(format!("Error: {message}")),
        }
    }
}

/// Records the caller's name when they introduce themselves
#[derive(Default)]
pub struct IdentifySelfTool;

#[async_trait]
impl Tool for IdentifySelfTool {
    fn name(&self) -> &str {
        "identify_self"
    }

    fn description(&self) -> &str {
        "Call this immediately when the user identifies themselves or provides their name."
    }

    fn parameters(&self) -> InputSchema {
        InputSchema::object().property(
            "name",
            PropertySchema::string("The name provided by the user"),
            true,
        )
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let name = required_str(&arguments, "name")?;
        Ok(format!("Noted. The caller is {name}."))
    }
}

/// Registry with the standard receptionist tool set.
pub fn create_default_registry(calendar: Arc<SimulatedCalendar>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AvailabilityTool::new(calendar.clone())));
    registry.register(Arc::new(BookingTool::new(calendar)));
    registry.register(Arc::new(IdentifySelfTool));
    registry
}
