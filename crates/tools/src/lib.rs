//! Tools the receptionist can invoke mid-call
//!
//! Tools are exposed to the realtime session as function definitions and
//! executed out-of-band while the AI waits. Write-classified tools (those
//! with side effects a caller would notice, like booking) are flagged so
//! the shadow evaluator can refuse to ever execute them during replay.

pub mod calendar;
pub mod interface;
pub mod receptionist;
pub mod registry;

pub use calendar::{Appointment, SimulatedCalendar};
pub use interface::{InputSchema, PropertySchema, Tool, ToolError, ToolSpec};
pub use receptionist::{create_default_registry, AvailabilityTool, BookingTool, IdentifySelfTool};
pub use registry::ToolRegistry;
