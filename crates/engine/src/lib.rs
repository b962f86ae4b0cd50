//! The durable meal-planning workflow engine.
//!
//! A plan run is a typed state machine persisted after every step:
//!
//! ```text
//! Start -> ExtractCalendar -> AwaitCalendarConfirmation (pause)
//!       -> ExpandSlots -> PlanSlot/StoreSlot (loop)
//!       -> AwaitPlanReview (pause) -> PersistPlan
//!       -> ModifyEntry (loop) -> Done
//! ```
//!
//! `engine` drives the machine one checkpointed step at a time; the step
//! bodies live under `steps`, one module per phase. `service` is the public
//! start/resume/status surface keyed by thread id.

pub mod engine;
pub mod service;
mod steps;

pub use engine::{EngineSettings, WorkflowEngine};
pub use service::{PlannerService, WorkflowResponse};
