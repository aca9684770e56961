//! The external meeting service, as seen by the core.
//!
//! # Types
//!
//! - [`MeetingService`]: Async request/response contract
//! - [`ChangeStream`]: Async push channel for one event
//! - [`ServiceError`]: Failures a service implementation reports

mod error;
mod traits;
mod types;

pub use error::{ServiceError, ServiceResult};
pub use traits::{ChangeStream, MeetingService};
pub use types::{EventUpdate, JoinedParticipant, NewMeetingEvent, NewParticipant, StreamMessage};
