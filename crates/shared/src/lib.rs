//! Optimize Shared - Wire contract between the engine and its host
//!
//! This crate contains everything that crosses the event hub:
//! - The [`Event`] envelope and the event type/source vocabulary
//! - Typed outbound request payloads (Optimize record, edge request)
//! - Typed inbound response payloads (decisions, errors, completion)
//! - [`OptimizeError`], the error callers of the engine receive
//!
//! # Design Principles
//!
//! 1. **No business logic** - Pure data types and serialization
//! 2. **Parse at the boundary** - Event data is only read through these types
//! 3. **Open maps only where the payload is free-form** (`xdm`, `data`, `scopeDetails`)

pub mod error;
pub mod events;
pub mod requests;
pub mod responses;

pub use error::{ErrorKind, OptimizeError, UpstreamError, TIMEOUT_STATUS};
pub use events::{event_name, event_source, event_type, Event};
pub use requests::{
    EdgeQuery, EdgeRequest, OptimizeRequest, PersonalizationQuery, RequestType,
    PERSONALIZATION_REQUEST_EVENT_TYPE,
};
pub use responses::{
    EdgeErrorResponse, PersonalizationResponse, PropositionsNotification, PropositionsResponse,
    UpdateComplete,
};
