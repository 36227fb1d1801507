//! Typed request/response/event surface
//!
//! [`messages`] defines what travels between a front-end and the core;
//! [`service::CoreService`] implements it. The transport is left to the
//! embedder.

pub mod messages;
pub mod service;

pub use messages::{BusEvent, OutputKind, Request, Response};
pub use service::CoreService;
