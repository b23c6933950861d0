//! Orchestration engine for AI-generated marketing creatives.
//!
//! adforge discovers a product's marketing DNA from a URL or image,
//! recommends creative strategies, and drives a remote generation gateway to
//! produce landing-page sections, ad creatives, and short videos. The engine
//! is a typed state machine: every mutation flows through the session
//! reducer, long-running jobs settle through a generic poller, and the
//! autopilot drains a FIFO of unfinished targets one job at a time.

pub mod autopilot;
pub mod chat;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod poller;
pub mod session;
pub mod storage;

pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use session::{Session, SessionAction, SessionPhase};
