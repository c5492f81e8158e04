//! Outcome callbacks: POX payloads, the processing pipeline, and upstream
//! forwarding to the UM service.

pub mod forwarder;
pub mod pox;
pub mod processor;

pub use forwarder::{HttpUmForwarder, UM_TIMEOUT, UmForwarder, UmOutcome, build_um_url};
pub use pox::{OutcomeRequest, POX_NS, parse_outcome, render_response};
pub use processor::{ForwardingConfig, OutcomeProcessor};
