//! HTTP surface for the Splicer LTI engine.
//!
//! The interesting logic (signing, outcome processing, storage) lives in
//! `splicer-core`; this crate owns configuration, routing, the three HTTP
//! handlers, and the background cache reaper.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;
