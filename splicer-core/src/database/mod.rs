//! Durable state: repository ports and their Postgres adapters.

#[cfg(test)]
pub(crate) mod memory;
pub mod ports;
pub mod postgres;
