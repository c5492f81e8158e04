//! Application-level composition of the engine's services.

pub mod unit_of_work;

pub use unit_of_work::LtiUnitOfWork;
