pub mod health;
pub mod launch;
pub mod outcome;
