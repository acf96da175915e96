//! Service layer

pub mod accounts;
pub mod monitor;

pub use accounts::AccountStore;
