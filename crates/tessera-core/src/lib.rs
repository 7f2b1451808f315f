//! Core types and trait definitions for the tessera member registry.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the two decision policies of the registry (ticket assignment and
//! renewal eligibility) as pure functions, the calendar that threads the
//! configured time zone into every date computation, and the
//! [`store::RegistryStore`] abstraction implemented by storage backends.

pub mod calendar;
pub mod error;
pub mod group;
pub mod registrant;
pub mod renewal;
pub mod store;
pub mod ticket;

pub use error::{Classify, Error, ErrorKind, Result};
pub use tessera_fiscal::FiscalCode;
