//! Testing support for worktrack.
//!
//! - **Fixtures**: sample work unit documents in the states tests need
//! - **Assertions**: checks for the consistency rules a repaired unit obeys
//!
//! # Example
//!
//! ```rust,ignore
//! use worktrack::testing::{assert_consistent, fixtures};
//! use worktrack::work_unit::parse_record;
//!
//! let unit = parse_record(fixtures::TASKED_UNIT).unwrap();
//! assert_consistent(&unit);
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
