//! PivotRate Common Types
//!
//! This crate contains the types shared by the rate engine and the query service:
//! currency codes, pivot-qualified storage keys, stored rate records and the
//! fixed-scale rounding applied to every derived rate.

pub mod currency;
pub mod precision;
pub mod record;

pub use currency::*;
pub use precision::*;
pub use record::*;
