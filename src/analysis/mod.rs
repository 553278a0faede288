//! Analysis layer
//!
//! Turns raw recognizer text into validated counter values and votes across
//! observations to find the value the cycle can trust.

pub mod stability;
pub mod value;

pub use stability::{aggregate, Observation, StableValue};
pub use value::{extract_value, ValueBounds};
