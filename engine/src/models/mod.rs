//! Data model of the working dataset.
//!
//! - [`Value`] - One typed cell (with `Null` as the missing marker)
//! - [`Column`] - A named sequence of values
//! - [`Dataset`] - Ordered, uniquely named, equally long columns

pub mod dataset;
pub mod value;

pub use dataset::{Column, Dataset};
pub use value::{duration_seconds, format_timestamp, Value};
