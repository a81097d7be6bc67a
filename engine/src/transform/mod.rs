//! Transformation module.
//!
//! - [`steps`] - The `transform` configuration section (closed set of step types)
//! - [`arithmetic`] - Element-wise binary operators
//! - [`aggregate`] - Group reductions broadcast back onto every row
//! - [`executor`] - Runs the step list against the working dataset

pub mod aggregate;
pub mod arithmetic;
pub mod executor;
pub mod steps;

pub use executor::transform;
pub use steps::{operations_description, AggregateOp, ArithmeticOp, TransformConfig, TransformStep};
