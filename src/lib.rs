pub mod context;
pub mod error;
pub mod group;
pub mod marker;
pub mod outcome;
pub mod phase;

mod processor;
pub use processor::*;

mod driver;
pub use driver::*;

mod schedule;

#[cfg(test)]
pub(crate) mod test_support;
