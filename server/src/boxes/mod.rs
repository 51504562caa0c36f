mod builder;
mod processor;
mod store;


pub use builder::BoxBuilder;
pub use processor::Processor;
pub use store::{BoxError, BoxStore};
