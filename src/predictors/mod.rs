pub mod batch;
pub mod conjunctions;
pub mod snapshot;
