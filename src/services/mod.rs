pub mod aggregator;
pub mod invoker;
pub mod project;
pub mod risk;
pub mod severity;
pub mod worker;
