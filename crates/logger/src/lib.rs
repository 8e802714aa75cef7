pub mod ratelimited;
pub mod tracing;
