//! Retry policy for delivery operations

mod retry;

pub use retry::RetryPolicy;
