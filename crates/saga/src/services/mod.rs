//! Outbound collaborators of the saga and the policies wrapping them.

pub mod progress;
pub mod resilience;

pub use progress::{
    CourseProgressRecalculator, HttpProgressRecalculator, InMemoryProgressRecalculator,
    LoggingProgressRecalculator,
};
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};
