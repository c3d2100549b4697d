//! Small shared utilities used across the timeline audio engine crates:
//! real-time-safe tracing macros, non-crypto hashing, approximate float
//! comparison, duplicate-id validation, and a fine-grained observer.

pub mod approx_f64;
pub mod hash_util;
pub mod observer;
pub mod tracing_util;
pub mod validation_util;

pub use approx_f64::{ApproxF64, AudioF64};
pub use observer::{Observable, SubscriptionHandle};
pub use validation_util::{ensure_no_duplicate, ValidationError};
