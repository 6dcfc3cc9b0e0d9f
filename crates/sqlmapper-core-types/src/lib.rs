//! Core types shared by the sqlmapper error and logging facilities
//!
//! - **Correlation**: `RequestId` tagging every write transaction
//! - **Sensitive data**: `Sensitive<T>` marker for database secrets
//! - **Schema constants**: canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::RequestId;
pub use sensitive::Sensitive;
