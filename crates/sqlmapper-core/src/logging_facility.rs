//! Tracing setup and event conventions for the ORM
//!
//! Every framework operation logs a `start` event and then exactly one of
//! `end` or `end_error`, tagged with `component`, `op` and `event`. Store
//! events add `db_tag` and `table`; a lock-contention retry inside
//! `update` is a `warn` with `event = "retry"`. Keys and names live in
//! `sqlmapper_core_types::schema`.
//!
//! Binaries call [`init`] once; tests install [`init_test_capture`]
//! instead and assert on the captured events.
//!
//! ```rust
//! use sqlmapper_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
