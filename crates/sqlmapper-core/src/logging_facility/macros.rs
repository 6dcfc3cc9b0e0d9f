//! Canonical logging macros

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use sqlmapper_core::log_op_start;
/// log_op_start!("save");
/// log_op_start!("save", table = "ts_person");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use sqlmapper_core::log_op_end;
/// log_op_end!("save", duration_ms = 3);
/// log_op_end!("save", duration_ms = 3, rows = 1);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// `$err` is anything that borrows as an `OrmError`.
///
/// # Example
///
/// ```
/// # use sqlmapper_core::log_op_error;
/// # use sqlmapper_core::errors::{OrmError, OrmErrorKind};
/// let err = OrmError::new(OrmErrorKind::Persistence).with_message("disk full");
/// log_op_error!("save", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let orm_err: &$crate::errors::OrmError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?orm_err.kind(),
            err.code = orm_err.code(),
            message = %orm_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let orm_err: &$crate::errors::OrmError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?orm_err.kind(),
            err.code = orm_err.code(),
            message = %orm_err,
            $($field)*
        );
    }};
}
