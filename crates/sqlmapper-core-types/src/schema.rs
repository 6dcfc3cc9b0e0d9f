//! Log vocabulary shared by the catalog, the persistence contexts and the
//! mappers
//!
//! Field keys are what the test capture layer indexes events by. Operation
//! names cover the framework-level operations; mapper operations are named
//! after the mapper method (`save`, `delete_where`, ...).

// Field keys every `log_op_*!` event carries
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";

// Field keys attached by the store
pub const FIELD_DB_TAG: &str = "db_tag";
pub const FIELD_TABLE: &str = "table";

// Operation names
pub const OP_CATALOG_COMPILE: &str = "catalog_compile";
pub const OP_REGISTRY_BUILD: &str = "registry_build";
pub const OP_REGISTRY_PREPARE: &str = "registry_prepare";
pub const OP_UPDATE: &str = "update";

// Event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
/// A write transaction hit lock contention and is run once more
pub const EVENT_RETRY: &str = "retry";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        let events = [EVENT_START, EVENT_END, EVENT_END_ERROR, EVENT_RETRY];
        for (i, a) in events.iter().enumerate() {
            for b in &events[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_operation_names_are_snake_case() {
        for op in [
            OP_CATALOG_COMPILE,
            OP_REGISTRY_BUILD,
            OP_REGISTRY_PREPARE,
            OP_UPDATE,
        ] {
            assert!(op.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
