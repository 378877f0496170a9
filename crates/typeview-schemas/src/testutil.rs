//! Shared proptest strategies for schema tests.

use proptest::prelude::*;

/// Strategy for generating type-name-like identifiers.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9]{0,11}"
}
