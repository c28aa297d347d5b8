//! Argument conversion for the client handle.

use crate::models::{NamedValue, Value};

/// Positional arguments as ordinal-numbered values, starting at 1.
pub(crate) fn named_args(args: &[Value]) -> Vec<NamedValue> {
    args.iter()
        .enumerate()
        .map(|(i, value)| NamedValue::new(i + 1, value.clone()))
        .collect()
}
