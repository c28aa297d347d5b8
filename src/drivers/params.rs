//! Parameter binding utilities for the sqlx driver.
//!
//! Arguments are bound positionally; names carried by [`NamedValue`] are not
//! interpreted here.

use crate::models::{NamedValue, Value};
use sqlx::Any;
use sqlx::any::AnyArguments;
use sqlx::query::Query;

/// Bind a value to an `Any` query.
pub(crate) fn bind_any_param<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
    }
}

/// Bind all arguments in ordinal order.
pub(crate) fn bind_args<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    args: &[NamedValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    let mut ordered: Vec<&NamedValue> = args.iter().collect();
    ordered.sort_by_key(|arg| arg.ordinal);
    ordered
        .into_iter()
        .fold(query, |query, arg| bind_any_param(query, &arg.value))
}
