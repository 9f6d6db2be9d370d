//! Serialization of local value trees into wire shapes.
//!
//! Walking a tree is a synchronous structural recursion. The one side effect
//! is registration: every function leaf is entered into the method table
//! under a fresh handle, and that handle is what the shape carries.

use crate::shape::Shape;
use crate::tables::MethodTable;
use crate::value::ApiValue;

/// Describe `value` for the wire, registering every function leaf.
///
/// The same function appearing at two positions registers twice and yields
/// two distinct handles; there is no identity deduplication.
pub(crate) fn serialize(methods: &MethodTable, value: &ApiValue) -> Shape {
    match value {
        ApiValue::String(s) => Shape::String { value: s.clone() },
        ApiValue::Number(n) => Shape::Number { value: n.clone() },
        ApiValue::Array(items) => Shape::Array {
            value: items.iter().map(|item| serialize(methods, item)).collect(),
        },
        ApiValue::Object(entries) => Shape::Object {
            value: entries
                .iter()
                .map(|(key, item)| (key.clone(), serialize(methods, item)))
                .collect(),
        },
        ApiValue::Function(function) => Shape::Function {
            method_id: methods.register(function.clone()),
        },
    }
}
