use crate::handle::Handle;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// Wire description of a value tree.
///
/// Shapes mirror [`ApiValue`](crate::ApiValue) structurally, except that
/// every function leaf is replaced by the exporter's opaque handle. An
/// unknown `type` tag fails decoding, which is how booleans, null, and any
/// other out-of-model scalar are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    String {
        value: String,
    },
    Number {
        value: Number,
    },
    Object {
        value: BTreeMap<String, Shape>,
    },
    Array {
        value: Vec<Shape>,
    },
    Function {
        #[serde(rename = "methodId")]
        method_id: Handle,
    },
}

impl Shape {
    /// Handles of every function leaf, in traversal order.
    pub fn function_handles(&self) -> Vec<&Handle> {
        let mut handles = Vec::new();
        self.collect_handles(&mut handles);
        handles
    }

    fn collect_handles<'a>(&'a self, into: &mut Vec<&'a Handle>) {
        match self {
            Shape::String { .. } | Shape::Number { .. } => {}
            Shape::Object { value } => {
                for shape in value.values() {
                    shape.collect_handles(into);
                }
            }
            Shape::Array { value } => {
                for shape in value {
                    shape.collect_handles(into);
                }
            }
            Shape::Function { method_id } => into.push(method_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_carry_a_type_tag() {
        let shape = Shape::String {
            value: "baz".to_string(),
        };
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json, json!({"type": "string", "value": "baz"}));

        let shape = Shape::Number {
            value: Number::from(7),
        };
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json, json!({"type": "number", "value": 7}));
    }

    #[test]
    fn function_leaves_carry_the_method_id() {
        let shape = Shape::Function {
            method_id: Handle::from_text("abc123"),
        };
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json, json!({"type": "function", "methodId": "abc123"}));
    }

    #[test]
    fn nested_shapes_round_trip() {
        let wire = json!({
            "type": "object",
            "value": {
                "xs": {"type": "array", "value": [
                    {"type": "number", "value": 1},
                    {"type": "function", "methodId": "ff00"}
                ]}
            }
        });
        let shape: Shape = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&shape).unwrap(), wire);
        assert_eq!(shape.function_handles().len(), 1);
    }

    #[test]
    fn out_of_model_scalars_are_rejected() {
        for wire in [
            json!({"type": "boolean", "value": true}),
            json!({"type": "null"}),
            json!({"type": "undefined"}),
        ] {
            assert!(serde_json::from_value::<Shape>(wire).is_err());
        }
    }

    #[test]
    fn float_numbers_survive_the_wire() {
        let wire = json!({"type": "number", "value": 2.5});
        let shape: Shape = serde_json::from_value(wire).unwrap();
        match shape {
            Shape::Number { value } => assert_eq!(value.as_f64(), Some(2.5)),
            other => panic!("expected number, got {:?}", other),
        }
    }
}
