//! The receipt output schema, rendered for each provider.
//!
//! OpenAI takes JSON Schema (`"type": "object"`); Gemini takes its OpenAPI
//! subset with upper-case type names (`"type": "OBJECT"`).

use serde_json::{json, Map, Value};

/// Top-level fields every candidate must carry. `tax` is optional.
pub const REQUIRED_FIELDS: [&str; 5] = ["date", "currency", "vendor_name", "receipt_items", "total"];

/// A node in a structured-output schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String,
    Number,
    Array(Box<SchemaNode>),
    Object {
        properties: Vec<(&'static str, SchemaNode)>,
        required: Vec<&'static str>,
    },
}

impl SchemaNode {
    /// Render as JSON Schema.
    pub fn to_json_schema(&self) -> Value {
        self.render(false)
    }

    /// Render as a Gemini `responseSchema`.
    pub fn to_gemini_schema(&self) -> Value {
        self.render(true)
    }

    fn render(&self, upper: bool) -> Value {
        let type_name = |name: &str| {
            if upper {
                name.to_uppercase()
            } else {
                name.to_string()
            }
        };
        match self {
            SchemaNode::String => json!({ "type": type_name("string") }),
            SchemaNode::Number => json!({ "type": type_name("number") }),
            SchemaNode::Array(items) => json!({
                "type": type_name("array"),
                "items": items.render(upper),
            }),
            SchemaNode::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.to_string(), node.render(upper)))
                    .collect();
                json!({
                    "type": type_name("object"),
                    "properties": props,
                    "required": required,
                })
            }
        }
    }
}

/// The receipt schema: vendor, date, currency, line items, optional tax, total.
pub fn receipt_schema() -> SchemaNode {
    let item = SchemaNode::Object {
        properties: vec![
            ("item_name", SchemaNode::String),
            ("item_cost", SchemaNode::Number),
        ],
        required: vec!["item_name", "item_cost"],
    };

    SchemaNode::Object {
        properties: vec![
            ("date", SchemaNode::String),
            ("currency", SchemaNode::String),
            ("vendor_name", SchemaNode::String),
            ("receipt_items", SchemaNode::Array(Box::new(item))),
            ("tax", SchemaNode::Number),
            ("total", SchemaNode::Number),
        ],
        required: REQUIRED_FIELDS.to_vec(),
    }
}
