use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "stages": {
                "type": "array",
                "minItems": 1,
                "items": { "$ref": "#/$defs/stage" }
            },
            "display": {
                "type": "object",
                "properties": {
                    "refresh_ms": { "type": "integer", "minimum": 1 },
                    "glyphs": { "type": "string", "enum": ["unicode", "ascii"] },
                    "color": { "type": "boolean" },
                    "request_width": { "type": "integer", "minimum": 1 }
                }
            },
            "snapshot": {
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" }
                }
            }
        },
        "$defs": {
            "stage": {
                "type": "object",
                "required": ["key", "display_name", "agents"],
                "properties": {
                    "key": { "type": "string", "pattern": "^[A-Za-z0-9][A-Za-z0-9_.-]*$" },
                    "display_name": { "type": "string" },
                    "agents": { "type": "array", "items": { "type": "string" } },
                    "optional": { "type": "boolean" }
                }
            }
        }
    })
});
