// crates/core/src/normalize.rs
//! Fills a loosely-structured analysis document against a fixed schema so
//! the frontend never meets a missing key.

use serde_json::{Map, Value};

/// One node of the analysis schema.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode {
    /// A value whose default is produced on demand.
    Leaf(fn() -> Value),
    /// A nested object with required sub-keys.
    Object(&'static [(&'static str, SchemaNode)]),
}

fn empty_string() -> Value {
    Value::String(String::new())
}

fn not_available() -> Value {
    Value::String("N/A".to_string())
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn zero() -> Value {
    Value::from(0)
}

fn zero_f() -> Value {
    Value::from(0.0)
}

use SchemaNode::{Leaf, Object};

/// Required top-level keys of the analysis document and their defaults.
pub static ANALYSIS_SCHEMA: &[(&str, SchemaNode)] = &[
    ("summary", Leaf(empty_string)),
    ("positive", Leaf(empty_list)),
    ("issues", Leaf(empty_list)),
    ("recommendations", Leaf(empty_list)),
    (
        "app_metadata",
        Object(&[
            ("app_name", Leaf(empty_string)),
            ("category", Leaf(empty_string)),
            ("screens_discovered", Leaf(zero)),
            ("exploration_depth", Leaf(zero)),
        ]),
    ),
    (
        "exploration_coverage",
        Object(&[
            ("screens_visited", Leaf(zero)),
            ("elements_tested", Leaf(zero)),
            ("dead_elements_pct", Leaf(zero_f)),
            ("coverage_pct", Leaf(zero_f)),
        ]),
    ),
    (
        "navigation_metrics",
        Object(&[
            ("screens_discovered", Leaf(zero)),
            ("max_depth", Leaf(zero)),
            ("avg_depth", Leaf(zero_f)),
            ("hub_screen_count", Leaf(zero)),
            ("orphan_screens", Leaf(zero)),
        ]),
    ),
    (
        "interaction_feedback",
        Object(&[
            ("silent_failures", Leaf(zero)),
            ("visible_feedback_rate_pct", Leaf(zero_f)),
            ("delayed_responses", Leaf(zero)),
            ("loading_indicators_missing", Leaf(zero)),
        ]),
    ),
    (
        "visual_hierarchy",
        Object(&[
            ("cta_visibility", Leaf(not_available)),
            ("contrast_issues", Leaf(zero)),
            ("cluttered_screens", Leaf(zero)),
            ("primary_action_clarity", Leaf(not_available)),
        ]),
    ),
    (
        "consistency",
        Object(&[
            ("inconsistent_labels", Leaf(zero)),
            ("inconsistent_icons", Leaf(zero)),
            ("navigation_pattern_changes", Leaf(zero)),
            ("style_deviations", Leaf(zero)),
            ("consistency_score", Leaf(zero_f)),
        ]),
    ),
    (
        "error_handling",
        Object(&[
            ("preventable_errors", Leaf(zero)),
            ("unclear_error_messages", Leaf(zero)),
            ("missing_recovery_paths", Leaf(zero)),
            ("crashes_observed", Leaf(zero)),
        ]),
    ),
    (
        "confidence_score",
        Object(&[
            ("overall", Leaf(zero_f)),
            (
                "factors",
                Object(&[
                    ("coverage", Leaf(zero_f)),
                    ("evidence_quality", Leaf(zero_f)),
                    ("observation_consistency", Leaf(zero_f)),
                ]),
            ),
        ]),
    ),
    ("complexity_score", Leaf(zero)),
];

impl SchemaNode {
    /// Fully defaulted value for this node.
    pub fn default_value(&self) -> Value {
        match self {
            Leaf(make) => make(),
            Object(fields) => {
                let mut map = Map::new();
                fill_object(&mut map, fields);
                Value::Object(map)
            }
        }
    }
}

/// Insert defaults for absent keys and recurse into present nested objects.
/// Present values are never replaced, even when their shape is unexpected.
fn fill_object(map: &mut Map<String, Value>, fields: &[(&str, SchemaNode)]) {
    for (key, node) in fields {
        match map.get_mut(*key) {
            None => {
                map.insert((*key).to_string(), node.default_value());
            }
            Some(Value::Object(nested)) => {
                if let Object(sub_fields) = node {
                    fill_object(nested, sub_fields);
                }
            }
            Some(_) => {}
        }
    }
}

/// Complete `raw` against [`ANALYSIS_SCHEMA`]. Unknown keys are kept.
///
/// A non-object input is treated as an empty document. Idempotent.
pub fn normalize(raw: Value) -> Value {
    let mut map = match raw {
        Value::Object(map) => map,
        other => {
            tracing::warn!(kind = value_kind(&other), "analysis document is not an object, using defaults");
            Map::new()
        }
    };
    fill_object(&mut map, ANALYSIS_SCHEMA);
    Value::Object(map)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_document_gets_every_default() {
        let doc = normalize(json!({}));
        assert_eq!(doc["summary"], "");
        assert_eq!(doc["positive"], json!([]));
        assert_eq!(doc["issues"], json!([]));
        assert_eq!(doc["recommendations"], json!([]));
        assert_eq!(doc["complexity_score"], 0);
        assert_eq!(doc["visual_hierarchy"]["cta_visibility"], "N/A");
        assert_eq!(doc["navigation_metrics"]["orphan_screens"], 0);
        assert_eq!(doc["confidence_score"]["factors"]["evidence_quality"], 0.0);
        for (key, _) in ANALYSIS_SCHEMA {
            assert!(doc.get(*key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_nested_present_key_is_kept() {
        let doc = normalize(json!({"consistency": {"inconsistent_labels": 7}}));
        let consistency = doc["consistency"].as_object().unwrap();
        assert_eq!(consistency["inconsistent_labels"], 7);
        assert_eq!(consistency.len(), 5);
        assert_eq!(consistency["style_deviations"], 0);
    }

    #[test]
    fn test_idempotent() {
        let inputs = vec![
            json!({}),
            json!({"summary": "Solid app", "extra": {"anything": [1, 2]}}),
            json!({"confidence_score": {"factors": {"coverage": 0.4}}}),
            json!({"navigation_metrics": "not an object"}),
            json!([1, 2, 3]),
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_unknown_and_mistyped_values_survive() {
        let doc = normalize(json!({
            "summary": "Good",
            "navigation_metrics": 3,
            "suggestions": ["legacy field"],
            "app_metadata": {"app_name": "Clock", "store_rating": 4.5},
        }));
        assert_eq!(doc["summary"], "Good");
        assert_eq!(doc["navigation_metrics"], 3);
        assert_eq!(doc["suggestions"], json!(["legacy field"]));
        assert_eq!(doc["app_metadata"]["app_name"], "Clock");
        assert_eq!(doc["app_metadata"]["store_rating"], 4.5);
        assert_eq!(doc["app_metadata"]["screens_discovered"], 0);
    }

    #[test]
    fn test_non_object_input_becomes_defaults() {
        assert_eq!(normalize(json!(null)), normalize(json!({})));
    }
}
