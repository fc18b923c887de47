//! The operations a language model may invoke, as one tagged enum.
//!
//! Tool calls are decoded into [`ToolInvocation`] and dispatched with a
//! `match` in the orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use trailfit_core::{CategoryPreferences, GeneralPreferences, Location, Sizing};
use trailfit_retrieval::Predicate;

use crate::error::AgentError;
use crate::llm::ToolDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolInvocation {
    SearchProducts {
        query: String,
        k: Option<usize>,
    },
    FilterProducts {
        filters: BTreeMap<String, serde_json::Value>,
        k: Option<usize>,
    },
    SearchWithFilters {
        query: String,
        filters: BTreeMap<String, serde_json::Value>,
        k: Option<usize>,
    },
    FindSimilar {
        product_id: String,
        k: Option<usize>,
    },
    SavePreferences {
        sizing: Option<Sizing>,
        category_preferences: Option<BTreeMap<String, CategoryPreferences>>,
        general: Option<GeneralPreferences>,
        location: Option<Location>,
        #[serde(default = "permanent_by_default")]
        permanent: bool,
    },
    RecordFeedback {
        text: String,
        category: Option<String>,
    },
    CatalogInfo {},
}

fn permanent_by_default() -> bool {
    true
}

impl ToolInvocation {
    /// Decode a model tool call.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for an unknown tool or arguments that do
    /// not fit its schema.
    pub fn decode(name: &str, arguments: serde_json::Value) -> Result<Self, AgentError> {
        let arguments = match arguments {
            serde_json::Value::Null => json!({}),
            other => other,
        };
        serde_json::from_value(json!({ "tool": name, "arguments": arguments }))
            .map_err(|e| AgentError::InvalidInput(format!("tool call '{name}': {e}")))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::SearchProducts { .. } => "search_products",
            ToolInvocation::FilterProducts { .. } => "filter_products",
            ToolInvocation::SearchWithFilters { .. } => "search_with_filters",
            ToolInvocation::FindSimilar { .. } => "find_similar",
            ToolInvocation::SavePreferences { .. } => "save_preferences",
            ToolInvocation::RecordFeedback { .. } => "record_feedback",
            ToolInvocation::CatalogInfo {} => "catalog_info",
        }
    }
}

/// Build a predicate from tool-call filter arguments. Numbers and booleans
/// are accepted as their JSON text; arrays become comma-separated lists.
///
/// # Errors
///
/// [`AgentError::Retrieval`] for unknown keys or unparseable values.
pub fn predicate_from_filters(
    filters: &BTreeMap<String, serde_json::Value>,
) -> Result<Predicate, AgentError> {
    let pairs = filters.iter().map(|(key, value)| {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        };
        (key.clone(), text)
    });
    Ok(Predicate::parse_pairs(pairs)?)
}

/// Declarations for every [`ToolInvocation`] variant.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    let filters = json!({
        "type": "object",
        "description": "Exact-match and range filters. Keys: brand, category, subcategory, gender, season, waterproofing, insulation, material, color, purpose, terrain, min_price, max_price, min_rating, exclude_brands, sort (top_rated).",
        "additionalProperties": true
    });
    let k = json!({ "type": "integer", "minimum": 1, "description": "Number of results" });

    vec![
        ToolDefinition {
            name: "search_products",
            description: "Semantic product search from a natural-language description.",
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" }, "k": k },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "filter_products",
            description: "List products matching exact attribute filters.",
            parameters: json!({
                "type": "object",
                "properties": { "filters": filters, "k": k },
                "required": ["filters"]
            }),
        },
        ToolDefinition {
            name: "search_with_filters",
            description: "Semantic search restricted to products matching the filters.",
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" }, "filters": filters, "k": k },
                "required": ["query", "filters"]
            }),
        },
        ToolDefinition {
            name: "find_similar",
            description: "Products similar to a given product id.",
            parameters: json!({
                "type": "object",
                "properties": { "product_id": { "type": "string" }, "k": k },
                "required": ["product_id"]
            }),
        },
        ToolDefinition {
            name: "save_preferences",
            description: "Save the shopper's preferences. Set permanent to false for this session only.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "sizing": {
                        "type": "object",
                        "properties": {
                            "fit": { "type": "string" },
                            "size": { "type": "string" },
                            "shoe_size": { "type": "string" }
                        }
                    },
                    "category_preferences": {
                        "type": "object",
                        "description": "Keyed by product category, e.g. outerwear or footwear.",
                        "additionalProperties": {
                            "type": "object",
                            "properties": {
                                "colors": { "type": "array", "items": { "type": "string" } },
                                "avoid_colors": { "type": "array", "items": { "type": "string" } },
                                "style": { "type": "string" }
                            }
                        }
                    },
                    "general": {
                        "type": "object",
                        "properties": {
                            "budget_max": { "type": "number" },
                            "brands_liked": { "type": "array", "items": { "type": "string" } },
                            "brands_avoided": { "type": "array", "items": { "type": "string" } },
                            "colors": { "type": "array", "items": { "type": "string" } },
                            "avoid_colors": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "location": {
                        "type": "object",
                        "properties": {
                            "city": { "type": "string" },
                            "region": { "type": "string" }
                        }
                    },
                    "permanent": { "type": "boolean", "default": true }
                }
            }),
        },
        ToolDefinition {
            name: "record_feedback",
            description: "Record free-text feedback about recommended products.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "category": { "type": "string" }
                },
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: "catalog_info",
            description: "Counts of products per brand and category, with price and rating ranges.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use trailfit_retrieval::Constraint;

    use super::*;

    #[test]
    fn decodes_search_call() {
        let tool = ToolInvocation::decode("search_products", json!({ "query": "rain shell" })).unwrap();
        assert_eq!(
            tool,
            ToolInvocation::SearchProducts {
                query: "rain shell".into(),
                k: None
            }
        );
    }

    #[test]
    fn decodes_catalog_info_without_arguments() {
        let tool = ToolInvocation::decode("catalog_info", serde_json::Value::Null).unwrap();
        assert_eq!(tool, ToolInvocation::CatalogInfo {});
    }

    #[test]
    fn save_preferences_defaults_to_permanent() {
        let tool = ToolInvocation::decode(
            "save_preferences",
            json!({ "sizing": { "fit": "relaxed" } }),
        )
        .unwrap();
        match tool {
            ToolInvocation::SavePreferences {
                sizing, permanent, ..
            } => {
                assert!(permanent);
                assert_eq!(sizing.unwrap().fit.as_deref(), Some("relaxed"));
            }
            other => panic!("unexpected tool {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_is_invalid_input() {
        assert!(matches!(
            ToolInvocation::decode("delete_everything", json!({})),
            Err(AgentError::InvalidInput(_))
        ));
    }

    #[test]
    fn filters_accept_json_numbers_and_lists() {
        let mut filters = BTreeMap::new();
        filters.insert("max_price".to_owned(), json!(300));
        filters.insert("color".to_owned(), json!("Blue"));
        filters.insert("exclude_brands".to_owned(), json!(["NorthPeak", "Ridgeline"]));
        let predicate = predicate_from_filters(&filters).unwrap();

        assert_eq!(predicate.max_price(), Some(300.0));
        assert!(predicate.constraints.contains(&Constraint::ExcludeBrands {
            brands: vec!["NorthPeak".into(), "Ridgeline".into()]
        }));
    }

    #[test]
    fn every_variant_is_declared() {
        let names: Vec<&str> = definitions().iter().map(|d| d.name).collect();
        for tool in [
            ToolInvocation::CatalogInfo {},
            ToolInvocation::RecordFeedback {
                text: String::new(),
                category: None,
            },
        ] {
            assert!(names.contains(&tool.name()));
        }
        assert_eq!(names.len(), 7);
    }
}
