//! Relation neighborhood included in data-object prompts.
//!
//! A [`RelatedGraph`] lists the objects reachable from one data object
//! through references, subqueries, and function calls, up to a depth limit.
//! It is serialized into the summarization prompt so the model can describe
//! relation fields in terms of what they join to.

use serde::Serialize;

use schemascribe_introspect::MetaSummary;
use schemascribe_introspect::meta::DataObjectInfo;

#[derive(Debug, Clone, Serialize)]
pub struct RelatedGraph {
    pub max_depth: u32,
    pub nodes: Vec<RelatedNode>,
    pub edges: Vec<RelatedEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub module: String,
    pub data_source: String,
    pub brief: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedEdge {
    pub name: String,
    pub from: String,
    pub to: String,
    pub kind: String,
}

impl RelatedGraph {
    /// Walk outward from `object` up to `max_depth` hops.
    pub fn build(meta: &MetaSummary, object: &DataObjectInfo, max_depth: u32) -> Self {
        let mut graph = Self {
            max_depth,
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        graph.add_data_object(meta, object, 0);
        graph
    }

    fn node_exists(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    fn edge_exists(&self, name: &str) -> bool {
        self.edges.iter().any(|e| e.name == name)
    }

    fn add_data_object(&mut self, meta: &MetaSummary, object: &DataObjectInfo, depth: u32) {
        if self.node_exists(&object.name) {
            return;
        }
        self.nodes.push(RelatedNode {
            kind: object.kind.clone(),
            name: object.name.clone(),
            module: object.module.clone(),
            data_source: object.data_source.clone(),
            brief: object_brief(object),
        });
        if depth >= self.max_depth {
            return;
        }

        for reference in &object.references {
            let Some(target) = resolve_target(meta, &reference.module, &reference.data_object)
            else {
                continue;
            };
            self.add_data_object(meta, target, depth + 1);
            let name = format!("{}:{}", object.name, reference.field_data_query);
            if !self.edge_exists(&name) {
                self.edges.push(RelatedEdge {
                    name,
                    from: object.name.clone(),
                    to: target.name.clone(),
                    kind: relation_kind(&reference.kind),
                });
            }
        }

        for subquery in &object.subqueries {
            let Some(target) = resolve_target(meta, &subquery.module, &subquery.data_object)
            else {
                continue;
            };
            self.add_data_object(meta, target, depth + 1);
            let name = format!("{}:{}", object.name, subquery.field_data_query);
            if !self.edge_exists(&name) {
                self.edges.push(RelatedEdge {
                    name,
                    from: object.name.clone(),
                    to: target.name.clone(),
                    kind: "subquery".to_string(),
                });
            }
        }

        for call in &object.function_calls {
            let node_name = format!("fc:{}", call.name);
            if !self.node_exists(&node_name) {
                self.nodes.push(RelatedNode {
                    kind: "function".to_string(),
                    name: node_name.clone(),
                    module: call.module.clone(),
                    data_source: call.data_source.clone(),
                    brief: call.description.clone(),
                });
            }
            let edge_name = format!("{}->fc:{}", object.name, call.field_name);
            if !self.edge_exists(&edge_name) {
                self.edges.push(RelatedEdge {
                    name: edge_name,
                    from: object.name.clone(),
                    to: node_name,
                    kind: "function_call".to_string(),
                });
            }
        }
    }
}

/// `one_to_many` and friends render as `fk:one-to-many` on edges.
fn relation_kind(kind: &str) -> String {
    format!("fk:{}", kind.replace('_', "-"))
}

fn resolve_target<'a>(
    meta: &'a MetaSummary,
    module: &str,
    name: &str,
) -> Option<&'a DataObjectInfo> {
    let path = if module.is_empty() {
        name.to_string()
    } else {
        format!("{module}.{name}")
    };
    meta.table(&path).or_else(|| meta.view(&path))
}

fn object_brief(object: &DataObjectInfo) -> String {
    let mut brief = object.description.clone();
    if !brief.is_empty() {
        brief.push_str(" | ");
    }
    let columns: Vec<String> = object
        .columns
        .iter()
        .map(|c| {
            if c.description.is_empty() {
                c.name.clone()
            } else {
                format!("{} ({})", c.name, c.description)
            }
        })
        .collect();
    brief.push_str("Fields: ");
    brief.push_str(&columns.join(", "));
    brief
}
