use std::collections::HashMap;

use eframe::egui::Color32;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::{ColorMode, RenderSettings};
use crate::pipeline::Prepared;
use crate::record::{CHILD_KEY, COLOR_KEY, PARENT_KEY, Record, VALUE_KEY, value_metric};
use crate::scale::{color_hex, parse_color};
use crate::util::display_value;

pub const DEFAULT_EDGE_COLOR: Color32 = Color32::from_rgb(0xbd, 0xbd, 0xbd);

/// Resolved drawing attributes for one node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeStyle {
    pub id: String,
    pub value: f64,
    pub radius: Option<f64>,
    #[serde(serialize_with = "serialize_color")]
    pub fill: Color32,
    #[serde(serialize_with = "serialize_color")]
    pub stroke: Color32,
}

fn serialize_color<S: Serializer>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&color_hex(*color))
}

/// Per-node style accessors over a prepared hierarchy.
pub struct NodeStyler<'a> {
    prepared: &'a Prepared,
    settings: &'a RenderSettings,
    fill: Color32,
    stroke: Color32,
    parents: HashMap<String, &'a Record>,
}

impl<'a> NodeStyler<'a> {
    pub fn new(prepared: &'a Prepared, settings: &'a RenderSettings) -> Self {
        let mut parents = HashMap::new();
        for (parent, child) in prepared.tree.edges() {
            if let Some(id) = child.id() {
                parents.entry(id).or_insert(&parent.record);
            }
        }

        Self {
            prepared,
            settings,
            fill: first_stop(&settings.node_color),
            stroke: first_stop(settings.stroke_spec()),
            parents,
        }
    }

    /// `None` when the layout sizes nodes itself or sizing is switched off.
    pub fn radius(&self, node: &Record) -> Option<f64> {
        self.settings
            .sizes_nodes()
            .then(|| self.prepared.size_scale.scale(value_metric(node)))
    }

    pub fn fill(&self, node: &Record) -> Color32 {
        self.resolve_color(node, self.fill)
    }

    pub fn stroke(&self, node: &Record) -> Color32 {
        self.resolve_color(node, self.stroke)
    }

    fn resolve_color(&self, node: &Record, solid: Color32) -> Color32 {
        let mapping = &self.settings.mapping;

        match self.settings.color_mode {
            ColorMode::Scale if mapping.value_field.is_some() => {
                self.prepared.color_scale.color(value_metric(node))
            }
            ColorMode::Field if mapping.color_field.is_some() => {
                node_color(node).unwrap_or(solid)
            }
            ColorMode::Solid | ColorMode::Scale | ColorMode::Field => solid,
        }
    }

    pub fn edge_stroke(&self, target: &Record) -> Color32 {
        node_color(target).unwrap_or(DEFAULT_EDGE_COLOR)
    }

    pub fn edge_width(&self, target: &Record) -> f64 {
        let width = value_metric(target);
        if width == 0.0 { 1.0 } else { width }
    }

    /// Hover text, one `label: value` line per mapped role.
    pub fn tooltip(&self, node: &Record, parent: Option<&Record>) -> Vec<String> {
        let mapping = &self.settings.mapping;
        let mut lines = Vec::with_capacity(3);

        if let Some(parent) = parent {
            let label = mapping.parent_field.as_deref().unwrap_or(PARENT_KEY);
            lines.push(format!("{label}: {}", display_value(parent.get(CHILD_KEY))));
        }

        let label = mapping.child_field.as_deref().unwrap_or(CHILD_KEY);
        lines.push(format!("{label}: {}", display_value(node.get(CHILD_KEY))));

        if let Some(label) = mapping.value_field.as_deref() {
            lines.push(format!("{label}: {}", display_value(node.get(VALUE_KEY))));
        }

        lines
    }

    pub fn node_styles(&self) -> Vec<NodeStyle> {
        self.prepared
            .nodes
            .iter()
            .map(|(id, node)| NodeStyle {
                id: id.to_string(),
                value: value_metric(node),
                radius: self.radius(node),
                fill: self.fill(node),
                stroke: self.stroke(node),
            })
            .collect()
    }

    /// Hover text for a node looked up by identifier, using its first parent
    /// in the tree.
    pub fn tooltip_for(&self, id: &str) -> Option<Vec<String>> {
        let node = self.prepared.nodes.get(id)?;
        let parent = self.parents.get(id).copied();
        Some(self.tooltip(node, parent))
    }
}

// The node's own `colorHex`, when it holds a parseable hex color.
fn node_color(node: &Record) -> Option<Color32> {
    node.get(COLOR_KEY)
        .and_then(Value::as_str)
        .and_then(|color| parse_color(color.trim()).ok())
}

/// First color of a comma-delimited spec. Unparseable or empty specs fall
/// back to the default edge gray.
pub fn first_stop(spec: &str) -> Color32 {
    spec.split(',')
        .next()
        .and_then(|stop| parse_color(stop.trim()).ok())
        .unwrap_or(DEFAULT_EDGE_COLOR)
}
