use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::record::{CHILD_KEY, COLOR_KEY, PARENT_KEY, VALUE_KEY};
use crate::util::{leading_float, lenient_number};

pub const DEFAULT_NODE_COLOR: &str = "#4e79a7,#e15759";
pub const DEFAULT_ROOT_ID: &str = "__root__";

/// Which source columns supply the canonical attributes. A `None` role is
/// left untouched by remapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(
        default,
        rename = "ConfigParentField",
        deserialize_with = "mapped_field"
    )]
    pub parent_field: Option<String>,
    #[serde(default, rename = "ConfigChildField", deserialize_with = "mapped_field")]
    pub child_field: Option<String>,
    #[serde(default, rename = "ConfigColorField", deserialize_with = "mapped_field")]
    pub color_field: Option<String>,
    #[serde(default, rename = "ConfigValueField", deserialize_with = "mapped_field")]
    pub value_field: Option<String>,
}

impl FieldMapping {
    pub fn new(parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
        Self {
            parent_field: Some(parent_field.into()),
            child_field: Some(child_field.into()),
            color_field: None,
            value_field: None,
        }
    }

    /// Every role mapped onto its own canonical name.
    pub fn identity() -> Self {
        Self::new(PARENT_KEY, CHILD_KEY)
            .with_color(COLOR_KEY)
            .with_value(VALUE_KEY)
    }

    pub fn with_color(mut self, field: impl Into<String>) -> Self {
        self.color_field = Some(field.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<String>) -> Self {
        self.value_field = Some(field.into());
        self
    }

    /// Tree building needs at least the child identifier.
    pub fn is_complete(&self) -> bool {
        self.child_field.is_some()
    }
}

/// What to do when several records have an empty parent link.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RootPolicy {
    #[default]
    First,
    Merge {
        id: String,
    },
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Scale,
    Field,
    #[default]
    #[serde(other)]
    Solid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RootPolicyName {
    Merge,
    Strict,
    #[default]
    #[serde(other)]
    First,
}

/// Render-request parameters as stored by the host. Values arrive as a flat
/// camelCase map whose values are mostly strings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    #[serde(flatten)]
    pub mapping: FieldMapping,
    #[serde(rename = "ConfigType")]
    pub chart_type: String,
    #[serde(rename = "markerMinRadius", deserialize_with = "lenient_f64")]
    pub marker_min_radius: Option<f64>,
    #[serde(rename = "markerMaxRadius", deserialize_with = "lenient_f64")]
    pub marker_max_radius: Option<f64>,
    #[serde(rename = "nodeColor")]
    pub node_color: String,
    #[serde(rename = "strokeColor")]
    pub stroke_color: Option<String>,
    #[serde(rename = "colorConfig")]
    pub color_mode: ColorMode,
    #[serde(rename = "nodeSize")]
    pub node_size: Option<String>,
    #[serde(rename = "rootPolicy")]
    root_policy: RootPolicyName,
    #[serde(rename = "rootId")]
    root_id: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mapping: FieldMapping::default(),
            chart_type: "tree".to_string(),
            marker_min_radius: None,
            marker_max_radius: None,
            node_color: DEFAULT_NODE_COLOR.to_string(),
            stroke_color: None,
            color_mode: ColorMode::default(),
            node_size: None,
            root_policy: RootPolicyName::default(),
            root_id: DEFAULT_ROOT_ID.to_string(),
        }
    }
}

impl RenderSettings {
    pub fn with_mapping(mapping: FieldMapping) -> Self {
        Self {
            mapping,
            ..Self::default()
        }
    }

    pub fn root_policy(&self) -> RootPolicy {
        match self.root_policy {
            RootPolicyName::First => RootPolicy::First,
            RootPolicyName::Strict => RootPolicy::Strict,
            RootPolicyName::Merge => RootPolicy::Merge {
                id: self.root_id.clone(),
            },
        }
    }

    pub fn set_root_policy(&mut self, policy: RootPolicy) {
        match policy {
            RootPolicy::First => self.root_policy = RootPolicyName::First,
            RootPolicy::Strict => self.root_policy = RootPolicyName::Strict,
            RootPolicy::Merge { id } => {
                self.root_policy = RootPolicyName::Merge;
                self.root_id = id;
            }
        }
    }

    pub fn stroke_spec(&self) -> &str {
        self.stroke_color.as_deref().unwrap_or(&self.node_color)
    }

    /// Treemap and circle-pack layouts size nodes themselves.
    pub fn sizes_nodes(&self) -> bool {
        let layout_sized = matches!(
            self.chart_type.to_ascii_lowercase().as_str(),
            "treemap" | "circlepack"
        );
        let disabled = self
            .node_size
            .as_deref()
            .is_some_and(|size| size.eq_ignore_ascii_case("none"));

        !layout_sized && !disabled && self.mapping.value_field.is_some()
    }
}

fn mapped_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|field| !field.is_empty() && field != "None"))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match &value {
        Value::Number(_) => Some(lenient_number(&value)),
        Value::String(text) => leading_float(text).filter(|radius| radius.is_finite()),
        _ => None,
    }))
}
