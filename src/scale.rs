use eframe::egui::Color32;
use serde::{Serialize, Serializer};

use crate::error::{PipelineError, Result};
use crate::hierarchy::NodeIndex;

// Fallback marker radii when the settings leave a bound unset or zero.
pub const MIN_MARKER_RADIUS: f64 = 1.0;
pub const MAX_MARKER_RADIUS: f64 = 25.0;

/// Position of `value` inside `[min, max]` after `transform`, where 0 is
/// `min` and 1 is `max`. Not clamped. A collapsed domain maps to 0.5.
fn normalize(value: f64, min: f64, max: f64, transform: fn(f64) -> f64) -> f64 {
    let low = transform(min);
    let span = transform(max) - low;
    if span == 0.0 || !span.is_finite() {
        return 0.5;
    }

    (transform(value) - low) / span
}

fn signed_sqrt(value: f64) -> f64 {
    value.signum() * value.abs().sqrt()
}

fn linear(value: f64) -> f64 {
    value
}

/// Maps a value to a marker radius so that marker area grows linearly with
/// the value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SizeScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl SizeScale {
    pub fn build(nodes: &NodeIndex, min_radius: Option<f64>, max_radius: Option<f64>) -> Self {
        Self::from_extent(nodes.value_extent(), min_radius, max_radius)
    }

    pub fn from_extent(domain: (f64, f64), min_radius: Option<f64>, max_radius: Option<f64>) -> Self {
        Self {
            domain,
            range: (
                radius_or(min_radius, MIN_MARKER_RADIUS),
                radius_or(max_radius, MAX_MARKER_RADIUS),
            ),
        }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    pub fn scale(&self, value: f64) -> f64 {
        let t = normalize(value, self.domain.0, self.domain.1, signed_sqrt);
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

// Zero and NaN count as "not configured".
fn radius_or(bound: Option<f64>, fallback: f64) -> f64 {
    bound
        .filter(|radius| *radius != 0.0 && !radius.is_nan())
        .unwrap_or(fallback)
}

/// Unpremultiplied RGBA.
pub type Rgba = [u8; 4];

/// Interpolates evenly spaced color stops across the value extent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColorScale {
    domain: (f64, f64),
    #[serde(serialize_with = "serialize_stops")]
    stops: Vec<Rgba>,
}

impl ColorScale {
    pub fn build(nodes: &NodeIndex, color_spec: &str) -> Result<Self> {
        Self::from_extent(nodes.value_extent(), color_spec)
    }

    pub fn from_extent(domain: (f64, f64), color_spec: &str) -> Result<Self> {
        Ok(Self {
            domain,
            stops: parse_color_spec(color_spec)?,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn color(&self, value: f64) -> Color32 {
        let t = normalize(value, self.domain.0, self.domain.1, linear);
        to_color32(interpolate(&self.stops, t))
    }
}

fn interpolate(stops: &[Rgba], t: f64) -> Rgba {
    let [first, .., last] = stops else {
        return stops.first().copied().unwrap_or([0, 0, 0, 255]);
    };

    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    if t <= 0.0 {
        return *first;
    }
    if t >= 1.0 {
        return *last;
    }

    let segments = stops.len() - 1;
    let position = t * segments as f64;
    let segment = (position.floor() as usize).min(segments - 1);
    let amount = position - segment as f64;
    blend(stops[segment], stops[segment + 1], amount)
}

fn blend(base: Rgba, overlay: Rgba, amount: f64) -> Rgba {
    let inverse = 1.0 - amount;
    let mut out = [0u8; 4];
    for (channel, (from, to)) in out.iter_mut().zip(base.into_iter().zip(overlay)) {
        *channel = (f64::from(from) * inverse + f64::from(to) * amount)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    out
}

/// Splits a comma-delimited list of hex colors. Blank entries are ignored.
pub fn parse_color_spec(color_spec: &str) -> Result<Vec<Rgba>> {
    let stops = color_spec
        .split(',')
        .map(str::trim)
        .filter(|stop| !stop.is_empty())
        .map(parse_hex)
        .collect::<Result<Vec<_>>>()?;

    if stops.is_empty() {
        return Err(PipelineError::EmptyColorSpec);
    }
    Ok(stops)
}

pub fn parse_hex(stop: &str) -> Result<Rgba> {
    let invalid = || PipelineError::InvalidColor {
        stop: stop.to_string(),
    };
    let digits = stop.strip_prefix('#').unwrap_or(stop);
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |index: usize, width: usize| {
        u8::from_str_radix(&digits[index * width..(index + 1) * width], 16).map_err(|_| invalid())
    };

    match digits.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (index, slot) in rgba.iter_mut().take(3).enumerate() {
                *slot = channel(index, 1)? * 17;
            }
            Ok(rgba)
        }
        6 | 8 => {
            let mut rgba = [255u8; 4];
            for (index, slot) in rgba.iter_mut().take(digits.len() / 2).enumerate() {
                *slot = channel(index, 2)?;
            }
            Ok(rgba)
        }
        _ => Err(invalid()),
    }
}

/// Parses one hex stop straight into a drawing color.
pub fn parse_color(stop: &str) -> Result<Color32> {
    parse_hex(stop).map(to_color32)
}

pub fn to_color32([r, g, b, a]: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// `#rrggbb`, or `#rrggbbaa` for translucent colors.
pub fn color_hex(color: Color32) -> String {
    to_hex(color.to_srgba_unmultiplied())
}

pub fn to_hex([r, g, b, a]: Rgba) -> String {
    if a == 255 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

fn serialize_stops<S: Serializer>(stops: &[Rgba], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(stops.iter().map(|stop| to_hex(*stop)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::record::Record;

    fn index(values: &[f64]) -> NodeIndex {
        let records = values
            .iter()
            .enumerate()
            .filter_map(|(position, value)| {
                json!({ "child": position.to_string(), "valueMetric": value })
                    .as_object()
                    .cloned()
            })
            .collect::<Vec<Record>>();
        NodeIndex::build(&records)
    }

    #[test]
    fn size_scale_hits_range_ends() {
        let scale = SizeScale::build(&index(&[0.0, 100.0]), Some(2.0), Some(40.0));
        assert_eq!(scale.scale(0.0), 2.0);
        assert_eq!(scale.scale(100.0), 40.0);
    }

    #[test]
    fn size_scale_is_square_root() {
        let scale = SizeScale::build(&index(&[0.0, 100.0]), Some(0.0), Some(10.0));
        assert_eq!(scale.range(), (MIN_MARKER_RADIUS, 10.0));
        let quarter = SizeScale::from_extent((0.0, 100.0), Some(-0.0), Some(10.0));
        assert!((quarter.scale(25.0) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn size_scale_defaults_unset_or_zero_bounds() {
        let scale = SizeScale::build(&index(&[1.0, 4.0]), None, Some(f64::NAN));
        assert_eq!(scale.range(), (MIN_MARKER_RADIUS, MAX_MARKER_RADIUS));
    }

    #[test]
    fn size_scale_is_monotone_for_non_negative_values() {
        let scale = SizeScale::build(&index(&[0.0, 1000.0]), Some(3.0), Some(30.0));
        let mut previous = f64::MIN;
        for step in 0..=200 {
            let radius = scale.scale(step as f64 * 5.0);
            assert!(radius >= previous);
            previous = radius;
        }
    }

    #[test]
    fn collapsed_domain_maps_to_midpoint() {
        let scale = SizeScale::build(&index(&[7.0, 7.0]), Some(2.0), Some(4.0));
        assert_eq!(scale.scale(7.0), 3.0);
        assert_eq!(SizeScale::build(&NodeIndex::default(), None, None).scale(0.0), 13.0);
    }

    #[test]
    fn color_scale_interpolates_between_stops() {
        let scale = ColorScale::build(&index(&[0.0, 10.0]), "#000000, #ffffff").expect("valid spec");
        assert_eq!(color_hex(scale.color(0.0)), "#000000");
        assert_eq!(color_hex(scale.color(10.0)), "#ffffff");
        assert_eq!(color_hex(scale.color(5.0)), "#808080");
        assert_eq!(color_hex(scale.color(-3.0)), "#000000");
        assert_eq!(scale.color(10.0), Color32::WHITE);
    }

    #[test]
    fn color_scale_spreads_many_stops() {
        let scale = ColorScale::from_extent((0.0, 2.0), "#f00,#0f0,#00f").expect("valid spec");
        assert_eq!(color_hex(scale.color(1.0)), "#00ff00");
        assert_eq!(color_hex(scale.color(1.5)), "#008080");
        assert_eq!(color_hex(scale.color(2.0)), "#0000ff");
    }

    #[test]
    fn single_stop_is_constant() {
        let scale = ColorScale::from_extent((0.0, 9.0), "#123456").expect("valid spec");
        assert_eq!(color_hex(scale.color(0.0)), "#123456");
        assert_eq!(color_hex(scale.color(9.0)), "#123456");
    }

    #[test]
    fn rejects_bad_color_specs() {
        assert!(matches!(parse_color_spec(" , "), Err(PipelineError::EmptyColorSpec)));
        assert!(matches!(
            parse_color_spec("#000,teal"),
            Err(PipelineError::InvalidColor { stop }) if stop == "teal"
        ));
        assert!(matches!(parse_hex("#12345"), Err(PipelineError::InvalidColor { .. })));
    }

    #[test]
    fn parses_alpha_stops() {
        assert_eq!(parse_hex("#11223380").expect("valid"), [0x11, 0x22, 0x33, 0x80]);
        assert_eq!(to_hex([0x11, 0x22, 0x33, 0x80]), "#11223380");
        assert_eq!(
            parse_color("#4e79a7").expect("valid"),
            Color32::from_rgb(0x4e, 0x79, 0xa7)
        );
        assert_eq!(color_hex(Color32::from_rgb(0xbd, 0xbd, 0xbd)), "#bdbdbd");
        assert_eq!(parse_hex("abc").expect("valid"), [0xaa, 0xbb, 0xcc, 0xff]);
    }

    #[test]
    fn serializes_stops_as_hex() {
        let scale = ColorScale::from_extent((0.0, 1.0), "#000,#fff").expect("valid spec");
        assert_eq!(
            serde_json::to_value(&scale).expect("scale serializes"),
            json!({ "domain": [0.0, 1.0], "stops": ["#000000", "#ffffff"] })
        );
    }
}
