use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RenderSettings;
use crate::error::{PipelineError, Result};
use crate::hierarchy::{
    NodeIndex, ResolvedRoot, TreeNode, build_forest, build_tree, remap, resolve_roots, select_root,
};
use crate::memo::{CacheStats, Fingerprint, MemoCache};
use crate::record::{Record, child_id};
use crate::scale::{ColorScale, SizeScale};

pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Everything the drawing layer needs for one render request.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub fingerprint: Fingerprint,
    pub remapped: Arc<Vec<Record>>,
    pub roots: Arc<Vec<Record>>,
    pub tree: Arc<TreeNode>,
    pub nodes: Arc<NodeIndex>,
    pub size_scale: Arc<SizeScale>,
    pub color_scale: Arc<ColorScale>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub remap: CacheStats,
    pub roots: CacheStats,
    pub tree: CacheStats,
    pub nodes: CacheStats,
    pub size_scale: CacheStats,
    pub color_scale: CacheStats,
}

/// Runs remap → roots → tree / node index → scales, with one memo table per
/// stage. Re-running with equal inputs reuses every stage's previous result.
pub struct Pipeline {
    remapped: MemoCache<Vec<Record>>,
    roots: MemoCache<Vec<Record>>,
    trees: MemoCache<TreeNode>,
    nodes: MemoCache<NodeIndex>,
    size_scales: MemoCache<SizeScale>,
    color_scales: MemoCache<ColorScale>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl Pipeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            remapped: MemoCache::new("remap", capacity),
            roots: MemoCache::new("roots", capacity),
            trees: MemoCache::new("tree", capacity),
            nodes: MemoCache::new("nodes", capacity),
            size_scales: MemoCache::new("size_scale", capacity),
            color_scales: MemoCache::new("color_scale", capacity),
        }
    }

    pub fn prepare(&mut self, records: &[Record], settings: &RenderSettings) -> Result<Prepared> {
        let mapping = &settings.mapping;
        if !mapping.is_complete() {
            return Err(PipelineError::IncompleteMapping);
        }

        let fingerprint = Fingerprint::of("remap", &(records, mapping))?;

        let remapped = self
            .remapped
            .get_or_insert(fingerprint, || remap(records, mapping));

        let roots = self
            .roots
            .get_or_try_insert(fingerprint.derive("roots", &())?, || {
                resolve_roots(&remapped)
            })?;

        let policy = settings.root_policy();
        let tree = self
            .trees
            .get_or_try_insert(fingerprint.derive("tree", &policy)?, || {
                let resolved = select_root(&roots, &policy)?;
                debug!(
                    root = child_id(resolved.record()).as_deref().unwrap_or_default(),
                    "building tree"
                );
                match resolved {
                    ResolvedRoot::Single(root) => build_tree(&remapped, &root),
                    ResolvedRoot::Merged { root, members } => {
                        build_forest(&remapped, &root, &members)
                    }
                }
            })?;

        let nodes = self
            .nodes
            .get_or_insert(fingerprint.derive("nodes", &())?, || {
                let index = NodeIndex::build(&remapped);
                if !index.duplicate_ids().is_empty() {
                    warn!(
                        duplicates = index.duplicate_ids().len(),
                        first = %index.duplicate_ids()[0],
                        "duplicate child identifiers, keeping first occurrence"
                    );
                }
                index
            });

        let radii = (settings.marker_min_radius, settings.marker_max_radius);
        let size_scale = self
            .size_scales
            .get_or_insert(fingerprint.derive("size_scale", &radii)?, || {
                SizeScale::build(&nodes, radii.0, radii.1)
            });

        let color_scale = self.color_scales.get_or_try_insert(
            fingerprint.derive("color_scale", &settings.node_color)?,
            || ColorScale::build(&nodes, &settings.node_color),
        )?;

        debug!(
            records = records.len(),
            nodes = nodes.len(),
            depth = tree.depth(),
            key = %fingerprint.to_hex(),
            "prepared hierarchy"
        );

        Ok(Prepared {
            fingerprint,
            remapped,
            roots,
            tree,
            nodes,
            size_scale,
            color_scale,
        })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            remap: self.remapped.stats(),
            roots: self.roots.stats(),
            tree: self.trees.stats(),
            nodes: self.nodes.stats(),
            size_scale: self.size_scales.stats(),
            color_scale: self.color_scales.stats(),
        }
    }

    pub fn clear(&mut self) {
        self.remapped.clear();
        self.roots.clear();
        self.trees.clear();
        self.nodes.clear();
        self.size_scales.clear();
        self.color_scales.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::config::FieldMapping;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .map(|rows| rows.iter().filter_map(|row| row.as_object().cloned()).collect())
            .unwrap_or_default()
    }

    fn settings() -> RenderSettings {
        RenderSettings::with_mapping(FieldMapping::new("Parent", "Id").with_value("Size"))
    }

    fn sample() -> Vec<Record> {
        records(json!([
            { "Parent": null, "Id": "root", "Size": 1 },
            { "Parent": "root", "Id": "a", "Size": "4" },
            { "Parent": "root", "Id": "b", "Size": 9 },
        ]))
    }

    #[test]
    fn incomplete_mapping_runs_nothing() {
        let mut pipeline = Pipeline::default();
        let result = pipeline.prepare(&sample(), &RenderSettings::default());

        assert!(matches!(result, Err(PipelineError::IncompleteMapping)));
        assert_eq!(pipeline.stats(), PipelineStats::default());
    }

    #[test]
    fn equal_inputs_hit_every_stage() {
        let mut pipeline = Pipeline::default();

        let first = pipeline.prepare(&sample(), &settings()).expect("prepared");
        let second = pipeline.prepare(&sample(), &settings()).expect("prepared");

        assert!(Arc::ptr_eq(&first.tree, &second.tree));
        assert!(Arc::ptr_eq(&first.nodes, &second.nodes));
        let stats = pipeline.stats();
        for stage in [
            stats.remap,
            stats.roots,
            stats.tree,
            stats.nodes,
            stats.size_scale,
            stats.color_scale,
        ] {
            assert_eq!((stage.misses, stage.hits), (1, 1));
        }
    }

    #[test]
    fn changed_radius_only_rebuilds_size_scale() {
        let mut pipeline = Pipeline::default();
        let mut settings = settings();
        pipeline.prepare(&sample(), &settings).expect("prepared");

        settings.marker_max_radius = Some(60.0);
        let prepared = pipeline.prepare(&sample(), &settings).expect("prepared");

        let stats = pipeline.stats();
        assert_eq!(stats.size_scale.misses, 2);
        assert_eq!(stats.tree.misses, 1);
        assert_eq!(stats.color_scale.misses, 1);
        assert_eq!(prepared.size_scale.scale(9.0), 60.0);
    }

    #[test]
    fn missing_root_is_not_ready_and_retried() {
        let mut pipeline = Pipeline::default();
        let data = records(json!([{ "Parent": "x", "Id": "a" }]));

        let error = pipeline.prepare(&data, &settings()).expect_err("no root");
        assert!(error.is_not_ready());

        let _ = pipeline.prepare(&data, &settings());
        assert_eq!(pipeline.stats().roots.misses, 2);
        assert_eq!(pipeline.stats().remap.hits, 1);
    }

    #[test]
    fn bad_color_spec_surfaces_after_tree() {
        let mut pipeline = Pipeline::default();
        let mut settings = settings();
        settings.node_color = "nope".into();

        assert!(matches!(
            pipeline.prepare(&sample(), &settings),
            Err(PipelineError::InvalidColor { .. })
        ));
        assert_eq!(pipeline.stats().tree.misses, 1);
    }
}
