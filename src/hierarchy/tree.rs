use std::collections::{HashMap, HashSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{PipelineError, Result};
use crate::record::{CHILDREN_KEY, Record, child_id, parent_id};

/// Deepest hierarchy the builder descends into before giving up.
pub const MAX_TREE_DEPTH: usize = 2048;

/// Most nodes a single build may produce. Shared subtrees under several
/// parents are copied under each, so this bounds diamond-shaped data.
pub const MAX_TREE_NODES: usize = 1 << 20;

/// One level of the hierarchy. Owns a copy of its record and its subtrees.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub record: Record,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(record: Record) -> Self {
        Self {
            record,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<String> {
        child_id(&self.record)
    }

    /// Levels on the longest root-to-leaf path; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeNode::depth)
            .max()
            .unwrap_or(0)
    }

    /// Total node count, shared subtrees counted once per parent.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Pre-order walk.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Every parent/child pair, parents before their descendants.
    pub fn edges(&self) -> Vec<(&TreeNode, &TreeNode)> {
        let mut edges = Vec::new();
        for node in self.iter() {
            for child in &node.children {
                edges.push((node, child));
            }
        }
        edges
    }
}

pub struct Iter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let attributes = self.record.len() - usize::from(self.record.contains_key(CHILDREN_KEY));
        let extra = usize::from(!self.children.is_empty());
        let mut map = serializer.serialize_map(Some(attributes + extra))?;
        for (key, value) in &self.record {
            if key != CHILDREN_KEY {
                map.serialize_entry(key, value)?;
            }
        }
        if !self.children.is_empty() {
            map.serialize_entry(CHILDREN_KEY, &self.children)?;
        }
        map.end()
    }
}

/// Records grouped under the identifier of their parent, input order kept.
/// A child identifier repeated under the same parent keeps its first record.
struct ChildLookup<'a> {
    by_parent: HashMap<String, Vec<&'a Record>>,
}

impl<'a> ChildLookup<'a> {
    fn new(records: &'a [Record]) -> Self {
        let mut by_parent: HashMap<String, Vec<&'a Record>> = HashMap::new();
        let mut linked = HashSet::new();
        for record in records {
            let Some(parent) = parent_id(record) else {
                continue;
            };
            if let Some(child) = child_id(record)
                && !linked.insert((parent.clone(), child))
            {
                continue;
            }
            by_parent.entry(parent).or_default().push(record);
        }
        Self { by_parent }
    }

    fn children_of(&self, id: &str) -> &[&'a Record] {
        self.by_parent.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    fn build(&self, record: &Record, walk: &mut Walk, depth: usize) -> Result<TreeNode> {
        if depth > MAX_TREE_DEPTH {
            return Err(PipelineError::DepthExceeded {
                limit: MAX_TREE_DEPTH,
            });
        }

        walk.built += 1;
        if walk.built > walk.max_nodes {
            return Err(PipelineError::TreeTooLarge {
                limit: walk.max_nodes,
            });
        }

        let Some(id) = child_id(record) else {
            return Ok(TreeNode::leaf(record.clone()));
        };

        if !walk.ancestors.insert(id.clone()) {
            return Err(PipelineError::CyclicHierarchy { id });
        }

        let records = self.children_of(&id);
        let mut children = Vec::with_capacity(records.len());
        for child in records {
            children.push(self.build(child, walk, depth + 1)?);
        }

        walk.ancestors.remove(&id);

        Ok(TreeNode {
            record: record.clone(),
            children,
        })
    }
}

/// Per-build state: the identifiers on the current path and the node count.
struct Walk {
    ancestors: HashSet<String>,
    built: usize,
    max_nodes: usize,
}

impl Walk {
    fn new(max_nodes: usize) -> Self {
        Self {
            ancestors: HashSet::new(),
            built: 0,
            max_nodes,
        }
    }
}

/// Builds the subtree hanging off `root` from the flat `remapped` records.
/// A record is a child of `p` when its `name` matches `p.child`. Nothing in
/// `remapped` is modified.
pub fn build_tree(remapped: &[Record], root: &Record) -> Result<TreeNode> {
    build_tree_within(remapped, root, MAX_TREE_NODES)
}

fn build_tree_within(remapped: &[Record], root: &Record, max_nodes: usize) -> Result<TreeNode> {
    let lookup = ChildLookup::new(remapped);
    lookup.build(root, &mut Walk::new(max_nodes), 1)
}

/// Builds a tree under a synthetic `root` whose direct children are `members`.
pub fn build_forest(remapped: &[Record], root: &Record, members: &[Record]) -> Result<TreeNode> {
    let lookup = ChildLookup::new(remapped);
    let mut walk = Walk::new(MAX_TREE_NODES);
    walk.built = 1;
    if let Some(id) = child_id(root) {
        walk.ancestors.insert(id);
    }

    let mut seen = HashSet::new();
    let mut children = Vec::with_capacity(members.len());
    for member in members {
        if let Some(id) = child_id(member)
            && !seen.insert(id)
        {
            continue;
        }
        children.push(lookup.build(member, &mut walk, 2)?);
    }

    Ok(TreeNode {
        record: root.clone(),
        children,
    })
}
