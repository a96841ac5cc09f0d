mod nodes;
mod remap;
mod root;
mod tree;

pub use nodes::NodeIndex;
pub use remap::remap;
pub use root::{ResolvedRoot, resolve_roots, select_root};
pub use tree::{Iter, MAX_TREE_DEPTH, MAX_TREE_NODES, TreeNode, build_forest, build_tree};
