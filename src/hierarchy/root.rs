use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RootPolicy;
use crate::error::{PipelineError, Result};
use crate::record::{CHILD_KEY, Record, child_id, is_root};

/// The tree's entry point after the root policy has been applied.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedRoot {
    Single(Record),
    /// A synthetic record adopting every candidate as a direct child.
    Merged { root: Record, members: Vec<Record> },
}

impl ResolvedRoot {
    pub fn record(&self) -> &Record {
        match self {
            Self::Single(root) | Self::Merged { root, .. } => root,
        }
    }
}

/// Every record whose parent link is null or absent, in input order.
pub fn resolve_roots(remapped: &[Record]) -> Result<Vec<Record>> {
    let roots = remapped
        .iter()
        .filter(|record| is_root(record))
        .cloned()
        .collect::<Vec<_>>();

    if roots.is_empty() {
        return Err(PipelineError::MissingRoot {
            records: remapped.len(),
        });
    }

    debug!(candidates = roots.len(), records = remapped.len(), "resolved roots");
    Ok(roots)
}

pub fn select_root(roots: &[Record], policy: &RootPolicy) -> Result<ResolvedRoot> {
    let Some(first) = roots.first() else {
        return Err(PipelineError::MissingRoot { records: 0 });
    };

    match policy {
        RootPolicy::First => {
            if roots.len() > 1 {
                warn!(
                    candidates = roots.len(),
                    chosen = child_id(first).as_deref().unwrap_or_default(),
                    "several root candidates, using the first"
                );
            }
            Ok(ResolvedRoot::Single(first.clone()))
        }
        RootPolicy::Strict if roots.len() > 1 => Err(PipelineError::AmbiguousRoot {
            count: roots.len(),
        }),
        RootPolicy::Strict => Ok(ResolvedRoot::Single(first.clone())),
        RootPolicy::Merge { id } if roots.len() > 1 => {
            let mut root = Record::new();
            root.insert(CHILD_KEY.to_string(), Value::String(id.clone()));
            Ok(ResolvedRoot::Merged {
                root,
                members: roots.to_vec(),
            })
        }
        RootPolicy::Merge { .. } => Ok(ResolvedRoot::Single(first.clone())),
    }
}
