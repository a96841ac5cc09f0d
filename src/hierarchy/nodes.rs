use std::collections::HashMap;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Serialize;

use crate::record::{Record, child_id, value_metric};

/// Unique nodes keyed by their `child` identifier, first occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeIndex {
    nodes: Vec<Record>,
    #[serde(skip)]
    ids: Vec<String>,
    #[serde(skip)]
    index_by_id: HashMap<String, usize>,
    #[serde(skip)]
    duplicate_ids: Vec<String>,
}

impl NodeIndex {
    pub fn build(remapped: &[Record]) -> Self {
        let mut index = Self::default();

        for record in remapped {
            let Some(id) = child_id(record) else {
                continue;
            };

            if index.index_by_id.contains_key(&id) {
                if !index.duplicate_ids.contains(&id) {
                    index.duplicate_ids.push(id);
                }
                continue;
            }

            index.index_by_id.insert(id.clone(), index.nodes.len());
            index.ids.push(id);
            index.nodes.push(record.clone());
        }

        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Record] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.nodes.iter())
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.position(id).map(|index| &self.nodes[index])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Identifiers seen on more than one input record, first-seen order.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicate_ids
    }

    /// `(min, max)` of `valueMetric`; `(0, 0)` when there are no nodes.
    pub fn value_extent(&self) -> (f64, f64) {
        let mut values = self.nodes.iter().map(value_metric);
        let Some(first) = values.next() else {
            return (0.0, 0.0);
        };

        values.fold((first, first), |(min, max), value| {
            (min.min(value), max.max(value))
        })
    }

    /// Fuzzy identifier search, best score first. Equal scores keep index
    /// order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(&str, i64)> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut matches = self
            .ids
            .iter()
            .filter_map(|id| fuzzy_match_score(&matcher, id, query).map(|score| (id.as_str(), score)))
            .collect::<Vec<_>>();

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(limit);
        matches
    }
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}
