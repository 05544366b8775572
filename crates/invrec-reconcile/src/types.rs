use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{json, Value};

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange};

/// Which partition of a report a key landed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Matched,
    Changed,
    MissingInTarget,
    MissingInOrigin,
}

/// Diff output: four disjoint partitions over the union of origin and target
/// keys.
///
/// - `matched`: in both, every compared field equal
/// - `changed`: in both, at least one compared field differs
/// - `missing_in_target`: only in origin; holds the origin item (create candidate)
/// - `missing_in_origin`: only in target; holds the target item (delete candidate)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Field set the report was computed over.
    pub fields: BTreeSet<String>,
    pub matched: BTreeSet<IdentityKey>,
    pub changed: BTreeMap<IdentityKey, ItemChange>,
    pub missing_in_target: BTreeMap<IdentityKey, CanonicalItem>,
    pub missing_in_origin: BTreeMap<IdentityKey, CanonicalItem>,
}

/// Partition sizes, for logs and CLI output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub matched: usize,
    pub changed: usize,
    pub missing_in_target: usize,
    pub missing_in_origin: usize,
}

impl ReconciliationReport {
    pub fn empty(fields: BTreeSet<String>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// True when origin and target agree on every key and compared field.
    pub fn is_in_sync(&self) -> bool {
        self.changed.is_empty() && self.missing_in_target.is_empty() && self.missing_in_origin.is_empty()
    }

    pub fn total_keys(&self) -> usize {
        self.matched.len() + self.changed.len() + self.missing_in_target.len() + self.missing_in_origin.len()
    }

    pub fn partition_of(&self, key: &IdentityKey) -> Option<Partition> {
        if self.matched.contains(key) {
            Some(Partition::Matched)
        } else if self.changed.contains_key(key) {
            Some(Partition::Changed)
        } else if self.missing_in_target.contains_key(key) {
            Some(Partition::MissingInTarget)
        } else if self.missing_in_origin.contains_key(key) {
            Some(Partition::MissingInOrigin)
        } else {
            None
        }
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            matched: self.matched.len(),
            changed: self.changed.len(),
            missing_in_target: self.missing_in_target.len(),
            missing_in_origin: self.missing_in_origin.len(),
        }
    }

    /// The same report seen from the other side: origin and target swap roles.
    pub fn reversed(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            matched: self.matched.clone(),
            changed: self
                .changed
                .iter()
                .map(|(k, c)| {
                    (
                        k.clone(),
                        ItemChange {
                            origin: c.target.clone(),
                            target: c.origin.clone(),
                            fields: c.fields.clone(),
                        },
                    )
                })
                .collect(),
            missing_in_target: self.missing_in_origin.clone(),
            missing_in_origin: self.missing_in_target.clone(),
        }
    }

    /// JSON rendering with keys as arrays, since identity keys are tuples.
    pub fn to_json(&self) -> Value {
        let changed: Vec<Value> = self
            .changed
            .iter()
            .map(|(k, c)| {
                let diffs: BTreeMap<&str, Value> = c
                    .fields
                    .iter()
                    .map(|f| {
                        (
                            f.as_str(),
                            json!({
                                "origin": c.origin.value_or_null(f),
                                "target": c.target.value_or_null(f),
                            }),
                        )
                    })
                    .collect();
                json!({ "key": k, "fields": diffs })
            })
            .collect();

        let only = |m: &BTreeMap<IdentityKey, CanonicalItem>| -> Vec<Value> {
            m.iter()
                .map(|(k, item)| json!({ "key": k, "item": item }))
                .collect()
        };

        json!({
            "fields": self.fields,
            "summary": self.summary(),
            "matched": self.matched.iter().collect::<Vec<_>>(),
            "changed": changed,
            "missing_in_target": only(&self.missing_in_target),
            "missing_in_origin": only(&self.missing_in_origin),
        })
    }
}
