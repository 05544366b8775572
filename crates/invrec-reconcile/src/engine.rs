use std::collections::BTreeSet;

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange, KeyIndex};

use crate::ReconciliationReport;

/// Fields in `fields` whose values differ between the two items.
///
/// An absent field compares as null, so present-vs-absent is a difference and
/// absent-vs-absent is not. No type coercion.
pub fn changed_fields(
    origin: &CanonicalItem,
    target: &CanonicalItem,
    fields: &BTreeSet<String>,
) -> BTreeSet<String> {
    fields
        .iter()
        .filter(|f| origin.value_or_null(f) != target.value_or_null(f))
        .cloned()
        .collect()
}

/// Deterministic reconciliation of `origin` against `target` over `fields`.
///
/// Keys are visited in ascending order. An empty field set makes every key
/// present on both sides `matched`. Neither index is modified.
pub fn diff<I, S>(origin: &KeyIndex, target: &KeyIndex, fields: I) -> ReconciliationReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let fields: BTreeSet<String> = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
    let mut report = ReconciliationReport::empty(fields);

    // Union of keys, ascending.
    let mut keys: BTreeSet<&IdentityKey> = BTreeSet::new();
    keys.extend(origin.keys());
    keys.extend(target.keys());

    for key in keys {
        match (origin.get(key), target.get(key)) {
            (Some(o), None) => {
                report.missing_in_target.insert(key.clone(), o.clone());
            }
            (None, Some(t)) => {
                report.missing_in_origin.insert(key.clone(), t.clone());
            }
            (Some(o), Some(t)) => {
                let differing = changed_fields(o, t, &report.fields);
                if differing.is_empty() {
                    report.matched.insert(key.clone());
                } else {
                    report.changed.insert(
                        key.clone(),
                        ItemChange {
                            origin: o.clone(),
                            target: t.clone(),
                            fields: differing,
                        },
                    );
                }
            }
            (None, None) => {}
        }
    }

    report
}
