//! Subgroup generation and filtering.
//!
//! A subgroup is one value picked from every configured dimension, joined
//! with AND. Generation composes per-dimension predicate lists through a
//! table built from the last dimension backwards; filtering keeps only the
//! subgroups with enough non-null observations to feed a model.

use std::collections::BTreeMap;
use std::fmt;

use crate::series::{RawRow, RawSeriesFrame};

/// Equality predicate on one dimension column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    /// Position of the column in the frame's dimension list.
    pub dimension: usize,
    pub column: String,
    pub value: String,
}

impl Predicate {
    pub fn matches(&self, row: &RawRow) -> bool {
        matches!(row.dimensions.get(self.dimension), Some(Some(v)) if *v == self.value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped = self.value.replace('\\', "\\\\").replace('"', "\\\"");
        write!(f, "`{}`==\"{}\"", self.column, escaped)
    }
}

/// Conjunction of dimension predicates, in dimension order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subgroup {
    predicates: Vec<Predicate>,
}

impl Subgroup {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// `self AND rest`, keeping `self`'s predicates first.
    fn and(&self, rest: &Subgroup) -> Subgroup {
        let mut predicates = Vec::with_capacity(self.predicates.len() + rest.predicates.len());
        predicates.extend_from_slice(&self.predicates);
        predicates.extend_from_slice(&rest.predicates);
        Subgroup { predicates }
    }

    pub fn matches(&self, row: &RawRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    fn matches_key(&self, key: &[String]) -> bool {
        self.predicates
            .iter()
            .all(|p| key.get(p.dimension).is_some_and(|v| *v == p.value))
    }

    /// Canonical filter string, used as the persisted series identifier.
    pub fn filter_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Subgroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}

/// Every dimension-value combination observed in `frame`.
///
/// Returns `∏ nᵢ` subgroups where `nᵢ` is the number of distinct non-null
/// values in dimension `i`. Zero dimensions yield no subgroups.
pub fn enumerate(frame: &RawSeriesFrame) -> Vec<Subgroup> {
    let levels: Vec<Vec<Subgroup>> = frame
        .dimensions
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            frame
                .distinct_values(idx)
                .into_iter()
                .map(|value| {
                    Subgroup::new(vec![Predicate {
                        dimension: idx,
                        column: column.clone(),
                        value,
                    }])
                })
                .collect()
        })
        .collect();

    compose(levels)
}

/// Combine per-level predicate lists right to left.
///
/// `table[L]` holds every combination of levels `L..`; each entry is built
/// once and shared by every predicate of the level above it.
fn compose(mut levels: Vec<Vec<Subgroup>>) -> Vec<Subgroup> {
    let Some(last) = levels.pop() else {
        return Vec::new();
    };

    let mut suffixes = last;
    while let Some(level) = levels.pop() {
        let mut combined = Vec::with_capacity(level.len() * suffixes.len());
        for head in &level {
            combined.extend(suffixes.iter().map(|tail| head.and(tail)));
        }
        suffixes = combined;
    }
    suffixes
}

/// Observation counts per full dimension-value combination.
///
/// Rows with a null in any dimension are not grouped; null metrics are not
/// counted.
#[derive(Debug, Default)]
pub struct CountTable {
    groups: BTreeMap<Vec<String>, usize>,
}

impl CountTable {
    pub fn build(frame: &RawSeriesFrame) -> Self {
        let mut groups = BTreeMap::new();
        for row in &frame.rows {
            let Some(key) = row.dimensions.iter().cloned().collect::<Option<Vec<String>>>()
            else {
                continue;
            };
            let count = groups.entry(key).or_insert(0usize);
            if row.metric.is_some() {
                *count += 1;
            }
        }
        Self { groups }
    }

    /// Count of the first group (in key order) matching `subgroup`.
    pub fn count(&self, subgroup: &Subgroup) -> Option<usize> {
        self.groups
            .iter()
            .find(|(key, _)| subgroup.matches_key(key))
            .map(|(_, count)| *count)
    }
}

/// Keep subgroups whose observation count is at least `period`.
///
/// Subgroups matching no group are dropped. Order is preserved.
pub fn filter(subgroups: Vec<Subgroup>, frame: &RawSeriesFrame, period: u32) -> Vec<Subgroup> {
    let table = CountTable::build(frame);
    subgroups
        .into_iter()
        .filter(|subgroup| {
            table
                .count(subgroup)
                .is_some_and(|count| count >= period as usize)
        })
        .collect()
}
