//! Per-table mapping state.
//!
//! [`MappingStore`] owns, for every table key, the ordered list of
//! [`ColumnMapping`]s that will be emitted downstream. Every operation is
//! total: unknown tables read as empty lists and out-of-range indices or empty
//! selections leave the state unchanged. Mutators report whether anything
//! changed so callers can decide whether to persist.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::GlobalRule,
    mapping::{ColumnMapping, FieldEdit, SourceColumn},
};

pub const DUPLICATE_SUFFIX: &str = "_copy";
pub const AUDIT_COLUMN_PREFIX: &str = "audit_column_";

/// Indices into the current (unfiltered) mapping list of a table.
pub type Selection = BTreeSet<usize>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingStore {
    tables: BTreeMap<String, Vec<ColumnMapping>>,
    #[serde(skip)]
    attempted: HashSet<String>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mappings(&self, table: &str) -> &[ColumnMapping] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn table_keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn has_mappings(&self, table: &str) -> bool {
        !self.mappings(table).is_empty()
    }

    /// Marks `table` as already derived so later selections leave it alone.
    pub fn mark_attempted(&mut self, table: &str) {
        self.attempted.insert(table.to_string());
    }

    pub fn was_attempted(&self, table: &str) -> bool {
        self.attempted.contains(table)
    }

    /// Forgets every derivation marker, e.g. when the owning connection changes.
    pub fn reset_attempts(&mut self) {
        self.attempted.clear();
    }

    /// Creates one direct mapping per column, in column order.
    ///
    /// Runs at most once per table: a table that already has mappings, or that
    /// was derived before in this session, is left untouched. An empty column
    /// list does not count as an attempt because the columns may still be on
    /// their way.
    pub fn derive_default(&mut self, table: &str, columns: &[SourceColumn]) -> bool {
        if self.has_mappings(table) || self.was_attempted(table) {
            debug!("Skipping default mapping for '{table}': already derived");
            return false;
        }
        if columns.is_empty() {
            debug!("Skipping default mapping for '{table}': no columns available");
            return false;
        }
        self.mark_attempted(table);
        let mut seen = HashSet::new();
        let mappings = columns
            .iter()
            .filter(|column| seen.insert(column.name.as_str()))
            .map(ColumnMapping::from_column)
            .collect::<Vec<_>>();
        debug!("Derived {} default mapping(s) for '{table}'", mappings.len());
        self.tables.insert(table.to_string(), mappings);
        true
    }

    /// Applies `edit` to the mapping fed by `source`, creating a minimal direct
    /// mapping for that source first when none exists.
    pub fn update_field(&mut self, table: &str, source: &str, edit: FieldEdit) {
        let list = self.tables.entry(table.to_string()).or_default();
        match list
            .iter_mut()
            .find(|mapping| !mapping.is_audit && mapping.has_source(source))
        {
            Some(mapping) => mapping.apply(edit),
            None => {
                let mut mapping = ColumnMapping::direct(source);
                mapping.apply(edit);
                list.push(mapping);
            }
        }
    }

    /// Applies `edit` to the mapping at `index`. This is the only way to edit
    /// audit columns, which have no source to address them by.
    pub fn update_at(&mut self, table: &str, index: usize, edit: FieldEdit) -> bool {
        match self
            .tables
            .get_mut(table)
            .and_then(|list| list.get_mut(index))
        {
            Some(mapping) => {
                mapping.apply(edit);
                true
            }
            None => {
                debug!("Ignoring edit of '{table}' at out-of-range index {index}");
                false
            }
        }
    }

    pub fn add_mapping(&mut self, table: &str, column: &SourceColumn) -> bool {
        let list = self.tables.entry(table.to_string()).or_default();
        if list
            .iter()
            .any(|mapping| !mapping.is_audit && mapping.has_source(&column.name))
        {
            return false;
        }
        list.push(ColumnMapping::from_column(column));
        true
    }

    /// Removes every non-audit mapping fed by `source` and returns how many went.
    pub fn remove_mapping(&mut self, table: &str, source: &str) -> usize {
        let Some(list) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = list.len();
        list.retain(|mapping| mapping.is_audit || !mapping.has_source(source));
        before - list.len()
    }

    pub fn reorder(&mut self, table: &str, from: usize, to: usize) -> bool {
        let Some(list) = self.tables.get_mut(table) else {
            return false;
        };
        if from >= list.len() || to >= list.len() {
            debug!(
                "Ignoring reorder of '{table}' from {from} to {to} (length {})",
                list.len()
            );
            return false;
        }
        if from != to {
            let moved = list.remove(from);
            list.insert(to, moved);
        }
        true
    }

    /// Sets the transformation of every non-audit mapping whose source matches
    /// one of `rules`; the first matching rule wins. Matched mappings are
    /// overwritten even if they were edited by hand. Returns the match count.
    pub fn apply_global_rules(&mut self, table: &str, rules: &[GlobalRule]) -> usize {
        let Some(list) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut matched = 0usize;
        for mapping in list.iter_mut().filter(|mapping| !mapping.is_audit) {
            let Some(source) = mapping.source.as_deref() else {
                continue;
            };
            if let Some(rule) = rules.iter().find(|rule| rule.matches(source)) {
                debug!(
                    "Rule '{}' sets '{source}' to '{}'",
                    rule.id, rule.transformation
                );
                mapping.transformation = rule.transformation.clone();
                matched += 1;
            }
        }
        matched
    }

    /// Every selectable index of `table`; audit columns are never selectable.
    pub fn select_all(&self, table: &str) -> Selection {
        self.mappings(table)
            .iter()
            .enumerate()
            .filter(|(_, mapping)| !mapping.is_audit)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn deselect_all(&self) -> Selection {
        Selection::new()
    }

    pub fn apply_transformation(
        &mut self,
        table: &str,
        selection: &Selection,
        transformation: &str,
    ) -> usize {
        let Some(list) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut changed = 0usize;
        for idx in selection {
            if let Some(mapping) = list.get_mut(*idx).filter(|mapping| !mapping.is_audit) {
                mapping.transformation = transformation.to_string();
                changed += 1;
            }
        }
        changed
    }

    /// Deletes the selected mappings. Audit columns survive even when selected.
    pub fn delete_selected(&mut self, table: &str, selection: &Selection) -> usize {
        let Some(list) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = list.len();
        let mut idx = 0usize;
        list.retain(|mapping| {
            let keep = mapping.is_audit || !selection.contains(&idx);
            idx += 1;
            keep
        });
        before - list.len()
    }

    /// Appends a derived copy of each selected mapping with a suffixed target.
    ///
    /// The copy keeps the original `source`, so the list ends up with two
    /// mappings fed by the same source column.
    pub fn duplicate_selected(&mut self, table: &str, selection: &Selection) -> usize {
        let Some(list) = self.tables.get_mut(table) else {
            return 0;
        };
        let copies = selection
            .iter()
            .filter_map(|idx| list.get(*idx))
            .filter(|mapping| !mapping.is_audit)
            .map(|mapping| {
                let mut copy = mapping.clone();
                copy.target = format!("{}{DUPLICATE_SUFFIX}", mapping.target);
                copy.derived = true;
                copy
            })
            .collect::<Vec<_>>();
        let count = copies.len();
        list.extend(copies);
        count
    }

    /// Appends an audit column with a target name not yet used by the table.
    pub fn add_audit_column(&mut self, table: &str) -> String {
        let list = self.tables.entry(table.to_string()).or_default();
        let taken = list
            .iter()
            .map(|mapping| mapping.target.as_str())
            .collect::<HashSet<_>>();
        let target = (1usize..)
            .map(|n| format!("{AUDIT_COLUMN_PREFIX}{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| AUDIT_COLUMN_PREFIX.to_string());
        list.push(ColumnMapping::audit(target.clone()));
        target
    }

    pub fn remove_audit_column(&mut self, table: &str, target: &str) -> bool {
        let Some(list) = self.tables.get_mut(table) else {
            return false;
        };
        let before = list.len();
        list.retain(|mapping| !(mapping.is_audit && mapping.target == target));
        before != list.len()
    }

    /// Replaces the non-audit mappings of `table` with `imported`, keeping the
    /// table's existing audit columns after them.
    pub fn replace_from_import(&mut self, table: &str, imported: Vec<ColumnMapping>) {
        let existing = self.tables.remove(table).unwrap_or_default();
        let mut list = imported
            .into_iter()
            .filter(|mapping| !mapping.is_audit)
            .collect::<Vec<_>>();
        list.extend(existing.into_iter().filter(|mapping| mapping.is_audit));
        self.mark_attempted(table);
        self.tables.insert(table.to_string(), list);
    }
}
