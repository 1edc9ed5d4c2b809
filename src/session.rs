//! Table-selection session.
//!
//! A [`MappingSession`] ties one schema cache and one mapping store to the
//! currently selected connection. Column lists are fetched through the cache
//! by a caller-supplied closure; the session itself performs no I/O.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cache::{CacheConfig, Clock, SchemaCache, SystemClock},
    catalog::RuleCatalog,
    mapping::ColumnList,
    store::MappingStore,
};

#[derive(Debug)]
pub struct MappingSession<C: Clock = SystemClock> {
    cache: SchemaCache<ColumnList, C>,
    store: MappingStore,
    catalog: RuleCatalog,
    selected: Vec<String>,
}

impl MappingSession<SystemClock> {
    pub fn new(config: CacheConfig, catalog: RuleCatalog) -> Self {
        Self::with_cache(SchemaCache::new(config), MappingStore::new(), catalog)
    }
}

impl<C: Clock> MappingSession<C> {
    pub fn with_cache(
        cache: SchemaCache<ColumnList, C>,
        store: MappingStore,
        catalog: RuleCatalog,
    ) -> Self {
        Self {
            cache,
            store,
            catalog,
            selected: Vec::new(),
        }
    }

    pub fn cache(&self) -> &SchemaCache<ColumnList, C> {
        &self.cache
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MappingStore {
        &mut self.store
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn into_store(self) -> MappingStore {
        self.store
    }

    /// Columns of `table`, served from the cache when possible.
    pub fn columns<F>(&mut self, table: &str, fetch: F) -> Result<ColumnList>
    where
        F: FnOnce(&str) -> Result<ColumnList>,
    {
        if let Some(columns) = self.cache.get(table) {
            return Ok(columns.clone());
        }
        let columns =
            fetch(table).with_context(|| format!("Fetching columns for table '{table}'"))?;
        debug!("Fetched {} column(s) for '{table}'", columns.len());
        self.cache.set(table, columns.clone());
        Ok(columns)
    }

    /// Replaces the table selection.
    ///
    /// Cache entries of tables that dropped out of the selection are
    /// invalidated, and an empty selection clears the cache. Every selected
    /// table gets its default mapping derived the first time it is seen.
    /// Returns the tables that received a fresh default mapping.
    ///
    /// Columns are resolved for every pending table before anything changes,
    /// so a failed fetch leaves the selection, cache and store as they were.
    pub fn select_tables<F>(&mut self, tables: &[String], mut fetch: F) -> Result<Vec<String>>
    where
        F: FnMut(&str) -> Result<ColumnList>,
    {
        if tables.is_empty() {
            self.cache.clear();
            self.selected.clear();
            return Ok(Vec::new());
        }

        let mut pending: Vec<(&String, ColumnList, bool)> = Vec::new();
        for table in tables {
            if self.store.has_mappings(table) || self.store.was_attempted(table) {
                continue;
            }
            match self.cache.get(table) {
                Some(columns) => pending.push((table, columns.clone(), false)),
                None => {
                    let columns = fetch(table)
                        .with_context(|| format!("Fetching columns for table '{table}'"))?;
                    debug!("Fetched {} column(s) for '{table}'", columns.len());
                    pending.push((table, columns, true));
                }
            }
        }

        let dropped = self
            .selected
            .iter()
            .filter(|key| !tables.contains(key))
            .cloned()
            .collect::<Vec<_>>();
        if !dropped.is_empty() {
            self.cache.invalidate(&dropped);
        }
        self.selected = tables.to_vec();

        let mut derived = Vec::new();
        for (table, columns, fetched) in pending {
            if self.store.derive_default(table, &columns) {
                derived.push(table.clone());
            }
            if fetched {
                self.cache.set(table.as_str(), columns);
            }
        }
        if !derived.is_empty() {
            info!("Derived default mappings for {} table(s)", derived.len());
        }
        Ok(derived)
    }

    /// Applies the catalog's global rules to one table.
    pub fn apply_global_rules(&mut self, table: &str) -> usize {
        self.store
            .apply_global_rules(table, self.catalog.list_global_rules())
    }

    /// Forgets everything tied to the previous connection except the mappings.
    pub fn change_connection(&mut self) {
        self.cache.clear();
        self.store.reset_attempts();
        self.selected.clear();
    }
}
