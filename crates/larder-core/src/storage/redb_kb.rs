//! # redb-backed Knowledge Base
//!
//! A disk-backed recipe knowledge base using the redb embedded database.
//!
//! Records are postcard-encoded and keyed by recipe id. The category index is
//! rebuilt in memory when the database is opened, so category lookups never
//! scan the records table.

use crate::knowledge::{KnowledgeBase, RecipeDetails};
use crate::{LarderError, RecipeId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Table for records: RecipeId(u64) -> serialized RecipeDetails bytes
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const SCHEMA_VERSION_KEY: &str = "schema_version";
const SCHEMA_VERSION: u64 = 1;

/// A disk-backed knowledge base.
pub struct RedbKnowledgeBase {
    db: Database,
    /// category -> ids, rebuilt on open and kept current by `import`.
    categories: BTreeMap<String, BTreeSet<RecipeId>>,
}

impl std::fmt::Debug for RedbKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKnowledgeBase")
            .field("categories", &self.categories.len())
            .finish_non_exhaustive()
    }
}

impl RedbKnowledgeBase {
    /// Open or create a knowledge base at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LarderError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| LarderError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| LarderError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(RECORDS)
                .map_err(|e| LarderError::IoError(e.to_string()))?;
            {
                let mut meta = write_txn
                    .open_table(METADATA)
                    .map_err(|e| LarderError::IoError(e.to_string()))?;
                let existing = meta
                    .get(SCHEMA_VERSION_KEY)
                    .map_err(|e| LarderError::IoError(e.to_string()))?
                    .map(|v| v.value());
                match existing {
                    Some(SCHEMA_VERSION) => {}
                    Some(other) => {
                        return Err(LarderError::SerializationError(format!(
                            "Unsupported knowledge base schema: {} (expected {})",
                            other, SCHEMA_VERSION
                        )));
                    }
                    None => {
                        meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION)
                            .map_err(|e| LarderError::IoError(e.to_string()))?;
                    }
                }
            }
            write_txn
                .commit()
                .map_err(|e| LarderError::IoError(e.to_string()))?;
        }

        // Rebuild the category index
        let categories = {
            let read_txn = db
                .begin_read()
                .map_err(|e| LarderError::IoError(e.to_string()))?;
            let table = read_txn
                .open_table(RECORDS)
                .map_err(|e| LarderError::IoError(e.to_string()))?;
            let mut index: BTreeMap<String, BTreeSet<RecipeId>> = BTreeMap::new();
            for entry in table
                .iter()
                .map_err(|e| LarderError::IoError(e.to_string()))?
            {
                let (_, value) = entry.map_err(|e| LarderError::IoError(e.to_string()))?;
                let record: RecipeDetails = postcard::from_bytes(value.value())
                    .map_err(|e| LarderError::SerializationError(e.to_string()))?;
                index.entry(record.category).or_default().insert(record.id);
            }
            index
        };

        tracing::debug!(categories = categories.len(), "opened knowledge base");

        Ok(Self { db, categories })
    }

    /// Write records in a single transaction. Existing ids are overwritten.
    ///
    /// Every record is validated before the transaction opens; a blank
    /// category or an id repeated within the batch rejects the whole batch.
    pub fn import(
        &mut self,
        records: impl IntoIterator<Item = RecipeDetails>,
    ) -> Result<usize, LarderError> {
        let records: Vec<RecipeDetails> = records
            .into_iter()
            .map(RecipeDetails::normalized)
            .collect();
        if let Some(bad) = records.iter().find(|r| r.category.is_empty()) {
            return Err(LarderError::InvalidCatalog(format!(
                "recipe {} has an empty category",
                bad.id
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id)) {
            return Err(LarderError::InvalidCatalog(format!(
                "duplicate knowledge-base record {}",
                dup.id
            )));
        }

        let mut replaced: Vec<RecipeDetails> = Vec::new();
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(RECORDS)
                .map_err(|e| LarderError::IoError(e.to_string()))?;
            for record in &records {
                let bytes = postcard::to_allocvec(record)
                    .map_err(|e| LarderError::SerializationError(e.to_string()))?;
                let previous = table
                    .insert(record.id.0, bytes.as_slice())
                    .map_err(|e| LarderError::IoError(e.to_string()))?;
                if let Some(previous) = previous {
                    let old: RecipeDetails = postcard::from_bytes(previous.value())
                        .map_err(|e| LarderError::SerializationError(e.to_string()))?;
                    replaced.push(old);
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| LarderError::IoError(e.to_string()))?;

        // Update the index only after the commit succeeded.
        for old in replaced {
            if let Some(ids) = self.categories.get_mut(&old.category) {
                ids.remove(&old.id);
            }
        }
        self.categories.retain(|_, ids| !ids.is_empty());
        for record in &records {
            self.categories
                .entry(record.category.clone())
                .or_default()
                .insert(record.id);
        }

        tracing::info!(records = records.len(), "imported knowledge base records");
        Ok(records.len())
    }

    /// Known categories in ascending order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), LarderError> {
        self.db
            .compact()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        Ok(())
    }
}

impl KnowledgeBase for RedbKnowledgeBase {
    fn lookup(&self, id: RecipeId) -> Result<Option<RecipeDetails>, LarderError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(|e| LarderError::IoError(e.to_string()))?;

        match table
            .get(id.0)
            .map_err(|e| LarderError::IoError(e.to_string()))?
        {
            Some(data) => {
                let record: RecipeDetails = postcard::from_bytes(data.value())
                    .map_err(|e| LarderError::SerializationError(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn by_category(&self, category: &str) -> Result<Vec<RecipeDetails>, LarderError> {
        let Some(ids) = self.categories.get(&category.trim().to_lowercase()) else {
            return Ok(Vec::new());
        };

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(|e| LarderError::IoError(e.to_string()))?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(data) = table
                .get(id.0)
                .map_err(|e| LarderError::IoError(e.to_string()))?
            {
                let record: RecipeDetails = postcard::from_bytes(data.value())
                    .map_err(|e| LarderError::SerializationError(e.to_string()))?;
                records.push(record);
            }
        }
        Ok(records)
    }

    fn record_count(&self) -> Result<usize, LarderError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        let count = table
            .len()
            .map_err(|e| LarderError::IoError(e.to_string()))?;
        Ok(count as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
