//! Rows that each describe one entity.

use ahash::AHashMap;
use async_trait::async_trait;
use kvdex_core::Fields;

use super::{LoadError, Row, RowError, RowHandler};
use crate::client::WriteOp;
use crate::consistency::EntityIndex;

/// Builds an entity's fields from its row.
pub type RowMapper = fn(&Row) -> Result<Fields, RowError>;

/// Upserts one entity per row through [`EntityIndex::upsert_ops`].
///
/// The current record is read before each row, so re-importing an entity
/// with a different categorical or parent value moves it instead of leaving
/// it indexed under both. Ids already seen in this step are answered from
/// memory because their writes may still sit in an uncommitted batch.
pub struct EntityRows {
    index: EntityIndex,
    id_column: &'static str,
    map: RowMapper,
    written: AHashMap<String, Fields>,
    previous: Fields,
}

impl EntityRows {
    #[must_use]
    pub fn new(index: EntityIndex, id_column: &'static str, map: RowMapper) -> Self {
        Self {
            index,
            id_column,
            map,
            written: AHashMap::new(),
            previous: Fields::new(),
        }
    }
}

#[async_trait]
impl RowHandler for EntityRows {
    async fn prepare(&mut self, row: &Row) -> Result<(), LoadError> {
        self.previous = match row.required(self.id_column) {
            Ok(id) => match self.written.get(id) {
                Some(fields) => fields.clone(),
                None => self.index.records().get(id).await?,
            },
            Err(_) => Fields::new(),
        };
        Ok(())
    }

    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
        let id = row.required(self.id_column)?;
        let fields = (self.map)(row)?;
        ops.extend(self.index.upsert_ops(id, &fields, &self.previous));

        let mut current = std::mem::take(&mut self.previous);
        current.merge(&fields);
        self.written
            .insert(id.to_string(), self.index.schema().indexed_fields(&current));
        Ok(())
    }
}
