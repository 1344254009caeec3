//! Lookup of all rows for one entity in a dataset or in the joined table.

use log::debug;
use polars::prelude::*;

use crate::error::{ForestPanelError, ForestPanelResult};
use crate::normalize::require_columns;
use crate::COL;

/// A read-only view over one table, queried by entity name.
///
/// The table is optional so that a view over a table that was never produced can be handed
/// out; every lookup on it then fails with [`ForestPanelError::NotLoaded`].
#[derive(Debug, Clone)]
pub struct EntityAccessor<'a> {
    table_name: String,
    table: Option<&'a DataFrame>,
    entity_column: String,
}

impl<'a> EntityAccessor<'a> {
    pub fn new(table_name: &str, table: Option<&'a DataFrame>) -> Self {
        Self {
            table_name: table_name.into(),
            table,
            entity_column: COL::ENTITY.into(),
        }
    }

    pub fn with_entity_column(mut self, entity_column: &str) -> Self {
        self.entity_column = entity_column.into();
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn table(&self) -> ForestPanelResult<&'a DataFrame> {
        let table = self
            .table
            .ok_or_else(|| ForestPanelError::NotLoaded(self.table_name.clone()))?;
        require_columns(&self.table_name, table, &[self.entity_column.as_str()])?;
        Ok(table)
    }

    /// Returns every row whose entity equals `entity`, in table order.
    pub fn get(&self, entity: &str) -> ForestPanelResult<DataFrame> {
        let table = self.table()?;
        let entities = table.column(&self.entity_column)?.cast(&DataType::String)?;
        let mask = entities.str()?.equal(entity);
        let rows = table.filter(&mask)?;
        debug!(
            "Found {} rows for '{entity}' in {}",
            rows.height(),
            self.table_name
        );
        if rows.height() == 0 {
            return Err(ForestPanelError::EntityNotFound {
                table: self.table_name.clone(),
                entity: entity.into(),
            });
        }
        Ok(rows)
    }

    /// Distinct non-null entity names, sorted.
    pub fn entities(&self) -> ForestPanelResult<Vec<String>> {
        let table = self.table()?;
        let entities = table.column(&self.entity_column)?.cast(&DataType::String)?;
        let mut names: Vec<String> = entities
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
