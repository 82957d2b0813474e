//! Entity merge operations.
//!
//! Every entity write goes through `merge_*`: a point lookup decides between
//! insert and update, and [`MergeMode`] decides whether an existing row is
//! skipped or patched. Patch updates structural attributes but overwrites
//! descriptions and the summarized flag only when the desired row supplies
//! them, so curated summarization output survives structure refreshes.

use chrono::Utc;
use libsql::params;

use schemascribe_shared::{
    ArgumentRow, DataObjectQueryRow, DataObjectRow, DataSourceRow, FieldRow, ModuleRow, NewArgument,
    NewDataObject, NewDataSource, NewField, NewModule, NewType, Result, SchemaScribeError, TypeRow,
};

use crate::{Catalog, get_bool, get_text, get_time};

/// How `merge_*` treats a row that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Keep the existing row untouched.
    Insert,
    /// Update structural attributes, merging descriptions.
    Patch,
}

/// What a `merge_*` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Skipped,
}

/// A row filter for batched deletes over `fields` and `arguments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerPredicate {
    /// Every row owned by the type.
    Type { type_name: String },
    /// A single named field (and its arguments) on the type.
    TypeField {
        type_name: String,
        field_name: String,
    },
}

impl OwnerPredicate {
    pub fn owner(type_name: impl Into<String>) -> Self {
        Self::Type {
            type_name: type_name.into(),
        }
    }

    pub fn field(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::TypeField {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

fn storage_err(e: libsql::Error) -> SchemaScribeError {
    SchemaScribeError::Storage(e.to_string())
}

impl Catalog {
    // -----------------------------------------------------------------------
    // Point lookups
    // -----------------------------------------------------------------------

    pub async fn get_type(&self, name: &str) -> Result<Option<TypeRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, role, module, catalog, description, long_description,
                        is_summarized, updated_at
                 FROM types WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_type(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_field(&self, type_name: &str, name: &str) -> Result<Option<FieldRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT type_name, name, target_type, role, catalog, description, is_list,
                        is_non_null, is_primary_key, is_indexed, is_excluded, is_summarized,
                        updated_at
                 FROM fields WHERE type_name = ?1 AND name = ?2",
                params![type_name, name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_field(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_argument(
        &self,
        type_name: &str,
        field_name: &str,
        name: &str,
    ) -> Result<Option<ArgumentRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT type_name, field_name, name, target_type, description, default_value,
                        is_list, is_non_null
                 FROM arguments WHERE type_name = ?1 AND field_name = ?2 AND name = ?3",
                params![type_name, field_name, name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_argument(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_module(&self, name: &str) -> Result<Option<ModuleRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, description, long_description, query_root, mutation_root,
                        function_root, mutation_function_root, is_summarized, is_disabled
                 FROM modules WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_module(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_data_source(&self, name: &str) -> Result<Option<DataSourceRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, prefix, description, long_description, as_module,
                        read_only, disabled, is_summarized
                 FROM data_sources WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_data_source(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_data_object(&self, name: &str) -> Result<Option<DataObjectRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, filter_type, args_type FROM data_objects WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };
        let mut object = DataObjectRow {
            name: get_text(&row, 0)?,
            filter_type: get_text(&row, 1)?,
            args_type: get_text(&row, 2)?,
            queries: Vec::new(),
        };

        let mut rows = self
            .conn()
            .query(
                "SELECT object_name, name, query_root, kind
                 FROM data_object_queries WHERE object_name = ?1
                 ORDER BY position",
                params![name],
            )
            .await
            .map_err(storage_err)?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            object.queries.push(DataObjectQueryRow {
                object_name: get_text(&row, 0)?,
                name: get_text(&row, 1)?,
                query_root: get_text(&row, 2)?,
                kind: get_text(&row, 3)?,
            });
        }
        Ok(Some(object))
    }

    // -----------------------------------------------------------------------
    // Merges
    // -----------------------------------------------------------------------

    pub async fn merge_type(&self, desired: &NewType, mode: MergeMode) -> Result<MergeOutcome> {
        self.check_writable()?;
        let Some(current) = self.get_type(&desired.name).await? else {
            self.conn()
                .execute(
                    "INSERT INTO types (name, kind, role, module, catalog, description,
                                        long_description, is_summarized, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        desired.name.as_str(),
                        desired.kind.as_str(),
                        desired.role.as_str(),
                        desired.module.as_str(),
                        desired.catalog.as_str(),
                        desired.description.clone().unwrap_or_default(),
                        desired.long_description.clone().unwrap_or_default(),
                        i64::from(desired.summarized.unwrap_or(false)),
                        Utc::now().to_rfc3339(),
                    ],
                )
                .await
                .map_err(storage_err)?;
            return Ok(MergeOutcome::Inserted);
        };

        if mode == MergeMode::Insert {
            return Ok(MergeOutcome::Skipped);
        }

        self.conn()
            .execute(
                "UPDATE types SET kind = ?1, role = ?2, module = ?3, catalog = ?4,
                        description = ?5, long_description = ?6, is_summarized = ?7,
                        updated_at = ?8
                 WHERE name = ?9",
                params![
                    desired.kind.as_str(),
                    desired.role.as_str(),
                    desired.module.as_str(),
                    desired.catalog.as_str(),
                    desired.description.clone().unwrap_or(current.description),
                    desired
                        .long_description
                        .clone()
                        .unwrap_or(current.long_description),
                    i64::from(desired.summarized.unwrap_or(current.is_summarized)),
                    Utc::now().to_rfc3339(),
                    desired.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(MergeOutcome::Updated)
    }

    pub async fn merge_field(&self, desired: &NewField, mode: MergeMode) -> Result<MergeOutcome> {
        self.check_writable()?;
        let Some(current) = self.get_field(&desired.type_name, &desired.name).await? else {
            self.conn()
                .execute(
                    "INSERT INTO fields (type_name, name, target_type, role, catalog, description,
                                         is_list, is_non_null, is_primary_key, is_indexed,
                                         is_excluded, is_summarized, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, ?9, 0, ?10)",
                    params![
                        desired.type_name.as_str(),
                        desired.name.as_str(),
                        desired.target_type.as_str(),
                        desired.role.as_str(),
                        desired.catalog.as_str(),
                        desired.description.clone().unwrap_or_default(),
                        i64::from(desired.is_list),
                        i64::from(desired.is_non_null),
                        i64::from(desired.is_excluded),
                        Utc::now().to_rfc3339(),
                    ],
                )
                .await
                .map_err(storage_err)?;
            return Ok(MergeOutcome::Inserted);
        };

        if mode == MergeMode::Insert {
            return Ok(MergeOutcome::Skipped);
        }

        self.conn()
            .execute(
                "UPDATE fields SET target_type = ?1, role = ?2, catalog = ?3, description = ?4,
                        is_list = ?5, is_non_null = ?6, is_excluded = ?7, updated_at = ?8
                 WHERE type_name = ?9 AND name = ?10",
                params![
                    desired.target_type.as_str(),
                    desired.role.as_str(),
                    desired.catalog.as_str(),
                    desired.description.clone().unwrap_or(current.description),
                    i64::from(desired.is_list),
                    i64::from(desired.is_non_null),
                    i64::from(desired.is_excluded),
                    Utc::now().to_rfc3339(),
                    desired.type_name.as_str(),
                    desired.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(MergeOutcome::Updated)
    }

    pub async fn merge_argument(
        &self,
        desired: &NewArgument,
        mode: MergeMode,
    ) -> Result<MergeOutcome> {
        self.check_writable()?;
        let Some(current) = self
            .get_argument(&desired.type_name, &desired.field_name, &desired.name)
            .await?
        else {
            self.conn()
                .execute(
                    "INSERT INTO arguments (type_name, field_name, name, target_type, description,
                                            default_value, is_list, is_non_null)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        desired.type_name.as_str(),
                        desired.field_name.as_str(),
                        desired.name.as_str(),
                        desired.target_type.as_str(),
                        desired.description.clone().unwrap_or_default(),
                        desired.default_value.as_str(),
                        i64::from(desired.is_list),
                        i64::from(desired.is_non_null),
                    ],
                )
                .await
                .map_err(storage_err)?;
            return Ok(MergeOutcome::Inserted);
        };

        if mode == MergeMode::Insert {
            return Ok(MergeOutcome::Skipped);
        }

        self.conn()
            .execute(
                "UPDATE arguments SET target_type = ?1, description = ?2, default_value = ?3,
                        is_list = ?4, is_non_null = ?5
                 WHERE type_name = ?6 AND field_name = ?7 AND name = ?8",
                params![
                    desired.target_type.as_str(),
                    desired.description.clone().unwrap_or(current.description),
                    desired.default_value.as_str(),
                    i64::from(desired.is_list),
                    i64::from(desired.is_non_null),
                    desired.type_name.as_str(),
                    desired.field_name.as_str(),
                    desired.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(MergeOutcome::Updated)
    }

    pub async fn merge_module(&self, desired: &NewModule, mode: MergeMode) -> Result<MergeOutcome> {
        self.check_writable()?;
        let Some(current) = self.get_module(&desired.name).await? else {
            self.conn()
                .execute(
                    "INSERT INTO modules (name, description, long_description, query_root,
                                          mutation_root, function_root, mutation_function_root,
                                          is_summarized, is_disabled)
                     VALUES (?1, ?2, '', ?3, ?4, ?5, ?6, 0, ?7)",
                    params![
                        desired.name.as_str(),
                        desired.description.clone().unwrap_or_default(),
                        desired.query_root.as_str(),
                        desired.mutation_root.as_str(),
                        desired.function_root.as_str(),
                        desired.mutation_function_root.as_str(),
                        i64::from(desired.disabled),
                    ],
                )
                .await
                .map_err(storage_err)?;
            return Ok(MergeOutcome::Inserted);
        };

        if mode == MergeMode::Insert {
            return Ok(MergeOutcome::Skipped);
        }

        self.conn()
            .execute(
                "UPDATE modules SET query_root = ?1, mutation_root = ?2, function_root = ?3,
                        mutation_function_root = ?4, is_disabled = ?5, description = ?6
                 WHERE name = ?7",
                params![
                    desired.query_root.as_str(),
                    desired.mutation_root.as_str(),
                    desired.function_root.as_str(),
                    desired.mutation_function_root.as_str(),
                    i64::from(desired.disabled),
                    desired.description.clone().unwrap_or(current.description),
                    desired.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(MergeOutcome::Updated)
    }

    pub async fn merge_data_source(
        &self,
        desired: &NewDataSource,
        mode: MergeMode,
    ) -> Result<MergeOutcome> {
        self.check_writable()?;
        let Some(current) = self.get_data_source(&desired.name).await? else {
            self.conn()
                .execute(
                    "INSERT INTO data_sources (name, kind, prefix, description, long_description,
                                               as_module, read_only, disabled, is_summarized)
                     VALUES (?1, ?2, ?3, ?4, '', ?5, ?6, ?7, 0)",
                    params![
                        desired.name.as_str(),
                        desired.kind.as_str(),
                        desired.prefix.as_str(),
                        desired.description.clone().unwrap_or_default(),
                        i64::from(desired.as_module),
                        i64::from(desired.read_only),
                        i64::from(desired.disabled),
                    ],
                )
                .await
                .map_err(storage_err)?;
            return Ok(MergeOutcome::Inserted);
        };

        if mode == MergeMode::Insert {
            return Ok(MergeOutcome::Skipped);
        }

        self.conn()
            .execute(
                "UPDATE data_sources SET kind = ?1, prefix = ?2, as_module = ?3, read_only = ?4,
                        disabled = ?5, description = ?6
                 WHERE name = ?7",
                params![
                    desired.kind.as_str(),
                    desired.prefix.as_str(),
                    i64::from(desired.as_module),
                    i64::from(desired.read_only),
                    i64::from(desired.disabled),
                    desired.description.clone().unwrap_or(current.description),
                    desired.name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(MergeOutcome::Updated)
    }

    /// Replace a data object row and its ordered query list wholesale.
    pub async fn replace_data_object(&self, desired: &NewDataObject) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "DELETE FROM data_object_queries WHERE object_name = ?1",
                params![desired.name.as_str()],
            )
            .await
            .map_err(storage_err)?;
        self.conn()
            .execute(
                "DELETE FROM data_objects WHERE name = ?1",
                params![desired.name.as_str()],
            )
            .await
            .map_err(storage_err)?;
        self.conn()
            .execute(
                "INSERT INTO data_objects (name, filter_type, args_type) VALUES (?1, ?2, ?3)",
                params![
                    desired.name.as_str(),
                    desired.filter_type.as_str(),
                    desired.args_type.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        for (position, query) in desired.queries.iter().enumerate() {
            self.conn()
                .execute(
                    "INSERT INTO data_object_queries (object_name, name, query_root, kind, position)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        desired.name.as_str(),
                        query.name.as_str(),
                        query.query_root.as_str(),
                        query.kind.as_str(),
                        position as i64,
                    ],
                )
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batched deletes
    // -----------------------------------------------------------------------

    /// Delete field rows matching any of the predicates. One round trip.
    pub async fn delete_fields_where(&self, predicates: &[OwnerPredicate]) -> Result<u64> {
        self.check_writable()?;
        if predicates.is_empty() {
            return Ok(0);
        }

        let mut clauses = Vec::with_capacity(predicates.len());
        let mut values: Vec<libsql::Value> = Vec::new();
        for predicate in predicates {
            match predicate {
                OwnerPredicate::Type { type_name } => {
                    clauses.push("(type_name = ?)");
                    values.push(type_name.clone().into());
                }
                OwnerPredicate::TypeField {
                    type_name,
                    field_name,
                } => {
                    clauses.push("(type_name = ? AND name = ?)");
                    values.push(type_name.clone().into());
                    values.push(field_name.clone().into());
                }
            }
        }

        let sql = format!("DELETE FROM fields WHERE {}", clauses.join(" OR "));
        self.conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(storage_err)
    }

    /// Delete argument rows matching any of the predicates. One round trip.
    pub async fn delete_arguments_where(&self, predicates: &[OwnerPredicate]) -> Result<u64> {
        self.check_writable()?;
        if predicates.is_empty() {
            return Ok(0);
        }

        let mut clauses = Vec::with_capacity(predicates.len());
        let mut values: Vec<libsql::Value> = Vec::new();
        for predicate in predicates {
            match predicate {
                OwnerPredicate::Type { type_name } => {
                    clauses.push("(type_name = ?)");
                    values.push(type_name.clone().into());
                }
                OwnerPredicate::TypeField {
                    type_name,
                    field_name,
                } => {
                    clauses.push("(type_name = ? AND field_name = ?)");
                    values.push(type_name.clone().into());
                    values.push(field_name.clone().into());
                }
            }
        }

        let sql = format!("DELETE FROM arguments WHERE {}", clauses.join(" OR "));
        self.conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(storage_err)
    }

}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) fn row_to_type(row: &libsql::Row) -> Result<TypeRow> {
    Ok(TypeRow {
        name: get_text(row, 0)?,
        kind: get_text(row, 1)?,
        role: get_text(row, 2)?,
        module: get_text(row, 3)?,
        catalog: get_text(row, 4)?,
        description: get_text(row, 5)?,
        long_description: get_text(row, 6)?,
        is_summarized: get_bool(row, 7)?,
        updated_at: get_time(row, 8)?,
    })
}

pub(crate) fn row_to_field(row: &libsql::Row) -> Result<FieldRow> {
    Ok(FieldRow {
        type_name: get_text(row, 0)?,
        name: get_text(row, 1)?,
        target_type: get_text(row, 2)?,
        role: get_text(row, 3)?,
        catalog: get_text(row, 4)?,
        description: get_text(row, 5)?,
        is_list: get_bool(row, 6)?,
        is_non_null: get_bool(row, 7)?,
        is_primary_key: get_bool(row, 8)?,
        is_indexed: get_bool(row, 9)?,
        is_excluded: get_bool(row, 10)?,
        is_summarized: get_bool(row, 11)?,
        updated_at: get_time(row, 12)?,
    })
}

pub(crate) fn row_to_argument(row: &libsql::Row) -> Result<ArgumentRow> {
    Ok(ArgumentRow {
        type_name: get_text(row, 0)?,
        field_name: get_text(row, 1)?,
        name: get_text(row, 2)?,
        target_type: get_text(row, 3)?,
        description: get_text(row, 4)?,
        default_value: get_text(row, 5)?,
        is_list: get_bool(row, 6)?,
        is_non_null: get_bool(row, 7)?,
    })
}

pub(crate) fn row_to_module(row: &libsql::Row) -> Result<ModuleRow> {
    Ok(ModuleRow {
        name: get_text(row, 0)?,
        description: get_text(row, 1)?,
        long_description: get_text(row, 2)?,
        query_root: get_text(row, 3)?,
        mutation_root: get_text(row, 4)?,
        function_root: get_text(row, 5)?,
        mutation_function_root: get_text(row, 6)?,
        is_summarized: get_bool(row, 7)?,
        is_disabled: get_bool(row, 8)?,
    })
}

pub(crate) fn row_to_data_source(row: &libsql::Row) -> Result<DataSourceRow> {
    Ok(DataSourceRow {
        name: get_text(row, 0)?,
        kind: get_text(row, 1)?,
        prefix: get_text(row, 2)?,
        description: get_text(row, 3)?,
        long_description: get_text(row, 4)?,
        as_module: get_bool(row, 5)?,
        read_only: get_bool(row, 6)?,
        disabled: get_bool(row, 7)?,
        is_summarized: get_bool(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_catalog;
    use schemascribe_shared::NewDataObjectQuery;

    fn city_type() -> NewType {
        NewType {
            name: "osm_cities".into(),
            kind: "OBJECT".into(),
            role: "table".into(),
            module: "geo.osm".into(),
            catalog: "osm".into(),
            description: Some("OSM cities".into()),
            long_description: None,
            summarized: None,
        }
    }

    #[tokio::test]
    async fn insert_then_skip_then_patch() {
        let catalog = test_catalog().await;

        let outcome = catalog
            .merge_type(&city_type(), MergeMode::Insert)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Inserted);

        let outcome = catalog
            .merge_type(&city_type(), MergeMode::Insert)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped);

        let mut changed = city_type();
        changed.role = "view".into();
        let outcome = catalog
            .merge_type(&changed, MergeMode::Patch)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Updated);

        let row = catalog.get_type("osm_cities").await.unwrap().unwrap();
        assert_eq!(row.role, "view");
    }

    #[tokio::test]
    async fn patch_preserves_summarized_description() {
        let catalog = test_catalog().await;
        catalog
            .merge_type(&city_type(), MergeMode::Insert)
            .await
            .unwrap();
        catalog
            .update_type_description("osm_cities", "Cities of the world", "Long text", true)
            .await
            .unwrap();

        // A structure refresh carries no description of its own.
        let mut refresh = city_type();
        refresh.description = None;
        refresh.long_description = None;
        refresh.summarized = None;
        catalog
            .merge_type(&refresh, MergeMode::Patch)
            .await
            .unwrap();

        let row = catalog.get_type("osm_cities").await.unwrap().unwrap();
        assert_eq!(row.description, "Cities of the world");
        assert_eq!(row.long_description, "Long text");
        assert!(row.is_summarized);
    }

    #[tokio::test]
    async fn field_patch_keeps_key_flags() {
        let catalog = test_catalog().await;
        let field = NewField {
            type_name: "osm_cities".into(),
            name: "id".into(),
            target_type: "BigInt".into(),
            role: "field".into(),
            catalog: "osm".into(),
            is_list: false,
            is_non_null: true,
            is_excluded: false,
            description: None,
        };
        catalog.merge_field(&field, MergeMode::Insert).await.unwrap();

        // Flip the stored flags directly, then patch.
        catalog
            .conn()
            .execute(
                "UPDATE fields SET is_primary_key = 1, is_indexed = 1
                 WHERE type_name = 'osm_cities' AND name = 'id'",
                params![],
            )
            .await
            .unwrap();
        catalog.merge_field(&field, MergeMode::Patch).await.unwrap();

        let row = catalog.get_field("osm_cities", "id").await.unwrap().unwrap();
        assert!(row.is_primary_key);
        assert!(row.is_indexed);
    }

    #[tokio::test]
    async fn argument_roundtrip() {
        let catalog = test_catalog().await;
        let arg = NewArgument {
            type_name: "Query".into(),
            field_name: "osm_cities".into(),
            name: "filter".into(),
            target_type: "osm_cities_filter_input".into(),
            default_value: "{}".into(),
            is_list: false,
            is_non_null: false,
            description: Some("Row filter".into()),
        };
        catalog
            .merge_argument(&arg, MergeMode::Insert)
            .await
            .unwrap();

        let row = catalog
            .get_argument("Query", "osm_cities", "filter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.target_type, "osm_cities_filter_input");
        assert_eq!(row.default_value, "{}");
    }

    #[tokio::test]
    async fn replace_data_object_preserves_query_order() {
        let catalog = test_catalog().await;
        let object = NewDataObject {
            name: "osm_cities".into(),
            filter_type: "osm_cities_filter_input".into(),
            args_type: String::new(),
            queries: vec![
                NewDataObjectQuery {
                    name: "osm_cities".into(),
                    kind: "select".into(),
                    query_root: "GeoOsmQuery".into(),
                },
                NewDataObjectQuery {
                    name: "osm_cities_by_pk".into(),
                    kind: "select_one".into(),
                    query_root: "GeoOsmQuery".into(),
                },
                NewDataObjectQuery {
                    name: "osm_cities_aggregation".into(),
                    kind: "aggregation".into(),
                    query_root: "GeoOsmQuery".into(),
                },
            ],
        };
        catalog.replace_data_object(&object).await.unwrap();
        // Replacing again must not duplicate or reorder.
        catalog.replace_data_object(&object).await.unwrap();

        let row = catalog.get_data_object("osm_cities").await.unwrap().unwrap();
        let names: Vec<&str> = row.queries.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["osm_cities", "osm_cities_by_pk", "osm_cities_aggregation"]
        );
    }

    #[tokio::test]
    async fn predicate_deletes_span_owners_and_fields() {
        let catalog = test_catalog().await;
        for (type_name, name) in [
            ("osm_cities", "id"),
            ("osm_cities", "name"),
            ("Query", "osm_cities"),
            ("Query", "osm_roads"),
        ] {
            let field = NewField {
                type_name: type_name.into(),
                name: name.into(),
                target_type: "String".into(),
                role: "field".into(),
                catalog: String::new(),
                is_list: false,
                is_non_null: false,
                is_excluded: false,
                description: None,
            };
            catalog.merge_field(&field, MergeMode::Insert).await.unwrap();
        }

        let deleted = catalog
            .delete_fields_where(&[
                OwnerPredicate::owner("osm_cities"),
                OwnerPredicate::field("Query", "osm_cities"),
            ])
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(catalog.get_field("Query", "osm_roads").await.unwrap().is_some());
        assert!(catalog.get_field("Query", "osm_cities").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_predicates_delete_nothing() {
        let catalog = test_catalog().await;
        assert_eq!(catalog.delete_fields_where(&[]).await.unwrap(), 0);
        assert_eq!(catalog.delete_arguments_where(&[]).await.unwrap(), 0);
    }
}
