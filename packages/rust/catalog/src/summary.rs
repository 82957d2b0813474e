//! Summarization support queries.
//!
//! Narrow description write-backs plus the pending-set and gather queries the
//! summarization phases run against the catalog. Write-backs overwrite
//! unconditionally: the summarizer owns these columns once it runs.

use chrono::Utc;
use libsql::params;

use schemascribe_shared::{
    ArgumentRow, DataSourceRow, FieldRow, ModuleRow, Result, SchemaScribeError, TypeRow,
};

use crate::merge::{row_to_argument, row_to_data_source, row_to_field, row_to_module, row_to_type};
use crate::{Catalog, get_text};

/// A function-valued field owned by a module root, as gathered per data source.
#[derive(Debug, Clone)]
pub struct FunctionFieldBrief {
    pub module: String,
    pub name: String,
    pub description: String,
}

fn storage_err(e: libsql::Error) -> SchemaScribeError {
    SchemaScribeError::Storage(e.to_string())
}

impl Catalog {
    // -----------------------------------------------------------------------
    // Description write-backs
    // -----------------------------------------------------------------------

    pub async fn update_type_description(
        &self,
        name: &str,
        description: &str,
        long_description: &str,
        summarized: bool,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "UPDATE types SET description = ?1, long_description = ?2, is_summarized = ?3,
                        updated_at = ?4
                 WHERE name = ?5",
                params![
                    description,
                    long_description,
                    i64::from(summarized),
                    Utc::now().to_rfc3339(),
                    name
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_field_description(
        &self,
        type_name: &str,
        field_name: &str,
        description: &str,
        summarized: bool,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "UPDATE fields SET description = ?1, is_summarized = ?2, updated_at = ?3
                 WHERE type_name = ?4 AND name = ?5",
                params![
                    description,
                    i64::from(summarized),
                    Utc::now().to_rfc3339(),
                    type_name,
                    field_name
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_argument_description(
        &self,
        type_name: &str,
        field_name: &str,
        arg_name: &str,
        description: &str,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "UPDATE arguments SET description = ?1
                 WHERE type_name = ?2 AND field_name = ?3 AND name = ?4",
                params![description, type_name, field_name, arg_name],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_module_description(
        &self,
        name: &str,
        description: &str,
        long_description: &str,
        summarized: bool,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "UPDATE modules SET description = ?1, long_description = ?2, is_summarized = ?3
                 WHERE name = ?4",
                params![description, long_description, i64::from(summarized), name],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn update_data_source_description(
        &self,
        name: &str,
        description: &str,
        long_description: &str,
        summarized: bool,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn()
            .execute(
                "UPDATE data_sources SET description = ?1, long_description = ?2,
                        is_summarized = ?3
                 WHERE name = ?4",
                params![description, long_description, i64::from(summarized), name],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pending sets
    // -----------------------------------------------------------------------

    /// Tables and views that still need object summaries.
    pub async fn types_pending_summary(&self) -> Result<Vec<TypeRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, role, module, catalog, description, long_description,
                        is_summarized, updated_at
                 FROM types
                 WHERE role IN ('table', 'view') AND is_summarized = 0
                 ORDER BY module, name",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_type(&row)?);
        }
        Ok(out)
    }

    /// Function fields on module roots that still need summaries.
    pub async fn function_fields_pending(&self) -> Result<Vec<FieldRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT f.type_name, f.name, f.target_type, f.role, f.catalog, f.description,
                        f.is_list, f.is_non_null, f.is_primary_key, f.is_indexed, f.is_excluded,
                        f.is_summarized, f.updated_at
                 FROM fields f
                 JOIN types t ON t.name = f.type_name
                 WHERE f.is_summarized = 0
                   AND f.role IN ('function', 'mutation_function')
                   AND t.role = 'module'
                 ORDER BY f.type_name, f.name",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_field(&row)?);
        }
        Ok(out)
    }

    pub async fn data_sources_pending(&self) -> Result<Vec<DataSourceRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, prefix, description, long_description, as_module,
                        read_only, disabled, is_summarized
                 FROM data_sources
                 WHERE is_summarized = 0
                 ORDER BY name",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_data_source(&row)?);
        }
        Ok(out)
    }

    pub async fn modules_pending(&self) -> Result<Vec<ModuleRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, description, long_description, query_root, mutation_root,
                        function_root, mutation_function_root, is_summarized, is_disabled
                 FROM modules
                 WHERE is_summarized = 0
                 ORDER BY name",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_module(&row)?);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Gathers
    // -----------------------------------------------------------------------

    /// Find the module owning a root type, matched against all four roots.
    pub async fn module_by_root_type(&self, type_name: &str) -> Result<Option<ModuleRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, description, long_description, query_root, mutation_root,
                        function_root, mutation_function_root, is_summarized, is_disabled
                 FROM modules
                 WHERE query_root = ?1 OR mutation_root = ?2
                    OR function_root = ?3 OR mutation_function_root = ?4
                 LIMIT 1",
                params![type_name, type_name, type_name, type_name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_module(&row)?)),
            None => Ok(None),
        }
    }

    /// Types of one role within a module, ordered by name.
    pub async fn module_types_by_role(&self, module: &str, role: &str) -> Result<Vec<TypeRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, role, module, catalog, description, long_description,
                        is_summarized, updated_at
                 FROM types
                 WHERE module = ?1 AND role = ?2
                 ORDER BY name",
                params![module, role],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_type(&row)?);
        }
        Ok(out)
    }

    /// Fields of one role across a module's root types. Empty root names are
    /// ignored; callers deduplicate by field name.
    pub async fn module_root_fields(&self, roots: &[String], role: &str) -> Result<Vec<FieldRow>> {
        let roots: Vec<&String> = roots.iter().filter(|r| !r.is_empty()).collect();
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; roots.len()].join(", ");
        let sql = format!(
            "SELECT type_name, name, target_type, role, catalog, description, is_list,
                    is_non_null, is_primary_key, is_indexed, is_excluded, is_summarized,
                    updated_at
             FROM fields
             WHERE type_name IN ({placeholders}) AND role = ?
             ORDER BY name"
        );
        let mut values: Vec<libsql::Value> = roots.iter().map(|r| (*r).clone().into()).collect();
        values.push(role.into());

        let mut rows = self
            .conn()
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_field(&row)?);
        }
        Ok(out)
    }

    pub async fn data_sources_by_names(&self, names: &[String]) -> Result<Vec<DataSourceRow>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "SELECT name, kind, prefix, description, long_description, as_module,
                    read_only, disabled, is_summarized
             FROM data_sources
             WHERE name IN ({placeholders})
             ORDER BY name"
        );
        let values: Vec<libsql::Value> = names.iter().map(|n| n.clone().into()).collect();

        let mut rows = self
            .conn()
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_data_source(&row)?);
        }
        Ok(out)
    }

    /// Types of one role that a data source contributed.
    pub async fn data_source_types(&self, catalog: &str, role: &str) -> Result<Vec<TypeRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, kind, role, module, catalog, description, long_description,
                        is_summarized, updated_at
                 FROM types
                 WHERE catalog = ?1 AND role = ?2
                 ORDER BY name",
                params![catalog, role],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_type(&row)?);
        }
        Ok(out)
    }

    /// Function fields a data source contributed, with their owning module.
    pub async fn data_source_function_fields(
        &self,
        catalog: &str,
    ) -> Result<Vec<FunctionFieldBrief>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT DISTINCT t.module, f.name, f.description
                 FROM fields f
                 JOIN types t ON t.name = f.type_name
                 WHERE f.catalog = ?1
                   AND f.role IN ('function', 'mutation_function')
                   AND t.role = 'module'
                 ORDER BY t.module, f.name",
                params![catalog],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(FunctionFieldBrief {
                module: get_text(&row, 0)?,
                name: get_text(&row, 1)?,
                description: get_text(&row, 2)?,
            });
        }
        Ok(out)
    }

    /// Modules owning any type or field contributed by a data source.
    pub async fn data_source_modules(&self, catalog: &str) -> Result<Vec<ModuleRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, description, long_description, query_root, mutation_root,
                        function_root, mutation_function_root, is_summarized, is_disabled
                 FROM modules
                 WHERE name IN (SELECT module FROM types WHERE catalog = ?1)
                    OR name IN (SELECT t.module
                                FROM fields f
                                JOIN types t ON t.name = f.type_name
                                WHERE f.catalog = ?2)
                 ORDER BY name",
                params![catalog, catalog],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_module(&row)?);
        }
        Ok(out)
    }

    /// All fields of one type, ordered by name.
    pub async fn fields_of_type(&self, type_name: &str) -> Result<Vec<FieldRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT type_name, name, target_type, role, catalog, description, is_list,
                        is_non_null, is_primary_key, is_indexed, is_excluded, is_summarized,
                        updated_at
                 FROM fields
                 WHERE type_name = ?1
                 ORDER BY name",
                params![type_name],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_field(&row)?);
        }
        Ok(out)
    }

    /// All arguments of one field, ordered by name.
    pub async fn arguments_of_field(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Result<Vec<ArgumentRow>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT type_name, field_name, name, target_type, description, default_value,
                        is_list, is_non_null
                 FROM arguments
                 WHERE type_name = ?1 AND field_name = ?2
                 ORDER BY name",
                params![type_name, field_name],
            )
            .await
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            out.push(row_to_argument(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::merge::MergeMode;
    use crate::testutil::test_catalog;
    use schemascribe_shared::{NewField, NewModule, NewType};

    fn new_type(name: &str, role: &str, module: &str, catalog: &str) -> NewType {
        NewType {
            name: name.into(),
            kind: "OBJECT".into(),
            role: role.into(),
            module: module.into(),
            catalog: catalog.into(),
            description: None,
            long_description: None,
            summarized: None,
        }
    }

    fn new_field(type_name: &str, name: &str, role: &str, catalog: &str) -> NewField {
        NewField {
            type_name: type_name.into(),
            name: name.into(),
            target_type: "String".into(),
            role: role.into(),
            catalog: catalog.into(),
            is_list: false,
            is_non_null: false,
            is_excluded: false,
            description: None,
        }
    }

    #[tokio::test]
    async fn pending_types_ordered_and_filtered() {
        let catalog = test_catalog().await;
        for t in [
            new_type("osm_roads", "table", "geo.osm", "osm"),
            new_type("admin_units", "view", "geo", "geo"),
            new_type("osm_cities", "table", "geo.osm", "osm"),
            new_type("osm_cities_filter_input", "filter", "geo.osm", "osm"),
        ] {
            catalog.merge_type(&t, MergeMode::Insert).await.unwrap();
        }
        catalog
            .update_type_description("osm_roads", "done", "", true)
            .await
            .unwrap();

        let pending = catalog.types_pending_summary().await.unwrap();
        let names: Vec<&str> = pending.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["admin_units", "osm_cities"]);
    }

    #[tokio::test]
    async fn function_fields_pending_requires_module_owner() {
        let catalog = test_catalog().await;
        catalog
            .merge_type(
                &new_type("GeoFunction", "module", "geo", ""),
                MergeMode::Insert,
            )
            .await
            .unwrap();
        catalog
            .merge_type(&new_type("osm_cities", "table", "geo", "osm"), MergeMode::Insert)
            .await
            .unwrap();
        catalog
            .merge_field(
                &new_field("GeoFunction", "distance", "function", "osm"),
                MergeMode::Insert,
            )
            .await
            .unwrap();
        catalog
            .merge_field(
                &new_field("osm_cities", "area", "function", "osm"),
                MergeMode::Insert,
            )
            .await
            .unwrap();

        let pending = catalog.function_fields_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].type_name, "GeoFunction");
        assert_eq!(pending[0].name, "distance");

        catalog
            .update_field_description("GeoFunction", "distance", "Haversine distance", true)
            .await
            .unwrap();
        assert!(catalog.function_fields_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn description_writes_overwrite_unconditionally() {
        let catalog = test_catalog().await;
        let mut t = new_type("osm_cities", "table", "geo", "osm");
        t.description = Some("original".into());
        t.long_description = Some("original long".into());
        catalog.merge_type(&t, MergeMode::Insert).await.unwrap();

        catalog
            .update_type_description("osm_cities", "", "", true)
            .await
            .unwrap();
        let row = catalog.get_type("osm_cities").await.unwrap().unwrap();
        assert_eq!(row.description, "");
        assert_eq!(row.long_description, "");
        assert!(row.is_summarized);
    }

    #[tokio::test]
    async fn module_found_by_any_root() {
        let catalog = test_catalog().await;
        let module = NewModule {
            name: "geo.osm".into(),
            query_root: "GeoOsmQuery".into(),
            mutation_root: "GeoOsmMutation".into(),
            function_root: "GeoOsmFunction".into(),
            mutation_function_root: String::new(),
            disabled: false,
            description: None,
        };
        catalog.merge_module(&module, MergeMode::Insert).await.unwrap();

        for root in ["GeoOsmQuery", "GeoOsmMutation", "GeoOsmFunction"] {
            let found = catalog.module_by_root_type(root).await.unwrap();
            assert_eq!(found.unwrap().name, "geo.osm");
        }
        assert!(catalog.module_by_root_type("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn data_source_gathers() {
        let catalog = test_catalog().await;
        let module = NewModule {
            name: "geo".into(),
            query_root: "GeoQuery".into(),
            mutation_root: String::new(),
            function_root: "GeoFunction".into(),
            mutation_function_root: String::new(),
            disabled: false,
            description: None,
        };
        catalog.merge_module(&module, MergeMode::Insert).await.unwrap();
        catalog
            .merge_type(&new_type("GeoFunction", "module", "geo", ""), MergeMode::Insert)
            .await
            .unwrap();
        catalog
            .merge_type(&new_type("osm_cities", "table", "geo", "osm"), MergeMode::Insert)
            .await
            .unwrap();
        catalog
            .merge_type(&new_type("city_stats", "view", "geo", "osm"), MergeMode::Insert)
            .await
            .unwrap();
        catalog
            .merge_field(
                &new_field("GeoFunction", "distance", "function", "osm"),
                MergeMode::Insert,
            )
            .await
            .unwrap();

        let tables = catalog.data_source_types("osm", "table").await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "osm_cities");

        let views = catalog.data_source_types("osm", "view").await.unwrap();
        assert_eq!(views.len(), 1);

        let functions = catalog.data_source_function_fields("osm").await.unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].module, "geo");
        assert_eq!(functions[0].name, "distance");

        let modules = catalog.data_source_modules("osm").await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "geo");
    }

    #[tokio::test]
    async fn module_root_fields_skips_empty_roots() {
        let catalog = test_catalog().await;
        catalog
            .merge_field(
                &new_field("GeoQuery", "osm", "submodule", ""),
                MergeMode::Insert,
            )
            .await
            .unwrap();
        catalog
            .merge_field(
                &new_field("GeoQuery", "admin_units", "query_data", "geo"),
                MergeMode::Insert,
            )
            .await
            .unwrap();

        let roots = vec!["GeoQuery".to_string(), String::new()];
        let subs = catalog.module_root_fields(&roots, "submodule").await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name, "osm");

        let none = catalog.module_root_fields(&[String::new()], "submodule").await;
        assert!(none.unwrap().is_empty());
    }
}
