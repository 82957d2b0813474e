//! Full-text search over the catalog.
//!
//! Queries run against the trigger-maintained `catalog_fts` index and join
//! back to the source tables for typed results. All of this is read-only and
//! works against a partially summarized catalog.

use libsql::params;

use schemascribe_shared::{DataSourceRow, ModuleRow, Result, SchemaScribeError, TypeRow};

use crate::merge::{row_to_data_source, row_to_module, row_to_type};
use crate::{Catalog, get_text};

/// One page of ranked results, with the total match count across all pages.
#[derive(Debug, Clone)]
pub struct SearchPage<T> {
    pub total: u64,
    pub items: Vec<T>,
}

/// A raw FTS hit before joining back to a source table.
#[derive(Debug, Clone)]
pub struct SearchItem {
    pub kind: String,
    pub name: String,
    pub score: f64,
}

fn storage_err(e: libsql::Error) -> SchemaScribeError {
    SchemaScribeError::Storage(e.to_string())
}

impl Catalog {
    /// Search the whole index, optionally restricted to one entity kind
    /// (`type`, `module` or `data_source`).
    pub async fn search(
        &self,
        query: &str,
        kind: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage<SearchItem>> {
        let total = match kind {
            Some(kind) => {
                self.count_matches(
                    "SELECT COUNT(*) FROM catalog_fts
                     WHERE catalog_fts MATCH ?1 AND kind = ?2",
                    params![query, kind],
                )
                .await?
            }
            None => {
                self.count_matches(
                    "SELECT COUNT(*) FROM catalog_fts WHERE catalog_fts MATCH ?1",
                    params![query],
                )
                .await?
            }
        };

        let mut rows = match kind {
            Some(kind) => {
                self.conn()
                    .query(
                        "SELECT kind, name, rank FROM catalog_fts
                         WHERE catalog_fts MATCH ?1 AND kind = ?2
                         ORDER BY rank
                         LIMIT ?3 OFFSET ?4",
                        params![query, kind, limit, offset],
                    )
                    .await
            }
            None => {
                self.conn()
                    .query(
                        "SELECT kind, name, rank FROM catalog_fts
                         WHERE catalog_fts MATCH ?1
                         ORDER BY rank
                         LIMIT ?2 OFFSET ?3",
                        params![query, limit, offset],
                    )
                    .await
            }
        }
        .map_err(storage_err)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(SearchItem {
                kind: get_text(&row, 0)?,
                name: get_text(&row, 1)?,
                score: row.get::<f64>(2).unwrap_or(0.0),
            });
        }
        Ok(SearchPage { total, items })
    }

    /// Search modules, joined back to full rows.
    pub async fn search_modules(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage<ModuleRow>> {
        let total = self
            .count_matches(
                "SELECT COUNT(*) FROM catalog_fts
                 WHERE catalog_fts MATCH ?1 AND kind = 'module'",
                params![query],
            )
            .await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT m.name, m.description, m.long_description, m.query_root,
                        m.mutation_root, m.function_root, m.mutation_function_root,
                        m.is_summarized, m.is_disabled
                 FROM catalog_fts fts
                 JOIN modules m ON m.name = fts.name
                 WHERE catalog_fts MATCH ?1 AND fts.kind = 'module'
                 ORDER BY rank
                 LIMIT ?2 OFFSET ?3",
                params![query, limit, offset],
            )
            .await
            .map_err(storage_err)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(row_to_module(&row)?);
        }
        Ok(SearchPage { total, items })
    }

    /// Search data sources, joined back to full rows.
    pub async fn search_data_sources(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage<DataSourceRow>> {
        let total = self
            .count_matches(
                "SELECT COUNT(*) FROM catalog_fts
                 WHERE catalog_fts MATCH ?1 AND kind = 'data_source'",
                params![query],
            )
            .await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT d.name, d.kind, d.prefix, d.description, d.long_description,
                        d.as_module, d.read_only, d.disabled, d.is_summarized
                 FROM catalog_fts fts
                 JOIN data_sources d ON d.name = fts.name
                 WHERE catalog_fts MATCH ?1 AND fts.kind = 'data_source'
                 ORDER BY rank
                 LIMIT ?2 OFFSET ?3",
                params![query, limit, offset],
            )
            .await
            .map_err(storage_err)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(row_to_data_source(&row)?);
        }
        Ok(SearchPage { total, items })
    }

    /// Search tables and views, joined back to full type rows.
    pub async fn search_data_objects(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SearchPage<TypeRow>> {
        let total = self
            .count_matches(
                "SELECT COUNT(*)
                 FROM catalog_fts fts
                 JOIN types t ON t.name = fts.name
                 WHERE catalog_fts MATCH ?1 AND fts.kind = 'type'
                   AND t.role IN ('table', 'view')",
                params![query],
            )
            .await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT t.name, t.kind, t.role, t.module, t.catalog, t.description,
                        t.long_description, t.is_summarized, t.updated_at
                 FROM catalog_fts fts
                 JOIN types t ON t.name = fts.name
                 WHERE catalog_fts MATCH ?1 AND fts.kind = 'type'
                   AND t.role IN ('table', 'view')
                 ORDER BY rank
                 LIMIT ?2 OFFSET ?3",
                params![query, limit, offset],
            )
            .await
            .map_err(storage_err)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(row_to_type(&row)?);
        }
        Ok(SearchPage { total, items })
    }

    async fn count_matches(&self, sql: &str, args: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn().query(sql, args).await.map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<u64>(0).unwrap_or(0)),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::merge::MergeMode;
    use crate::testutil::test_catalog;
    use schemascribe_shared::{NewDataSource, NewModule, NewType};

    async fn seed(catalog: &crate::Catalog) {
        let types = [
            ("osm_cities", "table", "Cities imported from OpenStreetMap"),
            ("osm_roads", "table", "Road network segments"),
            ("city_population", "view", "Population aggregated per city"),
            ("osm_cities_filter_input", "filter", "Filter for cities"),
        ];
        for (name, role, description) in types {
            catalog
                .merge_type(
                    &NewType {
                        name: name.into(),
                        kind: "OBJECT".into(),
                        role: role.into(),
                        module: "geo".into(),
                        catalog: "osm".into(),
                        description: Some(description.into()),
                        long_description: None,
                        summarized: None,
                    },
                    MergeMode::Insert,
                )
                .await
                .unwrap();
        }
        catalog
            .merge_module(
                &NewModule {
                    name: "geo".into(),
                    query_root: "GeoQuery".into(),
                    mutation_root: String::new(),
                    function_root: String::new(),
                    mutation_function_root: String::new(),
                    disabled: false,
                    description: Some("Geospatial data about cities and roads".into()),
                },
                MergeMode::Insert,
            )
            .await
            .unwrap();
        catalog
            .merge_data_source(
                &NewDataSource {
                    name: "osm".into(),
                    kind: "postgres".into(),
                    prefix: String::new(),
                    as_module: false,
                    read_only: true,
                    disabled: false,
                    description: Some("OpenStreetMap extract with cities".into()),
                },
                MergeMode::Insert,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn search_spans_all_kinds() {
        let catalog = test_catalog().await;
        seed(&catalog).await;

        let page = catalog.search("cities", None, 10, 0).await.unwrap();
        assert_eq!(page.total, page.items.len() as u64);
        let kinds: std::collections::BTreeSet<&str> =
            page.items.iter().map(|i| i.kind.as_str()).collect();
        assert!(kinds.contains("type"));
        assert!(kinds.contains("module"));
        assert!(kinds.contains("data_source"));
    }

    #[tokio::test]
    async fn kind_filter_narrows_results() {
        let catalog = test_catalog().await;
        seed(&catalog).await;

        let page = catalog.search("cities", Some("module"), 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "geo");
    }

    #[tokio::test]
    async fn data_object_search_excludes_derived_types() {
        let catalog = test_catalog().await;
        seed(&catalog).await;

        let page = catalog.search_data_objects("cities", 10, 0).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"osm_cities"));
        assert!(!names.contains(&"osm_cities_filter_input"));
    }

    #[tokio::test]
    async fn update_refreshes_index() {
        let catalog = test_catalog().await;
        seed(&catalog).await;

        catalog
            .update_type_description("osm_roads", "Curated highway inventory", "", true)
            .await
            .unwrap();

        let page = catalog.search_data_objects("highway", 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "osm_roads");

        let stale = catalog.search_data_objects("segments", 10, 0).await.unwrap();
        assert_eq!(stale.total, 0);
    }

    #[tokio::test]
    async fn pagination_limits_page_not_total() {
        let catalog = test_catalog().await;
        seed(&catalog).await;

        let page = catalog.search("osm", Some("type"), 1, 0).await.unwrap();
        assert!(page.total >= 2);
        assert_eq!(page.items.len(), 1);
    }
}
