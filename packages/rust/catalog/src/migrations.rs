//! SQL migration definitions for the catalog database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// Highest schema version this build understands. A database reporting a newer
/// version was written by a newer build and is refused.
pub(crate) const LATEST_VERSION: u32 = 1;

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: types, fields, arguments, modules, data_sources, data_objects, FTS5",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Schema types mirrored from upstream
CREATE TABLE IF NOT EXISTS types (
    name             TEXT PRIMARY KEY,
    kind             TEXT NOT NULL DEFAULT '',
    role             TEXT NOT NULL DEFAULT '',
    module           TEXT NOT NULL DEFAULT '',
    catalog          TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    long_description TEXT NOT NULL DEFAULT '',
    is_summarized    INTEGER NOT NULL DEFAULT 0,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_types_role ON types(role);
CREATE INDEX IF NOT EXISTS idx_types_module ON types(module);
CREATE INDEX IF NOT EXISTS idx_types_catalog ON types(catalog);

-- Fields keyed by owning type
CREATE TABLE IF NOT EXISTS fields (
    type_name      TEXT NOT NULL,
    name           TEXT NOT NULL,
    target_type    TEXT NOT NULL DEFAULT '',
    role           TEXT NOT NULL DEFAULT '',
    catalog        TEXT NOT NULL DEFAULT '',
    description    TEXT NOT NULL DEFAULT '',
    is_list        INTEGER NOT NULL DEFAULT 0,
    is_non_null    INTEGER NOT NULL DEFAULT 0,
    is_primary_key INTEGER NOT NULL DEFAULT 0,
    is_indexed     INTEGER NOT NULL DEFAULT 0,
    is_excluded    INTEGER NOT NULL DEFAULT 0,
    is_summarized  INTEGER NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (type_name, name)
);

CREATE INDEX IF NOT EXISTS idx_fields_role ON fields(role);
CREATE INDEX IF NOT EXISTS idx_fields_target ON fields(target_type);
CREATE INDEX IF NOT EXISTS idx_fields_catalog ON fields(catalog);

-- Arguments keyed by owning type and field
CREATE TABLE IF NOT EXISTS arguments (
    type_name     TEXT NOT NULL,
    field_name    TEXT NOT NULL,
    name          TEXT NOT NULL,
    target_type   TEXT NOT NULL DEFAULT '',
    description   TEXT NOT NULL DEFAULT '',
    default_value TEXT NOT NULL DEFAULT '',
    is_list       INTEGER NOT NULL DEFAULT 0,
    is_non_null   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (type_name, field_name, name)
);

-- Module tree; the root module has the empty name
CREATE TABLE IF NOT EXISTS modules (
    name                   TEXT PRIMARY KEY,
    description            TEXT NOT NULL DEFAULT '',
    long_description       TEXT NOT NULL DEFAULT '',
    query_root             TEXT NOT NULL DEFAULT '',
    mutation_root          TEXT NOT NULL DEFAULT '',
    function_root          TEXT NOT NULL DEFAULT '',
    mutation_function_root TEXT NOT NULL DEFAULT '',
    is_summarized          INTEGER NOT NULL DEFAULT 0,
    is_disabled            INTEGER NOT NULL DEFAULT 0
);

-- Data sources
CREATE TABLE IF NOT EXISTS data_sources (
    name             TEXT PRIMARY KEY,
    kind             TEXT NOT NULL DEFAULT '',
    prefix           TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    long_description TEXT NOT NULL DEFAULT '',
    as_module        INTEGER NOT NULL DEFAULT 0,
    read_only        INTEGER NOT NULL DEFAULT 0,
    disabled         INTEGER NOT NULL DEFAULT 0,
    is_summarized    INTEGER NOT NULL DEFAULT 0
);

-- Data objects and their ordered query lists
CREATE TABLE IF NOT EXISTS data_objects (
    name        TEXT PRIMARY KEY,
    filter_type TEXT NOT NULL DEFAULT '',
    args_type   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS data_object_queries (
    object_name TEXT NOT NULL,
    name        TEXT NOT NULL,
    query_root  TEXT NOT NULL DEFAULT '',
    kind        TEXT NOT NULL DEFAULT '',
    position    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (object_name, name)
);

-- Full-text search over types, modules and data sources
CREATE VIRTUAL TABLE IF NOT EXISTS catalog_fts USING fts5(
    kind UNINDEXED,
    name,
    body
);

CREATE TRIGGER IF NOT EXISTS types_fts_insert AFTER INSERT ON types BEGIN
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('type', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS types_fts_update AFTER UPDATE ON types BEGIN
    DELETE FROM catalog_fts WHERE kind = 'type' AND name = old.name;
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('type', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS types_fts_delete AFTER DELETE ON types BEGIN
    DELETE FROM catalog_fts WHERE kind = 'type' AND name = old.name;
END;

CREATE TRIGGER IF NOT EXISTS modules_fts_insert AFTER INSERT ON modules BEGIN
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('module', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS modules_fts_update AFTER UPDATE ON modules BEGIN
    DELETE FROM catalog_fts WHERE kind = 'module' AND name = old.name;
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('module', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS modules_fts_delete AFTER DELETE ON modules BEGIN
    DELETE FROM catalog_fts WHERE kind = 'module' AND name = old.name;
END;

CREATE TRIGGER IF NOT EXISTS data_sources_fts_insert AFTER INSERT ON data_sources BEGIN
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('data_source', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS data_sources_fts_update AFTER UPDATE ON data_sources BEGIN
    DELETE FROM catalog_fts WHERE kind = 'data_source' AND name = old.name;
    INSERT INTO catalog_fts(kind, name, body)
    VALUES ('data_source', new.name, new.name || ' ' || new.description || ' ' || new.long_description);
END;

CREATE TRIGGER IF NOT EXISTS data_sources_fts_delete AFTER DELETE ON data_sources BEGIN
    DELETE FROM catalog_fts WHERE kind = 'data_source' AND name = old.name;
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
