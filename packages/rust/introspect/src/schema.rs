//! Wire model for the annotated introspection graph.
//!
//! The upstream service extends plain GraphQL introspection with catalog
//! annotations (`role`, `module`, `catalog`, `exclude`) on types and fields.
//! Absent and `null` values both decode to empty defaults so downstream code
//! can treat the empty string as "not set" everywhere.

use serde::{Deserialize, Deserializer};

use schemascribe_shared::naming::UNKNOWN_TYPE;

/// Introspection kind tags (`__TypeKind`).
pub mod type_kind {
    pub const SCALAR: &str = "SCALAR";
    pub const OBJECT: &str = "OBJECT";
    pub const INTERFACE: &str = "INTERFACE";
    pub const UNION: &str = "UNION";
    pub const ENUM: &str = "ENUM";
    pub const INPUT_OBJECT: &str = "INPUT_OBJECT";
    pub const LIST: &str = "LIST";
    pub const NON_NULL: &str = "NON_NULL";
}

/// Decode `null` as the default value, same as a missing key.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Schema graph
// ---------------------------------------------------------------------------

/// The full annotated schema graph as returned by introspection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaGraph {
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    /// Name of the root query type, when the schema declares one.
    #[serde(default, rename = "queryType")]
    pub query_type: Option<NamedType>,
    /// Name of the root mutation type, when the schema declares one.
    #[serde(default, rename = "mutationType")]
    pub mutation_type: Option<NamedType>,
    #[serde(default, deserialize_with = "null_default")]
    pub types: Vec<TypeIntro>,
}

impl SchemaGraph {
    /// Look up a type by exact name. Linear scan; the graph is walked far more
    /// often than it is searched, so no index is kept.
    pub fn type_by_name(&self, name: &str) -> Option<&TypeIntro> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Bare type-name reference used for the schema roots.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedType {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

/// One type in the annotated graph.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeIntro {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    /// Catalog role tag (`table`, `view`, `filter`, `module`, ...).
    #[serde(default, deserialize_with = "null_default")]
    pub role: String,
    /// Dot path of the owning module; empty for the root module.
    #[serde(default, deserialize_with = "null_default")]
    pub module: String,
    /// Name of the data source the type belongs to, when any.
    #[serde(default, deserialize_with = "null_default")]
    pub catalog: String,
    #[serde(default, rename = "enumValues", deserialize_with = "null_default")]
    pub enum_values: Vec<EnumValueIntro>,
    #[serde(default, rename = "inputFields", deserialize_with = "null_default")]
    pub input_fields: Vec<FieldIntro>,
    #[serde(default, deserialize_with = "null_default")]
    pub fields: Vec<FieldIntro>,
}

impl TypeIntro {
    /// The fields that land in the catalog: input objects contribute their
    /// input fields, every other kind its output fields.
    pub fn catalog_fields(&self) -> &[FieldIntro] {
        if self.kind == type_kind::INPUT_OBJECT {
            &self.input_fields
        } else {
            &self.fields
        }
    }
}

/// One field of a type. Input fields decode into the same shape; their
/// argument list is simply empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldIntro {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    /// Catalog role tag of the field (`field`, `join`, `query_data`, ...).
    #[serde(default, deserialize_with = "null_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_default")]
    pub catalog: String,
    /// Marked by upstream for fields that should be hidden from discovery.
    #[serde(default, deserialize_with = "null_default")]
    pub exclude: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub args: Vec<InputValueIntro>,
    #[serde(default, rename = "type")]
    pub type_ref: TypeRef,
}

/// One argument of a field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputValueIntro {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, rename = "defaultValue", deserialize_with = "null_default")]
    pub default_value: String,
    #[serde(default, rename = "type")]
    pub type_ref: TypeRef,
}

/// One value of an enum type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumValueIntro {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Type references
// ---------------------------------------------------------------------------

/// A possibly wrapped type reference (`NON_NULL` / `LIST` chains). The request
/// document unwraps four levels, which covers every shape upstream produces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeRef {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, rename = "ofType")]
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    /// Unwrap to the named type. A chain that bottoms out without a concrete
    /// name resolves to the [`UNKNOWN_TYPE`] sentinel.
    pub fn concrete_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        match &self.of_type {
            Some(inner) => inner.concrete_name(),
            None => UNKNOWN_TYPE,
        }
    }

    /// Whether any wrapper in the chain is a list.
    pub fn is_list(&self) -> bool {
        if self.kind == type_kind::LIST {
            return true;
        }
        match &self.of_type {
            Some(inner) if self.name.is_empty() => inner.is_list(),
            _ => false,
        }
    }

    /// Whether the outermost wrapper is non-null. Inner nullability is not
    /// tracked in the catalog.
    pub fn is_non_null(&self) -> bool {
        self.kind == type_kind::NON_NULL
    }
}

// ---------------------------------------------------------------------------
// Short type shape
// ---------------------------------------------------------------------------

/// Minimal shape of a single type, for cheap accessibility checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeShort {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_default")]
    pub catalog: String,
    #[serde(default, deserialize_with = "null_default")]
    pub fields: Vec<ShortField>,
    #[serde(default, rename = "inputFields", deserialize_with = "null_default")]
    pub input_fields: Vec<NamedItem>,
    #[serde(default, rename = "enumValues", deserialize_with = "null_default")]
    pub enum_values: Vec<NamedItem>,
}

/// Field name plus argument names, nothing else.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShortField {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub args: Vec<NamedItem>,
}

/// A bare named item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedItem {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}
