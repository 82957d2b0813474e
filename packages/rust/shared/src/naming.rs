//! Derived-type naming scheme shared by closure computation and clearing.
//!
//! The upstream compiler generates a family of synthetic types per data
//! object; their names follow fixed suffix rules, and a handful of
//! cross-object types exist exactly once per schema.

/// Sentinel type for unresolvable type references.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Mandatory count field on aggregation types.
pub const ROWS_COUNT_FIELD: &str = "_rows_count";

/// Suffix of per-object filter input types.
pub const FILTER_SUFFIX: &str = "_filter_input";

/// Suffix of the list variant of a filter input type.
pub const LIST_FILTER_SUFFIX: &str = "_list_filter_input";

/// Suffix of per-object aggregation types.
pub const AGGREGATION_SUFFIX: &str = "_aggregation";

/// Cross-object query-time join type.
pub const JOIN_TYPE: &str = "_join";

/// Aggregation variant of [`JOIN_TYPE`].
pub const JOIN_AGGREGATION_TYPE: &str = "_join_aggregation";

/// Cross-object spatial query type.
pub const SPATIAL_TYPE: &str = "_spatial";

/// Aggregation variant of [`SPATIAL_TYPE`].
pub const SPATIAL_AGGREGATION_TYPE: &str = "_spatial_aggregation";

/// Cross-object H3 grid query type.
pub const H3_TYPE: &str = "_h3_data";

/// Dispatch field that marks a data object as spatial: a field with this name
/// whose target is [`SPATIAL_TYPE`].
pub const SPATIAL_FIELD: &str = "_spatial";

/// Derive the list-filter variant name from a filter type name.
///
/// `cities_filter_input` becomes `cities_list_filter_input`. A name without
/// the filter suffix gets the list suffix appended as-is.
pub fn list_filter_name(filter_type: &str) -> String {
    let base = filter_type.strip_suffix(FILTER_SUFFIX).unwrap_or(filter_type);
    format!("{base}{LIST_FILTER_SUFFIX}")
}

/// Namespace prefix a data source contributes to synthetic query fields:
/// `<prefix>_` when the source is mounted as its own module with a non-empty
/// prefix, empty otherwise.
pub fn data_source_prefix(as_module: bool, prefix: &str) -> String {
    if as_module && !prefix.is_empty() {
        format!("{prefix}_")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filter_from_filter() {
        assert_eq!(
            list_filter_name("cities_filter_input"),
            "cities_list_filter_input"
        );
    }

    #[test]
    fn list_filter_without_suffix() {
        assert_eq!(list_filter_name("odd_name"), "odd_name_list_filter_input");
    }

    #[test]
    fn prefix_rules() {
        assert_eq!(data_source_prefix(true, "osm"), "osm_");
        assert_eq!(data_source_prefix(true, ""), "");
        assert_eq!(data_source_prefix(false, "osm"), "");
    }

    #[test]
    fn join_aggregation_composes() {
        assert_eq!(
            format!("{JOIN_TYPE}{AGGREGATION_SUFFIX}"),
            JOIN_AGGREGATION_TYPE
        );
        assert_eq!(
            format!("{SPATIAL_TYPE}{AGGREGATION_SUFFIX}"),
            SPATIAL_AGGREGATION_TYPE
        );
    }
}
