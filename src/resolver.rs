//! Mapping between REST resource names and record kinds.
//!
//! The API names resources by plural, hyphen- or underscore-separated path
//! segments (`conversion-pixels`, `operating_systems`), while records are
//! tagged with a canonical [`ModelKind`] (`ConversionPixel`).

use std::str::FromStr;

use crate::error::AtomxError;
use crate::models::ModelKind;

/// Suffixes carried by filter-style attribute names (`sites_filter`).
const ATTRIBUTE_SUFFIXES: &[&str] = &["_filter", "_include", "_exclude"];

/// Resolve a resource name to the record kind it refers to.
///
/// Separators are folded into upper-camel case, then a plural ending is
/// removed (`ies` becomes `y`, otherwise one trailing `s` is dropped).
///
/// ```
/// use atomx::{resolve_model_name, ModelKind};
///
/// assert_eq!(resolve_model_name("countries"), Some(ModelKind::Country));
/// assert_eq!(resolve_model_name("ADVERTISERS"), Some(ModelKind::Advertiser));
/// assert_eq!(resolve_model_name("conversion-pixels"), Some(ModelKind::ConversionPixel));
/// assert_eq!(resolve_model_name("operating_system"), Some(ModelKind::OperatingSystem));
/// assert_eq!(resolve_model_name("InvalidModel"), None);
/// ```
pub fn resolve_model_name(name: &str) -> Option<ModelKind> {
    if let Some(kind) = ModelKind::from_name(name) {
        return Some(kind);
    }

    let camel: String = if name.contains('-') {
        name.split('-').map(capitalize).collect()
    } else if name.contains('_') {
        name.split('_').map(capitalize).collect()
    } else {
        capitalize(name)
    };

    let singular = match camel.strip_suffix("ies") {
        Some(stem) => format!("{stem}y"),
        None => camel.strip_suffix('s').unwrap_or(&camel).to_string(),
    };

    ModelKind::from_name(&singular)
}

/// Resolve an attribute name that may carry a filter suffix.
///
/// `sites_filter`, `sites_include` and `sites_exclude` all resolve like
/// `sites`.
pub fn resolve_attribute_model_name(attribute: &str) -> Option<ModelKind> {
    let stripped = ATTRIBUTE_SUFFIXES
        .iter()
        .find_map(|suffix| attribute.strip_suffix(suffix))
        .unwrap_or(attribute);
    resolve_model_name(stripped)
}

impl FromStr for ModelKind {
    type Err = AtomxError;

    /// Parse a resource name, failing with [`AtomxError::ModelNotFound`].
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        resolve_model_name(name).ok_or_else(|| AtomxError::ModelNotFound(name.to_string()))
    }
}

/// Uppercase the first character and lowercase the rest.
fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_and_separator_forms() {
        assert_eq!(resolve_model_name("countries"), Some(ModelKind::Country));
        assert_eq!(
            resolve_model_name("conversion-pixels"),
            Some(ModelKind::ConversionPixel)
        );
        assert_eq!(
            resolve_model_name("operating_system"),
            Some(ModelKind::OperatingSystem)
        );
        assert_eq!(resolve_model_name("creatives"), Some(ModelKind::Creative));
        assert_eq!(resolve_model_name("ADVERTISERS"), Some(ModelKind::Advertiser));
        assert_eq!(resolve_model_name("categories"), Some(ModelKind::Category));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(resolve_model_name("InvalidModel"), None);
        assert_eq!(resolve_model_name("history"), None);
        assert_eq!(resolve_model_name(""), None);
        assert_eq!(resolve_model_name("advertiser_id"), None);
    }

    #[test]
    fn test_only_one_trailing_s_is_stripped() {
        assert_eq!(resolve_model_name("sitess"), None);
    }

    #[test]
    fn test_every_resource_name_round_trips() {
        for kind in ModelKind::ALL {
            assert_eq!(resolve_model_name(kind.resource_name()), Some(*kind));
            assert_eq!(resolve_model_name(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn test_attribute_suffixes() {
        assert_eq!(
            resolve_attribute_model_name("sites_filter"),
            Some(ModelKind::Site)
        );
        assert_eq!(
            resolve_attribute_model_name("countries_include"),
            Some(ModelKind::Country)
        );
        assert_eq!(
            resolve_attribute_model_name("operating_systems_exclude"),
            Some(ModelKind::OperatingSystem)
        );
        assert_eq!(
            resolve_attribute_model_name("advertiser"),
            Some(ModelKind::Advertiser)
        );
        assert_eq!(resolve_attribute_model_name("name_filter_x"), None);
    }

    #[test]
    fn test_parse_unknown_is_model_not_found() {
        assert_eq!("sites".parse::<ModelKind>().ok(), Some(ModelKind::Site));

        let err = "widgets".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, AtomxError::ModelNotFound(name) if name == "widgets"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("pIXELS"), "Pixels");
        assert_eq!(capitalize(""), "");
    }
}
