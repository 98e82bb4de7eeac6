//! Store-name resolution.

use crate::error::{Result, TrackingError};
use crate::types::NamingScheme;

/// Compute the store name for a target.
///
/// - `KeyOnly`: the key; a missing or empty key is an error.
/// - `TypeNameAndKey`: the type name, or `{type}_{key}` when a key is set.
///   Keyless instances of one type intentionally share a store.
pub fn resolve_store_name(
    scheme: NamingScheme,
    type_name: &str,
    key: Option<&str>,
) -> Result<String> {
    match scheme {
        NamingScheme::KeyOnly => match key {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(TrackingError::MissingKey(type_name.to_string())),
        },
        NamingScheme::TypeNameAndKey => Ok(match key {
            Some(key) => format!("{}_{}", type_name, key),
            None => type_name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_and_key() {
        assert_eq!(
            resolve_store_name(NamingScheme::TypeNameAndKey, "Widget", Some("1")).unwrap(),
            "Widget_1"
        );
        assert_eq!(
            resolve_store_name(NamingScheme::TypeNameAndKey, "Widget", None).unwrap(),
            "Widget"
        );
    }

    #[test]
    fn test_key_only() {
        assert_eq!(
            resolve_store_name(NamingScheme::KeyOnly, "Widget", Some("2")).unwrap(),
            "2"
        );
        for key in [None, Some("")] {
            assert!(matches!(
                resolve_store_name(NamingScheme::KeyOnly, "Widget", key),
                Err(TrackingError::MissingKey(t)) if t == "Widget"
            ));
        }
    }
}
