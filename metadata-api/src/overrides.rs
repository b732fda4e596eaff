//! The `MetadataOverride` tree (§3) and the pure merge function that combines
//! it with the physical schema. Loaded once at startup from the layered
//! config and never mutated afterwards (§9 Design Notes).

use crate::schema::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeOverride {
    pub display_name: Option<String>,
    pub visible: Option<bool>,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub scale: Option<u32>,
    pub data_type: Option<DataType>,
    pub data_format: Option<String>,
    pub value_map: Option<HashMap<String, String>>,
    pub reference: Option<String>,
    pub display_priority: Option<u32>,
    pub display_order: Option<u32>,
    pub currency_symbol: Option<String>,
    pub currency_symbol_code: Option<u32>,
    #[serde(default)]
    pub cacheable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityOverride {
    pub display_name: Option<String>,
    pub visible: Option<bool>,
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkOverride {
    pub display_name: Option<String>,
    pub visible: Option<bool>,
    pub description: Option<String>,
    #[serde(default)]
    pub entities: HashMap<String, EntityOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformOverride {
    pub display_name: Option<String>,
    pub visible: Option<bool>,
    pub description: Option<String>,
    #[serde(default)]
    pub networks: HashMap<String, NetworkOverride>,
}

/// The whole override config: one entry per platform name.
pub type OverrideTree = HashMap<String, PlatformOverride>;

/// Title-cases an identifier for the default `displayName`: `token_transfers`
/// becomes `Token Transfers`.
pub fn title_case(identifier: &str) -> String {
    identifier
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A merged, display-ready node: override wins field-by-field, physical
/// (or a title-cased default) fills the rest. Pure function — no I/O, no
/// shared mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub display_name: String,
    pub visible: bool,
    pub description: Option<String>,
}

/// Merges one level of the tree. `parent_visible` carries the cascade:
/// `default_visible_if_unset` is `true` only for the platform root, per §3's
/// "true at platform level only if explicitly enabled" rule inverted — the
/// root still defaults to `false` unless set, same as every other level;
/// callers pass `false` uniformly and rely on `visible` being `Some(true)`
/// in config to opt a platform in.
pub fn merge_node(
    name: &str,
    override_display_name: Option<&str>,
    override_visible: Option<bool>,
    override_description: Option<&str>,
    parent_visible: bool,
) -> Merged {
    let own_visible = override_visible.unwrap_or(false);
    Merged {
        display_name: override_display_name
            .map(str::to_string)
            .unwrap_or_else(|| title_case(name)),
        visible: parent_visible && own_visible,
        description: override_description.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_splits_on_underscore_and_capitalizes_each_word() {
        assert_eq!(title_case("token_transfers"), "Token Transfers");
        assert_eq!(title_case("hash"), "Hash");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn merge_node_prefers_override_display_name_and_description() {
        let merged = merge_node("mainnet", Some("Tezos Mainnet"), Some(true), Some("primary net"), true);
        assert_eq!(merged.display_name, "Tezos Mainnet");
        assert_eq!(merged.description.as_deref(), Some("primary net"));
        assert!(merged.visible);
    }

    #[test]
    fn merge_node_falls_back_to_title_cased_name_without_override() {
        let merged = merge_node("token_transfers", None, Some(true), None, true);
        assert_eq!(merged.display_name, "Token Transfers");
    }

    #[test]
    fn merge_node_is_invisible_if_unset_even_when_parent_visible() {
        let merged = merge_node("blocks", None, None, None, true);
        assert!(!merged.visible);
    }

    #[test]
    fn merge_node_cascades_parent_invisibility() {
        let merged = merge_node("blocks", None, Some(true), None, false);
        assert!(!merged.visible);
    }

    proptest::proptest! {
        #[test]
        fn merge_node_visibility_never_exceeds_parent(
            own_visible in proptest::option::of(proptest::bool::ANY),
            parent_visible in proptest::bool::ANY,
        ) {
            let merged = merge_node("x", None, own_visible, None, parent_visible);
            proptest::prop_assert!(!merged.visible || parent_visible);
        }
    }
}
