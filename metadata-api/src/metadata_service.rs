//! `MetadataService` (§4.9): merges the physical schema with the override
//! tree and enforces the visibility cascade for the discovery surface.

use crate::error::MetadataError;
use crate::overrides::{merge_node, OverrideTree};
use crate::schema::{self, DataType};
use serde::Serialize;

pub struct MetadataService {
    overrides: OverrideTree,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlatformView {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NetworkView {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntityView {
    pub name: String,
    pub display_name: String,
    pub count: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttributeView {
    pub name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub key_type: &'static str,
    pub cardinality: Option<bool>,
    pub entity: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub scale: Option<u32>,
    pub data_format: Option<String>,
    pub value_map: Option<std::collections::HashMap<String, String>>,
    pub reference: Option<String>,
    pub display_priority: Option<u32>,
    pub display_order: Option<u32>,
    pub currency_symbol: Option<String>,
    pub currency_symbol_code: Option<u32>,
}

impl MetadataService {
    pub fn new(overrides: OverrideTree) -> Self {
        Self { overrides }
    }

    fn platform_override(&self, platform: &str) -> crate::overrides::PlatformOverride {
        self.overrides.get(platform).cloned().unwrap_or_default()
    }

    pub fn list_platforms(&self) -> Vec<PlatformView> {
        schema::PLATFORMS
            .iter()
            .filter_map(|p| {
                let ov = self.platform_override(p.name);
                let merged = merge_node(p.name, ov.display_name.as_deref(), ov.visible, ov.description.as_deref(), true);
                merged.visible.then(|| PlatformView {
                    name: p.name.to_string(),
                    display_name: merged.display_name,
                    description: merged.description,
                })
            })
            .collect()
    }

    pub fn list_networks(&self, platform: &str) -> Result<Vec<NetworkView>, MetadataError> {
        if !self.platform_visible(platform)? {
            return Err(MetadataError::HiddenPath(platform.to_string()));
        }
        let schema = schema::platform(platform)
            .ok_or_else(|| MetadataError::UnknownPath(platform.to_string()))?;
        let ov = self.platform_override(platform);
        Ok(schema
            .networks
            .iter()
            .filter_map(|n| {
                let nov = ov.networks.get(n.name).cloned().unwrap_or_default();
                let merged = merge_node(n.name, nov.display_name.as_deref(), nov.visible, nov.description.as_deref(), true);
                merged.visible.then(|| NetworkView {
                    name: n.name.to_string(),
                    display_name: merged.display_name,
                    description: merged.description,
                })
            })
            .collect())
    }

    pub fn list_entities(&self, platform: &str, network: &str) -> Result<Vec<EntityView>, MetadataError> {
        if !self.network_visible(platform, network)? {
            return Err(MetadataError::HiddenPath(format!("{platform}/{network}")));
        }
        let schema = schema::platform(platform)
            .and_then(|p| p.network(network))
            .ok_or_else(|| MetadataError::UnknownPath(format!("{platform}/{network}")))?;
        let ov = self
            .platform_override(platform)
            .networks
            .get(network)
            .cloned()
            .unwrap_or_default();
        Ok(schema
            .entities
            .iter()
            .filter_map(|e| {
                let eov = ov.entities.get(e.name).cloned().unwrap_or_default();
                let merged = merge_node(e.name, eov.display_name.as_deref(), eov.visible, eov.description.as_deref(), true);
                merged.visible.then(|| EntityView {
                    name: e.name.to_string(),
                    display_name: merged.display_name,
                    count: 0,
                    description: merged.description,
                })
            })
            .collect())
    }

    pub fn list_attributes(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
    ) -> Result<Vec<AttributeView>, MetadataError> {
        if !self.entity_visible(platform, network, entity)? {
            return Err(MetadataError::HiddenPath(format!(
                "{platform}/{network}/{entity}"
            )));
        }
        let schema = schema::platform(platform)
            .and_then(|p| p.network(network))
            .and_then(|n| n.entity(entity))
            .ok_or_else(|| MetadataError::UnknownPath(format!("{platform}/{network}/{entity}")))?;
        let eov = self
            .platform_override(platform)
            .networks
            .get(network)
            .cloned()
            .unwrap_or_default()
            .entities
            .get(entity)
            .cloned()
            .unwrap_or_default();
        Ok(schema
            .attributes
            .iter()
            .filter_map(|a| {
                let aov = eov.attributes.get(a.name).cloned().unwrap_or_default();
                let merged = merge_node(a.name, aov.display_name.as_deref(), aov.visible, aov.description.as_deref(), true);
                merged.visible.then(|| AttributeView {
                    name: a.name.to_string(),
                    display_name: merged.display_name,
                    data_type: aov.data_type.unwrap_or(a.data_type),
                    key_type: if a.cardinality_safe { "UniqueKey" } else { "NonKey" },
                    cardinality: a.cardinality_safe.then_some(true),
                    entity: entity.to_string(),
                    description: merged.description,
                    placeholder: aov.placeholder,
                    scale: aov.scale,
                    data_format: aov.data_format,
                    value_map: aov.value_map,
                    reference: aov.reference,
                    display_priority: aov.display_priority,
                    display_order: aov.display_order,
                    currency_symbol: aov.currency_symbol,
                    currency_symbol_code: aov.currency_symbol_code,
                })
            })
            .collect())
    }

    /// Resolves one attribute for the query engine: returns the physical
    /// schema entry (never the override's presentation-only `dataType`), or
    /// `HiddenPath`/`UnknownPath` if the attribute isn't visible/doesn't exist.
    pub fn resolve_attribute_for_query(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
        attribute: &str,
    ) -> Result<schema::AttributeSchema, MetadataError> {
        let attrs = self.list_attributes(platform, network, entity)?;
        if !attrs.iter().any(|a| a.name == attribute) {
            let path = format!("{platform}/{network}/{entity}/{attribute}");
            let exists = schema::platform(platform)
                .and_then(|p| p.network(network))
                .and_then(|n| n.entity(entity))
                .and_then(|e| e.attribute(attribute))
                .is_some();
            return Err(if exists {
                MetadataError::HiddenPath(path)
            } else {
                MetadataError::UnknownPath(path)
            });
        }
        schema::platform(platform)
            .and_then(|p| p.network(network))
            .and_then(|n| n.entity(entity))
            .and_then(|e| e.attribute(attribute))
            .cloned()
            .ok_or_else(|| MetadataError::UnknownPath(attribute.to_string()))
    }

    fn platform_visible(&self, platform: &str) -> Result<bool, MetadataError> {
        let _ = schema::platform(platform)
            .ok_or_else(|| MetadataError::UnknownPath(platform.to_string()))?;
        let ov = self.platform_override(platform);
        Ok(merge_node(platform, None, ov.visible, None, true).visible)
    }

    fn network_visible(&self, platform: &str, network: &str) -> Result<bool, MetadataError> {
        let platform_visible = self.platform_visible(platform)?;
        let schema = schema::platform(platform)
            .and_then(|p| p.network(network))
            .ok_or_else(|| MetadataError::UnknownPath(format!("{platform}/{network}")))?;
        let nov = self
            .platform_override(platform)
            .networks
            .get(network)
            .cloned()
            .unwrap_or_default();
        Ok(merge_node(schema.name, None, nov.visible, None, platform_visible).visible)
    }

    fn entity_visible(&self, platform: &str, network: &str, entity: &str) -> Result<bool, MetadataError> {
        let network_visible = self.network_visible(platform, network)?;
        let schema = schema::platform(platform)
            .and_then(|p| p.network(network))
            .and_then(|n| n.entity(entity))
            .ok_or_else(|| MetadataError::UnknownPath(format!("{platform}/{network}/{entity}")))?;
        let eov = self
            .platform_override(platform)
            .networks
            .get(network)
            .cloned()
            .unwrap_or_default()
            .entities
            .get(entity)
            .cloned()
            .unwrap_or_default();
        Ok(merge_node(schema.name, None, eov.visible, None, network_visible).visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{EntityOverride, NetworkOverride, PlatformOverride};
    use std::collections::HashMap;

    fn tezos_visible_tree() -> OverrideTree {
        let mut tree = HashMap::new();
        tree.insert(
            "tezos".to_string(),
            PlatformOverride {
                visible: Some(true),
                ..Default::default()
            },
        );
        tree
    }

    #[test]
    fn invisible_platform_yields_empty_list() {
        let svc = MetadataService::new(HashMap::new());
        assert_eq!(svc.list_platforms(), vec![]);
    }

    #[test]
    fn visible_platform_appears_with_title_cased_default_name() {
        let svc = MetadataService::new(tezos_visible_tree());
        let platforms = svc.list_platforms();
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].name, "tezos");
        assert_eq!(platforms[0].display_name, "Tezos");
    }

    #[test]
    fn network_is_hidden_unless_the_platform_and_network_are_both_visible() {
        let mut tree = tezos_visible_tree();
        tree.get_mut("tezos").unwrap().networks.insert(
            "mainnet".to_string(),
            NetworkOverride {
                visible: Some(true),
                ..Default::default()
            },
        );
        let svc = MetadataService::new(tree);
        let networks = svc.list_networks("tezos").unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].name, "mainnet");

        let svc_no_platform = MetadataService::new(HashMap::new());
        assert!(svc_no_platform.list_networks("unknownchain").is_err());
    }

    #[test]
    fn entity_visible_only_when_entire_ancestor_chain_is_visible() {
        let mut tree = tezos_visible_tree();
        let platform = tree.get_mut("tezos").unwrap();
        platform.networks.insert(
            "mainnet".to_string(),
            NetworkOverride {
                visible: Some(true),
                entities: {
                    let mut m = HashMap::new();
                    m.insert(
                        "operations".to_string(),
                        EntityOverride {
                            visible: Some(true),
                            ..Default::default()
                        },
                    );
                    m
                },
                ..Default::default()
            },
        );
        let svc = MetadataService::new(tree);
        let entities = svc.list_entities("tezos", "mainnet").unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "operations");
    }

    #[test]
    fn list_attributes_errors_with_hidden_path_when_entity_itself_is_disabled() {
        let mut tree = tezos_visible_tree();
        let platform = tree.get_mut("tezos").unwrap();
        platform.networks.insert(
            "mainnet".to_string(),
            NetworkOverride {
                visible: Some(true),
                entities: {
                    let mut m = HashMap::new();
                    m.insert(
                        "operations".to_string(),
                        EntityOverride {
                            visible: Some(false),
                            ..Default::default()
                        },
                    );
                    m
                },
                ..Default::default()
            },
        );
        let svc = MetadataService::new(tree);
        assert!(matches!(
            svc.list_attributes("tezos", "mainnet", "operations"),
            Err(MetadataError::HiddenPath(_))
        ));
    }

    #[test]
    fn list_networks_errors_with_hidden_path_when_platform_itself_is_disabled() {
        let svc = MetadataService::new(HashMap::new());
        assert!(matches!(
            svc.list_networks("tezos"),
            Err(MetadataError::HiddenPath(_))
        ));
    }

    #[test]
    fn attribute_resolution_distinguishes_hidden_from_unknown() {
        let mut tree = tezos_visible_tree();
        let platform = tree.get_mut("tezos").unwrap();
        platform.networks.insert(
            "mainnet".to_string(),
            NetworkOverride {
                visible: Some(true),
                entities: {
                    let mut m = HashMap::new();
                    m.insert(
                        "blocks".to_string(),
                        EntityOverride {
                            visible: Some(true),
                            ..Default::default()
                        },
                    );
                    m
                },
                ..Default::default()
            },
        );
        let svc = MetadataService::new(tree);
        assert!(matches!(
            svc.resolve_attribute_for_query("tezos", "mainnet", "blocks", "level"),
            Err(MetadataError::HiddenPath(_))
        ));
        assert!(matches!(
            svc.resolve_attribute_for_query("tezos", "mainnet", "blocks", "does_not_exist"),
            Err(MetadataError::UnknownPath(_))
        ));
    }
}
