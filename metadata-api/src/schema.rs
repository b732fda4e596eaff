//! The static description of what the indexed store physically contains:
//! platforms, their networks, the entities (tables) each network exposes,
//! and the attributes (columns) on each entity. `MetadataService` merges
//! this against the override tree; the query engine validates against it
//! directly — the override's `dataType` is presentation only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    Int,
    String,
    Hash,
    Decimal,
    Boolean,
    DateTime,
    AccountAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub column: &'static str,
    pub data_type: DataType,
    /// Whether `attributeValues` may serve this column from the cache/LIKE
    /// fallback at all — high-cardinality columns (hashes, timestamps) are
    /// excluded.
    pub cardinality_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub table: &'static str,
    pub attributes: &'static [AttributeSchema],
}

impl EntitySchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSchema {
    pub name: &'static str,
    pub entities: &'static [EntitySchema],
}

impl NetworkSchema {
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSchema {
    pub name: &'static str,
    pub networks: &'static [NetworkSchema],
}

impl PlatformSchema {
    pub fn network(&self, name: &str) -> Option<&NetworkSchema> {
        self.networks.iter().find(|n| n.name == name)
    }
}

const TEZOS_BLOCKS: EntitySchema = EntitySchema {
    name: "blocks",
    table: "blocks",
    attributes: &[
        AttributeSchema { name: "hash", column: "hash", data_type: DataType::Hash, cardinality_safe: false },
        AttributeSchema { name: "level", column: "level", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "predecessor_hash", column: "predecessor_hash", data_type: DataType::Hash, cardinality_safe: false },
        AttributeSchema { name: "timestamp", column: "timestamp", data_type: DataType::DateTime, cardinality_safe: false },
        AttributeSchema { name: "protocol", column: "protocol", data_type: DataType::String, cardinality_safe: true },
        AttributeSchema { name: "baker", column: "baker", data_type: DataType::AccountAddress, cardinality_safe: true },
    ],
};

const TEZOS_ACCOUNTS: EntitySchema = EntitySchema {
    name: "accounts",
    table: "account_snapshots",
    attributes: &[
        AttributeSchema { name: "account_id", column: "account_id", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "block_level", column: "block_level", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "balance", column: "balance", data_type: DataType::Decimal, cardinality_safe: false },
        AttributeSchema { name: "delegate", column: "delegate", data_type: DataType::AccountAddress, cardinality_safe: true },
        AttributeSchema { name: "counter", column: "counter", data_type: DataType::Int, cardinality_safe: false },
    ],
};

const TEZOS_OPERATIONS: EntitySchema = EntitySchema {
    name: "operations",
    table: "transactions",
    attributes: &[
        AttributeSchema { name: "block_hash", column: "block_hash", data_type: DataType::Hash, cardinality_safe: false },
        AttributeSchema { name: "op_index", column: "op_index", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "source", column: "source", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "destination", column: "destination", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "fee", column: "fee", data_type: DataType::Decimal, cardinality_safe: false },
        AttributeSchema { name: "kind", column: "kind", data_type: DataType::String, cardinality_safe: true },
        AttributeSchema { name: "status", column: "status", data_type: DataType::String, cardinality_safe: true },
    ],
};

const TEZOS_RIGHTS: EntitySchema = EntitySchema {
    name: "rights",
    table: "rights",
    attributes: &[
        AttributeSchema { name: "level", column: "level", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "cycle", column: "cycle", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "delegate", column: "delegate", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "slot", column: "slot", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "kind", column: "kind", data_type: DataType::String, cardinality_safe: true },
        AttributeSchema { name: "estimated_time", column: "estimated_time", data_type: DataType::DateTime, cardinality_safe: false },
    ],
};

const TEZOS_TOKEN_TRANSFERS: EntitySchema = EntitySchema {
    name: "token_transfers",
    table: "token_transfers",
    attributes: &[
        AttributeSchema { name: "contract", column: "contract", data_type: DataType::AccountAddress, cardinality_safe: true },
        AttributeSchema { name: "from", column: "from_address", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "to", column: "to_address", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "amount", column: "amount", data_type: DataType::Decimal, cardinality_safe: false },
        AttributeSchema { name: "block_level", column: "block_level", data_type: DataType::Int, cardinality_safe: false },
    ],
};

const TEZOS_NETWORKS: &[NetworkSchema] = &[
    NetworkSchema {
        name: "mainnet",
        entities: &[
            TEZOS_BLOCKS,
            TEZOS_ACCOUNTS,
            TEZOS_OPERATIONS,
            TEZOS_RIGHTS,
            TEZOS_TOKEN_TRANSFERS,
        ],
    },
    NetworkSchema {
        name: "ghostnet",
        entities: &[TEZOS_BLOCKS, TEZOS_ACCOUNTS, TEZOS_OPERATIONS, TEZOS_RIGHTS],
    },
];

const ETH_BLOCKS: EntitySchema = EntitySchema {
    name: "blocks",
    table: "eth_blocks",
    attributes: &[
        AttributeSchema { name: "hash", column: "hash", data_type: DataType::Hash, cardinality_safe: false },
        AttributeSchema { name: "number", column: "number", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "parent_hash", column: "parent_hash", data_type: DataType::Hash, cardinality_safe: false },
        AttributeSchema { name: "timestamp", column: "timestamp", data_type: DataType::DateTime, cardinality_safe: false },
        AttributeSchema { name: "miner", column: "miner", data_type: DataType::AccountAddress, cardinality_safe: true },
    ],
};

const ETH_ACCOUNTS: EntitySchema = EntitySchema {
    name: "accounts",
    table: "eth_accounts",
    attributes: &[
        AttributeSchema { name: "account_id", column: "account_id", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "block_number", column: "block_number", data_type: DataType::Int, cardinality_safe: false },
        AttributeSchema { name: "balance", column: "balance", data_type: DataType::Decimal, cardinality_safe: false },
        AttributeSchema { name: "nonce", column: "nonce", data_type: DataType::Int, cardinality_safe: false },
    ],
};

const ETH_TOKEN_TRANSFERS: EntitySchema = EntitySchema {
    name: "token_transfers",
    table: "token_transfers",
    attributes: &[
        AttributeSchema { name: "contract", column: "contract", data_type: DataType::AccountAddress, cardinality_safe: true },
        AttributeSchema { name: "from", column: "from_address", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "to", column: "to_address", data_type: DataType::AccountAddress, cardinality_safe: false },
        AttributeSchema { name: "amount", column: "amount", data_type: DataType::Decimal, cardinality_safe: false },
        AttributeSchema { name: "block_level", column: "block_level", data_type: DataType::Int, cardinality_safe: false },
    ],
};

const ETH_NETWORKS: &[NetworkSchema] = &[NetworkSchema {
    name: "mainnet",
    entities: &[ETH_BLOCKS, ETH_ACCOUNTS, ETH_TOKEN_TRANSFERS],
}];

pub const PLATFORMS: &[PlatformSchema] = &[
    PlatformSchema { name: "tezos", networks: TEZOS_NETWORKS },
    PlatformSchema { name: "ethereum", networks: ETH_NETWORKS },
];

pub fn platform(name: &str) -> Option<&'static PlatformSchema> {
    PLATFORMS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tezos_mainnet_exposes_the_operations_entity() {
        let tezos = platform("tezos").unwrap();
        let mainnet = tezos.network("mainnet").unwrap();
        assert!(mainnet.entity("operations").is_some());
    }

    #[test]
    fn unknown_platform_is_none() {
        assert!(platform("solana").is_none());
    }

    #[test]
    fn attribute_lookup_finds_existing_column() {
        let tezos = platform("tezos").unwrap();
        let mainnet = tezos.network("mainnet").unwrap();
        let blocks = mainnet.entity("blocks").unwrap();
        assert_eq!(blocks.attribute("level").unwrap().column, "level");
        assert!(blocks.attribute("nonexistent").is_none());
    }
}
