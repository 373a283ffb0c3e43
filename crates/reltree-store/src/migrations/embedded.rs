//! SQL files compiled into the binary, in application order

use sha2::{Digest, Sha256};

pub(crate) struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

impl Migration {
    /// Hex SHA-256 of the SQL text, recorded in the ledger on apply
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.sql.as_bytes()))
    }
}

pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_model_versions",
        sql: include_str!("../../migrations/001_model_versions.sql"),
    },
    Migration {
        id: "002_tree_open_nodes",
        sql: include_str!("../../migrations/002_tree_open_nodes.sql"),
    },
];
