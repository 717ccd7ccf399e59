//! Request and response messages

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::OptiError;
use crate::txn::{Transaction, TxnOutcome};

/// A transaction as sent by clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,

    #[serde(default)]
    pub reads: Vec<String>,

    #[serde(default)]
    pub conditions: BTreeMap<String, Option<String>>,

    #[serde(default)]
    pub writes: BTreeMap<String, Option<String>>,
}

impl Request {
    pub fn into_transaction(self) -> Transaction {
        Transaction {
            id: self.id,
            reads: self.reads,
            conditions: into_bytes(self.conditions),
            writes: into_bytes(self.writes),
        }
    }

    pub fn from_transaction(txn: &Transaction) -> Self {
        Self {
            id: txn.id.clone(),
            reads: txn.reads.clone(),
            conditions: from_bytes(&txn.conditions),
            writes: from_bytes(&txn.writes),
        }
    }
}

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Values of the requested keys after the transaction resolved
    Result {
        id: String,
        result: BTreeMap<String, Option<String>>,
    },

    /// The transaction could not run
    Error {
        id: String,
        error: String,
        unavailable: bool,
    },
}

impl Response {
    pub fn from_outcome(id: String, outcome: &TxnOutcome) -> Self {
        let result = outcome
            .values
            .iter()
            .map(|(key, value)| (key.clone(), value.as_deref().map(lossy)))
            .collect();
        Response::Result { id, result }
    }

    pub fn error(id: String, error: &OptiError) -> Self {
        Response::Error {
            id,
            error: error.to_string(),
            unavailable: error.is_unavailable(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Response::Result { id, .. } | Response::Error { id, .. } => id,
        }
    }

    /// Reported value of `key`; `None` for absence, errors, or unread keys
    pub fn value(&self, key: &str) -> Option<&str> {
        match self {
            Response::Result { result, .. } => result.get(key).and_then(|v| v.as_deref()),
            Response::Error { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Response::Error { unavailable: true, .. })
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn into_bytes(map: BTreeMap<String, Option<String>>) -> BTreeMap<String, Option<Vec<u8>>> {
    map.into_iter()
        .map(|(key, value)| (key, value.map(String::into_bytes)))
        .collect()
}

fn from_bytes(map: &BTreeMap<String, Option<Vec<u8>>>) -> BTreeMap<String, Option<String>> {
    map.iter()
        .map(|(key, value)| (key.clone(), value.as_deref().map(lossy)))
        .collect()
}
