//! Maps a concrete request to a contract operation identifier.

use crate::contract::{Contract, Operation};
use std::sync::Arc;

/// Outcome of resolving a concrete path and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching operation declares this identifier
    Identified(String),
    /// An operation matches but declares no identifier; fall back to path lookup
    Anonymous,
    /// No operation matches; validation decides whether that is an error
    Unresolved,
}

impl Resolution {
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Resolution::Identified(id) => Some(id),
            _ => None,
        }
    }
}

/// First-match resolver over the contract's operations in declared order.
#[derive(Debug, Clone)]
pub struct OperationResolver {
    contract: Arc<Contract>,
}

impl OperationResolver {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self { contract }
    }

    /// The first operation in declared order matching `path` and `method`.
    ///
    /// Earlier declarations win even when a later pattern is more specific.
    pub fn find(&self, path: &str, method: &str) -> Option<&Operation> {
        self.contract.find(path, method)
    }

    pub fn resolve(&self, path: &str, method: &str) -> Resolution {
        match self.find(path, method) {
            Some(op) => match &op.operation_id {
                Some(id) => Resolution::Identified(id.clone()),
                None => Resolution::Anonymous,
            },
            None => Resolution::Unresolved,
        }
    }

    /// Shorthand for the identifier of the matching operation, if any.
    pub fn operation_id(&self, path: &str, method: &str) -> Option<String> {
        match self.resolve(path, method) {
            Resolution::Identified(id) => Some(id),
            _ => None,
        }
    }
}
