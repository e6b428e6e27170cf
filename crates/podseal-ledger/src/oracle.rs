//! The ledger oracle trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use podseal_core::{Address, ObjectId};

use crate::error::Result;
use crate::policy::DenialReason;
use crate::transaction::TransactionKind;

/// Identity of a ledger client.
///
/// The threshold engine registry rebuilds its engine when this changes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerId(String);

impl LedgerId {
    /// Create a ledger id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerId({})", self.0)
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a read-only simulation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InspectResult {
    /// Whether the call would succeed.
    pub success: bool,
    /// Values returned by the call, one entry per return value.
    pub return_values: Vec<Vec<u8>>,
    /// Raw error reported by the ledger when `success` is false.
    pub error: Option<String>,
}

impl InspectResult {
    /// A successful result with the given return values.
    pub fn ok(return_values: Vec<Vec<u8>>) -> Self {
        Self {
            success: true,
            return_values,
            error: None,
        }
    }

    /// A failed result with a raw error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            return_values: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// The typed denial reason, if the call failed.
    pub fn denial(&self) -> Option<DenialReason> {
        if self.success {
            return None;
        }
        Some(DenialReason::from_raw(self.error.as_deref().unwrap_or("")))
    }

    /// The typed denial reason, trusting numeric abort codes only from
    /// `policy_program`.
    pub fn denial_for(&self, policy_program: &ObjectId) -> Option<DenialReason> {
        if self.success {
            return None;
        }
        Some(DenialReason::from_raw_for(
            self.error.as_deref().unwrap_or(""),
            policy_program,
        ))
    }
}

/// Read-only access to ledger state.
///
/// Implementations must never commit anything: `dev_inspect` runs the call
/// against current state and reports what would happen.
#[async_trait]
pub trait LedgerOracle: Send + Sync {
    /// Identity of this ledger client.
    fn ledger_id(&self) -> LedgerId;

    /// Simulate `kind` as if sent by `sender`.
    async fn dev_inspect(&self, sender: &Address, kind: &TransactionKind) -> Result<InspectResult>;
}
