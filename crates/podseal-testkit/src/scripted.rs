//! A ledger oracle with canned answers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use podseal_core::Address;
use podseal_ledger::{
    InspectResult, LedgerId, LedgerOracle, Result, TransactionKind, LOOKUP_FUNCTION,
};

/// Answers approval simulations with one scripted result and lookups with
/// another. Lookups are unsupported unless scripted.
///
/// A follow-up result, when set, answers every approval after the first.
pub struct ScriptedLedger {
    id: LedgerId,
    approval: RwLock<InspectResult>,
    follow_up: RwLock<Option<InspectResult>>,
    lookup: RwLock<InspectResult>,
    approvals: AtomicUsize,
    lookups: AtomicUsize,
}

impl ScriptedLedger {
    /// A ledger that approves everything.
    pub fn approve_all() -> Self {
        Self {
            id: LedgerId::new("scripted"),
            approval: RwLock::new(InspectResult::ok(Vec::new())),
            follow_up: RwLock::new(None),
            lookup: RwLock::new(InspectResult::failed(format!(
                "FunctionNotFound: {LOOKUP_FUNCTION}"
            ))),
            approvals: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// A ledger whose approval simulation fails with `raw`.
    pub fn deny_with(raw: impl Into<String>) -> Self {
        let ledger = Self::approve_all();
        ledger.set_approval(InspectResult::failed(raw));
        ledger
    }

    /// A ledger that approves the first simulation and fails later ones
    /// with `raw`, as if state changed after a client's preflight.
    pub fn approve_once_then_deny(raw: impl Into<String>) -> Self {
        let ledger = Self::approve_all();
        *ledger.follow_up.write().unwrap() = Some(InspectResult::failed(raw));
        ledger
    }

    pub fn set_approval(&self, result: InspectResult) {
        *self.approval.write().unwrap() = result;
    }

    pub fn set_lookup(&self, result: InspectResult) {
        *self.lookup.write().unwrap() = result;
    }

    /// Approval simulations served, from clients and key servers alike.
    pub fn approval_count(&self) -> usize {
        self.approvals.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerOracle for ScriptedLedger {
    fn ledger_id(&self) -> LedgerId {
        self.id.clone()
    }

    async fn dev_inspect(&self, _sender: &Address, kind: &TransactionKind) -> Result<InspectResult> {
        if kind.call().function == LOOKUP_FUNCTION {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            return Ok(self.lookup.read().unwrap().clone());
        }
        let served = self.approvals.fetch_add(1, Ordering::SeqCst);
        if served > 0 {
            if let Some(result) = self.follow_up.read().unwrap().as_ref() {
                return Ok(result.clone());
            }
        }
        Ok(self.approval.read().unwrap().clone())
    }
}
