//! # podseal ledger
//!
//! The ledger policy oracle: builds authorization transactions and dry-runs
//! them against a ledger node without ever committing them.
//!
//! ## Overview
//!
//! Access to encrypted content is decided by a policy program living on the
//! ledger. A subject proves access by constructing an unsigned call into the
//! program's `seal_approve` entry function with the content's identity label
//! and their claimed access right. The call is only ever *simulated*
//! (`dev_inspect`): by the client as a cheap preflight, and again by every key
//! server before it releases a key share.
//!
//! ## Key Types
//!
//! - [`LedgerOracle`] - async trait for read-only simulation
//! - [`AuthorizationTransaction`] - the unexecuted approval call
//! - [`TransactionKind`] - the sender-free body that key servers evaluate
//! - [`DenialReason`] - typed cause extracted from a failed simulation
//! - [`MemoryLedger`] - in-process subscription policy program
//! - [`RpcLedger`] - JSON-RPC client for a ledger node

pub mod error;
pub mod lookup;
pub mod memory;
pub mod oracle;
pub mod policy;
pub mod rpc;
pub mod transaction;

pub use error::{LedgerError, Result};
pub use lookup::{lookup_content, LookupOutcome};
pub use memory::MemoryLedger;
pub use oracle::{InspectResult, LedgerId, LedgerOracle};
pub use policy::{abort_codes, parse_abort, DenialReason, MoveAbort};
pub use rpc::RpcLedger;
pub use transaction::{
    AuthorizationTransaction, CallArg, MoveCall, TransactionKind, APPROVE_FUNCTION,
    LOOKUP_FUNCTION, POLICY_MODULE,
};
