//! Authorization transactions.
//!
//! An [`AuthorizationTransaction`] is never signed and never executed. It is
//! built fresh for every decrypt attempt (the sender and the access-right
//! object may have changed since the last one) and consulted as a predicate:
//! "would this call succeed right now?".
//!
//! The sender-free [`TransactionKind`] is what both the client preflight and
//! the key servers simulate, so its byte encoding is computed once per
//! attempt and reused for both.

use serde::{Deserialize, Serialize};

use podseal_core::{Address, ContentReference, ObjectId};

use crate::error::{LedgerError, Result};

/// Module of the policy program that hosts the approval entry points.
pub const POLICY_MODULE: &str = "podcast";

/// Entry function key servers recognise as an approval predicate.
///
/// Key servers accept any function whose name starts with this prefix.
pub const APPROVE_FUNCTION: &str = "seal_approve";

/// Read-only function listing the content ids registered under a channel.
pub const LOOKUP_FUNCTION: &str = "get_episode_blob_ids";

/// An argument to a program call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    /// Raw bytes passed by value.
    Pure(Vec<u8>),
    /// Reference to a ledger object.
    Object(ObjectId),
}

/// A single call into a ledger program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    /// The program (package) being called.
    pub package: ObjectId,
    /// Module inside the program.
    pub module: String,
    /// Entry function name.
    pub function: String,
    /// Positional arguments.
    pub arguments: Vec<CallArg>,
}

/// The body of a transaction, without sender or gas metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// A single program call.
    MoveCall(MoveCall),
}

impl TransactionKind {
    /// Build a single-call transaction kind.
    pub fn move_call(
        package: ObjectId,
        module: impl Into<String>,
        function: impl Into<String>,
        arguments: Vec<CallArg>,
    ) -> Self {
        TransactionKind::MoveCall(MoveCall {
            package,
            module: module.into(),
            function: function.into(),
            arguments,
        })
    }

    /// The call this transaction makes.
    pub fn call(&self) -> &MoveCall {
        match self {
            TransactionKind::MoveCall(call) => call,
        }
    }

    /// If this is an approval call into `package`, return the identity label
    /// it asks about.
    ///
    /// Key servers use this to make sure a request only unlocks the identity
    /// the transaction was preflighted for.
    pub fn approval_identity(&self, package: &ObjectId) -> Option<&[u8]> {
        let call = self.call();
        if &call.package != package || !call.function.starts_with(APPROVE_FUNCTION) {
            return None;
        }
        match call.arguments.first() {
            Some(CallArg::Pure(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// Serialize to CBOR bytes ("transaction-kind-only" form).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| LedgerError::MalformedTransaction(e.to_string()))
    }
}

/// An unsigned, unexecuted approval transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationTransaction {
    /// The subject the call is simulated for.
    pub sender: Address,
    /// The approval call.
    pub kind: TransactionKind,
}

impl AuthorizationTransaction {
    /// Build the approval call for `reference`, claiming `access_right`.
    ///
    /// Arguments are `(identity label, access right, channel)`.
    pub fn build(sender: Address, reference: &ContentReference, access_right: &ObjectId) -> Self {
        let kind = TransactionKind::move_call(
            reference.policy_program_id,
            POLICY_MODULE,
            APPROVE_FUNCTION,
            vec![
                CallArg::Pure(reference.encryption_nonce.as_bytes().to_vec()),
                CallArg::Object(*access_right),
                CallArg::Object(reference.container_id),
            ],
        );
        Self { sender, kind }
    }

    /// The sender-free bytes handed to key servers.
    pub fn kind_bytes(&self) -> Vec<u8> {
        self.kind.to_bytes()
    }

    /// Full encoding including the sender.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize a full encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| LedgerError::MalformedTransaction(e.to_string()))
    }
}
