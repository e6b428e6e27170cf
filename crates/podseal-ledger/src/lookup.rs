//! Lightweight content registration lookup.
//!
//! Before the authoritative approval simulation, the orchestrator can ask the
//! policy program which content ids a channel lists. Not every deployment
//! exposes the lookup function, so "unsupported" is a normal outcome rather
//! than an error.

use podseal_core::{Address, ContentId, ObjectId};

use crate::error::{LedgerError, Result};
use crate::oracle::LedgerOracle;
use crate::transaction::{CallArg, TransactionKind, LOOKUP_FUNCTION, POLICY_MODULE};

/// Markers a ledger uses when the called function does not exist.
const UNSUPPORTED_MARKERS: &[&str] = &["FunctionNotFound", "FUNCTION_RESOLUTION_FAILURE"];

/// Result of a content lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The content id is listed under the channel.
    Registered,
    /// The channel exists but does not list the content id.
    NotRegistered,
    /// The ledger backend does not support the lookup.
    Unsupported,
}

/// Check whether `content_id` is registered under `container`.
pub async fn lookup_content(
    oracle: &dyn LedgerOracle,
    sender: &Address,
    policy_program: &ObjectId,
    container: &ObjectId,
    content_id: &ContentId,
) -> Result<LookupOutcome> {
    let kind = TransactionKind::move_call(
        *policy_program,
        POLICY_MODULE,
        LOOKUP_FUNCTION,
        vec![CallArg::Object(*container)],
    );

    let result = oracle.dev_inspect(sender, &kind).await?;

    if !result.success {
        let raw = result.error.unwrap_or_default();
        if UNSUPPORTED_MARKERS.iter().any(|m| raw.contains(m)) {
            return Ok(LookupOutcome::Unsupported);
        }
        return Err(LedgerError::InvalidResponse(raw));
    }

    let Some(first) = result.return_values.first() else {
        return Ok(LookupOutcome::Unsupported);
    };

    let ids: Vec<String> = ciborium::from_reader(first.as_slice())
        .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

    if ids.iter().any(|id| id == content_id.as_str()) {
        Ok(LookupOutcome::Registered)
    } else {
        Ok(LookupOutcome::NotRegistered)
    }
}

/// Encode a list of content ids as a lookup return value.
pub fn encode_content_ids(ids: &[ContentId]) -> Vec<u8> {
    let strings: Vec<&str> = ids.iter().map(ContentId::as_str).collect();
    let mut buf = Vec::new();
    ciborium::into_writer(&strings, &mut buf).expect("CBOR serialization failed");
    buf
}
