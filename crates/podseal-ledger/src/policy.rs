//! Denial reasons reported by the policy program.
//!
//! A failed simulation carries the ledger's raw error string. The policy
//! program aborts with well-known codes; this module turns the raw string
//! back into a [`DenialReason`] so callers can tell "your subscription ran
//! out" apart from a generic failure.

use std::fmt;

use podseal_core::ObjectId;

use crate::transaction::POLICY_MODULE;

/// Abort codes raised by the subscription policy program.
pub mod abort_codes {
    /// The subscription's expiry is in the past.
    pub const E_SUBSCRIPTION_EXPIRED: u64 = 1;
    /// The subscription was issued for a different channel.
    pub const E_INVALID_CHANNEL: u64 = 2;
    /// The channel has no content with this identity label.
    pub const E_CONTENT_NOT_FOUND: u64 = 3;
    /// The identity label does not belong to the channel.
    pub const E_INVALID_NONCE: u64 = 4;
    /// The subscription belongs to somebody else.
    pub const E_NO_ACCESS: u64 = 5;
}

/// Why the policy program refused an authorization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The claimed subscription has expired.
    SubscriptionExpired,
    /// The subscription does not cover this channel.
    InvalidChannel,
    /// The content is not registered under the channel.
    ContentNotFound,
    /// The identity label is not valid for the channel.
    InvalidNonce,
    /// Anything else, with the raw ledger error.
    Unknown(String),
}

const NAMED: &[(&str, DenialReason)] = &[
    ("ESubscriptionExpired", DenialReason::SubscriptionExpired),
    ("EInvalidChannel", DenialReason::InvalidChannel),
    ("EContentNotFound", DenialReason::ContentNotFound),
    ("EEpisodeNotFound", DenialReason::ContentNotFound),
    ("EInvalidNonce", DenialReason::InvalidNonce),
];

impl DenialReason {
    /// Map a raw ledger error onto a denial reason.
    ///
    /// Constant names win over numeric codes. A numeric code only counts
    /// when the abort was raised in the policy module; framework aborts and
    /// anything else map to [`DenialReason::Unknown`].
    pub fn from_raw(raw: &str) -> Self {
        Self::classify(raw, None)
    }

    /// Like [`DenialReason::from_raw`], but numeric codes must also come
    /// from the package `policy_program`.
    pub fn from_raw_for(raw: &str, policy_program: &ObjectId) -> Self {
        Self::classify(raw, Some(policy_program))
    }

    fn classify(raw: &str, policy_program: Option<&ObjectId>) -> Self {
        for (name, reason) in NAMED {
            if raw.contains(name) {
                return reason.clone();
            }
        }

        let code = parse_abort(raw)
            .filter(|abort| abort.module == POLICY_MODULE)
            .filter(|abort| policy_program.map_or(true, |p| same_address(&abort.package, &p.to_hex())))
            .map(|abort| abort.code);

        match code {
            Some(abort_codes::E_SUBSCRIPTION_EXPIRED) => DenialReason::SubscriptionExpired,
            Some(abort_codes::E_INVALID_CHANNEL) => DenialReason::InvalidChannel,
            Some(abort_codes::E_CONTENT_NOT_FOUND) => DenialReason::ContentNotFound,
            Some(abort_codes::E_INVALID_NONCE) => DenialReason::InvalidNonce,
            _ => DenialReason::Unknown(raw.to_string()),
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::SubscriptionExpired => f.write_str("subscription expired"),
            DenialReason::InvalidChannel => f.write_str("subscription does not cover this channel"),
            DenialReason::ContentNotFound => f.write_str("content not found in channel"),
            DenialReason::InvalidNonce => f.write_str("invalid content nonce"),
            DenialReason::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Where and with which code a call aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAbort {
    /// Package address as reported, usually `0x`-prefixed hex.
    pub package: String,
    /// Module name.
    pub module: String,
    /// Abort code.
    pub code: u64,
}

/// Parse a `MoveAbort(MoveLocation { .. }, <code>)` error.
pub fn parse_abort(raw: &str) -> Option<MoveAbort> {
    let start = raw.find("MoveAbort(")?;
    let tail = &raw[start..];
    let end = tail.find(") in command").unwrap_or(tail.len());
    let body = &tail[..end];

    let code = body.rsplit(", ").next()?.trim().trim_end_matches(')').parse().ok()?;
    let package = between(body, "address: ", ",")?.trim().to_string();
    let module = between(body, "name: Identifier(\"", "\"")?.to_string();

    Some(MoveAbort {
        package,
        module,
        code,
    })
}

/// Pull the abort code out of a `MoveAbort` error, whatever module raised it.
pub fn extract_abort_code(raw: &str) -> Option<u64> {
    parse_abort(raw).map(|abort| abort.code)
}

fn between<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let from = s.find(open)? + open.len();
    let len = s[from..].find(close)?;
    Some(&s[from..from + len])
}

/// Compare addresses ignoring the `0x` prefix, leading zeros and case.
fn same_address(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.trim_start_matches("0x").trim_start_matches('0').to_ascii_lowercase();
    norm(a) == norm(b)
}

/// Format an abort the way a ledger node reports it.
pub fn format_abort(package_hex: &str, module: &str, function: &str, code: u64) -> String {
    format!(
        "MoveAbort(MoveLocation {{ module: ModuleId {{ address: {package_hex}, name: Identifier(\"{module}\") }}, function: 0, instruction: 0, function_name: Some(\"{function}\") }}, {code}) in command 0"
    )
}
