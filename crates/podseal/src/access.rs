//! The content access orchestrator.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use podseal_core::{Address, ContentId, ContentReference, ObjectId};
use podseal_ledger::{lookup_content, AuthorizationTransaction, DenialReason, LookupOutcome};
use podseal_session::SubjectWallet;
use podseal_threshold::DecryptRequest;

use crate::context::AccessContext;
use crate::error::AccessError;
use crate::resource::{PlayableResource, PlayerSlot};

/// Where one `decrypt_and_open` call is.
///
/// ```text
/// Idle -> CheckingInit -> AwaitingSession -> Preflighting -> Fetching -> Decrypting -> Ready
///                \______________\________________\______________\___________\---> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPhase {
    Idle,
    CheckingInit,
    AwaitingSession,
    Preflighting,
    Fetching,
    Decrypting,
    Ready,
    Failed,
}

impl AccessPhase {
    /// `Ready` and `Failed` end an invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, AccessPhase::Ready | AccessPhase::Failed)
    }
}

impl fmt::Display for AccessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessPhase::Idle => "idle",
            AccessPhase::CheckingInit => "checking_init",
            AccessPhase::AwaitingSession => "awaiting_session",
            AccessPhase::Preflighting => "preflighting",
            AccessPhase::Fetching => "fetching",
            AccessPhase::Decrypting => "decrypting",
            AccessPhase::Ready => "ready",
            AccessPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Phase tracker for one invocation.
struct Attempt<'a> {
    content_id: &'a ContentId,
    phase: AccessPhase,
}

impl<'a> Attempt<'a> {
    fn new(content_id: &'a ContentId) -> Self {
        Self {
            content_id,
            phase: AccessPhase::Idle,
        }
    }

    fn enter(&mut self, next: AccessPhase) {
        debug_assert!(!self.phase.is_terminal());
        debug!(content_id = %self.content_id, from = %self.phase, phase = %next, "access phase");
        self.phase = next;
    }

    fn fail(&mut self, err: &AccessError) {
        debug!(content_id = %self.content_id, phase = %self.phase, error = %err, "access failed");
        self.phase = AccessPhase::Failed;
    }
}

/// Opens encrypted content.
pub struct ContentAccess {
    ctx: AccessContext,
}

impl ContentAccess {
    /// Create an orchestrator over `ctx`.
    pub fn new(ctx: AccessContext) -> Self {
        Self { ctx }
    }

    /// The shared context.
    pub fn context(&self) -> &AccessContext {
        &self.ctx
    }

    /// Authorize, fetch and decrypt `reference`, claiming `access_right`.
    ///
    /// Steps run strictly in order. A denied simulation fails before the blob
    /// store or any key server is contacted. The caller owns the returned
    /// resource and must revoke it (or drop it) when done.
    pub async fn decrypt_and_open(
        &self,
        reference: &ContentReference,
        access_right: &ObjectId,
        wallet: &dyn SubjectWallet,
    ) -> Result<PlayableResource, AccessError> {
        let mut attempt = Attempt::new(&reference.content_id);
        let result = self.run(&mut attempt, reference, access_right, wallet).await;
        match &result {
            Ok(_) => attempt.enter(AccessPhase::Ready),
            Err(e) => attempt.fail(e),
        }
        result
    }

    /// Open `reference` into `slot`, superseding whatever the slot is loading.
    ///
    /// Returns `Ok(false)` when the slot moved on before the result arrived;
    /// the resource has then already been released.
    pub async fn open_into(
        &self,
        slot: &PlayerSlot,
        reference: &ContentReference,
        access_right: &ObjectId,
        wallet: &dyn SubjectWallet,
    ) -> Result<bool, AccessError> {
        let ticket = slot.begin_load();
        let resource = self.decrypt_and_open(reference, access_right, wallet).await?;
        Ok(slot.complete(ticket, resource))
    }

    async fn run(
        &self,
        attempt: &mut Attempt<'_>,
        reference: &ContentReference,
        access_right: &ObjectId,
        wallet: &dyn SubjectWallet,
    ) -> Result<PlayableResource, AccessError> {
        attempt.enter(AccessPhase::CheckingInit);
        let engine = self.ctx.registry.engine()?;
        let subject = wallet.active_address().ok_or(AccessError::NoSubject)?;

        attempt.enter(AccessPhase::AwaitingSession);
        let session = self
            .ctx
            .sessions
            .get_or_create(
                wallet,
                &reference.policy_program_id,
                self.ctx.settings.session_ttl_minutes,
            )
            .await?;

        attempt.enter(AccessPhase::Preflighting);
        if self.ctx.settings.preflight_lookup {
            self.check_registered(&subject, reference).await?;
        }

        // Built once: the simulation and the key servers see the same bytes.
        let tx = AuthorizationTransaction::build(subject, reference, access_right);
        let tx_kind_bytes = tx.kind_bytes();
        let inspect = self.ctx.ledger.dev_inspect(&tx.sender, &tx.kind).await?;
        if let Some(reason) = inspect.denial_for(&reference.policy_program_id) {
            warn!(content_id = %reference.content_id, %reason, "approval simulation denied");
            return Err(AccessError::Verification(reason));
        }

        attempt.enter(AccessPhase::Fetching);
        let ciphertext = self.ctx.blobs.get(&reference.content_id).await?;

        attempt.enter(AccessPhase::Decrypting);
        let plaintext = engine
            .decrypt(
                &ciphertext,
                DecryptRequest {
                    session: &session,
                    tx_kind_bytes: &tx_kind_bytes,
                },
            )
            .await?;

        Ok(self
            .ctx
            .resources
            .create(Bytes::from(plaintext), reference.mime_type.clone()))
    }

    /// Soft existence check; only a definite "not registered" fails.
    async fn check_registered(
        &self,
        subject: &Address,
        reference: &ContentReference,
    ) -> Result<(), AccessError> {
        let outcome = lookup_content(
            self.ctx.ledger.as_ref(),
            subject,
            &reference.policy_program_id,
            &reference.container_id,
            &reference.content_id,
        )
        .await;

        match outcome {
            Ok(LookupOutcome::Registered) => Ok(()),
            Ok(LookupOutcome::NotRegistered) => {
                warn!(content_id = %reference.content_id, "content not registered in channel");
                Err(AccessError::Verification(DenialReason::ContentNotFound))
            }
            Ok(LookupOutcome::Unsupported) => {
                debug!(content_id = %reference.content_id, "content lookup unsupported");
                Ok(())
            }
            Err(e) => {
                debug!(content_id = %reference.content_id, error = %e, "content lookup failed");
                Ok(())
            }
        }
    }
}
