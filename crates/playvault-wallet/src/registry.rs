//! Login/logout lifecycle for session key caches.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use playvault_core::traits::WalletFetcher;
use playvault_core::types::OwnerId;

use crate::error::{SessionError, SignerError};
use crate::session::SessionKeyCache;
use crate::signer::{SignRequest, SignResponse, Signer};

/// One [`SessionKeyCache`] per logged-in owner.
pub struct SessionRegistry {
    fetcher: Arc<dyn WalletFetcher>,
    sessions: DashMap<OwnerId, Arc<SessionKeyCache>>,
}

impl SessionRegistry {
    pub fn new(fetcher: Arc<dyn WalletFetcher>) -> Self {
        Self {
            fetcher,
            sessions: DashMap::new(),
        }
    }

    /// Create (or reuse) the owner's session and load its key.
    ///
    /// A session whose load fails is removed again.
    pub async fn login(&self, owner: &OwnerId) -> Result<Arc<SessionKeyCache>, SessionError> {
        let session = self
            .sessions
            .entry(owner.clone())
            .or_insert_with(|| {
                Arc::new(SessionKeyCache::new(owner.clone(), Arc::clone(&self.fetcher)))
            })
            .value()
            .clone();

        match session.load(owner).await {
            Ok(()) => {
                info!(owner = %owner, "logged in");
                Ok(session)
            }
            Err(err) => {
                self.sessions
                    .remove_if(owner, |_, s| Arc::ptr_eq(s, &session) && !s.is_loaded());
                warn!(owner = %owner, error = %err, "login failed");
                Err(err)
            }
        }
    }

    /// Clear and forget the owner's session. Returns whether one existed.
    pub fn logout(&self, owner: &OwnerId) -> bool {
        match self.sessions.remove(owner) {
            Some((_, session)) => {
                session.clear();
                info!(owner = %owner, "logged out");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, owner: &OwnerId) -> Option<Arc<SessionKeyCache>> {
        self.sessions.get(owner).map(|s| Arc::clone(s.value()))
    }

    /// Signer for a loaded session.
    pub fn signer(&self, owner: &OwnerId) -> Result<Signer, SignerError> {
        match self.get(owner) {
            Some(session) if session.is_loaded() => Ok(Signer::new(session)),
            _ => Err(SignerError::KeyUnavailable),
        }
    }

    /// Handle an external sign request.
    pub fn handle_sign(&self, request: &SignRequest) -> Result<SignResponse, SignerError> {
        let signer = self.signer(&request.owner_id).inspect_err(|_| {
            debug!(owner = %request.owner_id, "sign request without a loaded session");
        })?;
        let signed = signer.sign(request.message.as_bytes())?;
        Ok(signed.into())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        for entry in self.sessions.iter() {
            entry.value().clear();
        }
    }
}
