use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{LocalStore, RemoteItemStore, UnifiedStore};

/// A signed-in account as the rest of the crate sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Source of truth for who is signed in. `None` means anonymous. Every
/// change must be published through the subscription channel.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<UserIdentity>;
    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// In-process provider backed by a watch channel. The CLI and tests drive
/// it directly; a deployment would call `sign_in` from its auth callback.
pub struct ChannelIdentityProvider {
    sender: watch::Sender<Option<UserIdentity>>,
}

impl ChannelIdentityProvider {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn sign_in(&self, identity: UserIdentity) {
        self.sender.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        self.sender.send_replace(None);
    }
}

impl Default for ChannelIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for ChannelIdentityProvider {
    fn current_identity(&self) -> Option<UserIdentity> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.sender.subscribe()
    }
}

/// Binds the identity stream to the store layer: hands out a store facade
/// for the current session and promotes the anonymous shelf when a session
/// begins.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteItemStore>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        local: Arc<LocalStore>,
        remote: Arc<dyn RemoteItemStore>,
    ) -> Self {
        Self {
            provider,
            local,
            remote,
        }
    }

    /// Store facade for whoever is signed in right now.
    pub fn store(&self) -> UnifiedStore {
        match self.provider.current_identity() {
            Some(identity) => {
                UnifiedStore::authenticated(identity.id, self.local.clone(), self.remote.clone())
            }
            None => UnifiedStore::anonymous(self.local.clone()),
        }
    }

    /// Watch identity changes until cancelled. Each anonymous-to-signed-in
    /// edge promotes the anonymous shelf exactly once.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut identities = self.provider.subscribe();
        let mut previous = identities.borrow_and_update().clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("session watcher shutting down");
                    break;
                }
                changed = identities.changed() => {
                    if changed.is_err() {
                        info!("identity provider dropped, session watcher stopping");
                        break;
                    }
                    let current = identities.borrow_and_update().clone();
                    self.on_transition(previous.as_ref(), current.as_ref()).await;
                    previous = current;
                }
            }
        }
    }

    async fn on_transition(
        &self,
        previous: Option<&UserIdentity>,
        current: Option<&UserIdentity>,
    ) {
        match (previous, current) {
            (None, Some(identity)) => {
                info!(user_id = %identity.id, "session started, promoting anonymous items");
                let store = UnifiedStore::authenticated(
                    identity.id,
                    self.local.clone(),
                    self.remote.clone(),
                );
                if !store.sync_to_remote().await {
                    warn!(user_id = %identity.id, "anonymous item promotion did not run");
                }
            }
            (Some(identity), None) => {
                info!(user_id = %identity.id, "session ended");
            }
            // Startup replays and same-state updates carry no edge
            _ => {}
        }
    }
}
