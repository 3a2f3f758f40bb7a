use std::collections::HashMap;
use std::future::Future;

use plaza_protocol::{AccountId, Position};
use tokio::sync::RwLock;

use crate::DirectoryError;

/// The durable profile behind an account, as presence needs to see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub account_id: AccountId,
    pub username: String,
    pub avatar: String,
    /// Where this account last stood, if it has ever moved. Used as the
    /// spawn position on the next join.
    pub last_position: Option<Position>,
}

/// Resolves accounts to profiles and persists presence state.
///
/// Implement this over your user database. The framework calls
/// [`fetch`](IdentityStore::fetch) once per join and
/// [`store_position`](IdentityStore::store_position) on every move; the
/// latter is fire-and-forget from the relay's point of view, so a slow
/// backend delays persistence but never movement broadcasts.
pub trait IdentityStore: Send + Sync + 'static {
    /// Looks up the profile for `account_id`.
    ///
    /// Returns [`DirectoryError::UnknownAccount`] if no such account
    /// exists; the join is then refused with an explicit error reply.
    fn fetch(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Profile, DirectoryError>> + Send;

    /// Persists `position` as the account's last-known position.
    fn store_position(
        &self,
        account_id: AccountId,
        position: Position,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}

/// `HashMap`-backed identity store for demos and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    profiles: RwLock<HashMap<AccountId, Profile>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a profile.
    pub async fn add_profile(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.account_id, profile);
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn fetch(&self, account_id: AccountId) -> Result<Profile, DirectoryError> {
        self.profiles
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or(DirectoryError::UnknownAccount(account_id))
    }

    async fn store_position(
        &self,
        account_id: AccountId,
        position: Position,
    ) -> Result<(), DirectoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&account_id)
            .ok_or(DirectoryError::UnknownAccount(account_id))?;
        profile.last_position = Some(position);
        Ok(())
    }
}
