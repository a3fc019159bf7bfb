//! Holder identities, credentials and holdings

use crate::{
    crypto::CredentialHasher,
    types::{ClassCounts, Holder, HolderId},
    validation, Error, Result,
};
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory holder registry
pub struct HolderRegistry {
    holders: HashMap<HolderId, Holder>,
    hasher: Arc<dyn CredentialHasher>,
}

impl HolderRegistry {
    /// Registry restored from persisted holders
    pub fn with_holders(holders: Vec<Holder>, hasher: Arc<dyn CredentialHasher>) -> Self {
        let holders = holders.into_iter().map(|h| (h.id.clone(), h)).collect();
        Self { holders, hasher }
    }

    /// Build a new holder record, storing only the credential hash
    ///
    /// The registry is unchanged until the record is passed to [`insert`](Self::insert).
    pub fn prepare(&self, id: &HolderId, credential: &str) -> Result<Holder> {
        validation::validate_identity(id.as_str())?;
        if credential.is_empty() {
            return Err(Error::InvalidRequest("Credential must not be empty".into()));
        }
        if self.holders.contains_key(id) {
            return Err(Error::AlreadyExists(id.to_string()));
        }

        Ok(Holder::new(id.clone(), self.hasher.hash(credential)))
    }

    /// Add a prepared holder
    pub fn insert(&mut self, holder: Holder) {
        self.holders.insert(holder.id.clone(), holder);
    }

    /// Check a credential; unknown holders never authenticate
    pub fn authenticate(&self, id: &HolderId, credential: &str) -> bool {
        self.holders
            .get(id)
            .map(|h| self.hasher.verify(&h.credential_hash, credential))
            .unwrap_or(false)
    }

    /// Holdings of a holder
    pub fn holdings_of(&self, id: &HolderId) -> Result<ClassCounts> {
        self.get(id).map(|h| h.holdings)
    }

    /// Look up a holder
    pub fn get(&self, id: &HolderId) -> Result<&Holder> {
        self.holders
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Look up a holder for mutation
    pub(crate) fn get_mut(&mut self, id: &HolderId) -> Result<&mut Holder> {
        self.holders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Number of registered holders
    pub(crate) fn len(&self) -> usize {
        self.holders.len()
    }

    /// Sum of holdings across all holders
    pub fn total_held(&self) -> ClassCounts {
        self.holders.values().fold(ClassCounts::zero(), |mut acc, h| {
            acc.vip += h.holdings.vip;
            acc.regular += h.holdings.regular;
            acc
        })
    }
}

impl std::fmt::Debug for HolderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HolderRegistry")
            .field("holders", &self.holders.len())
            .finish()
    }
}
