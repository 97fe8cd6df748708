//! Account identity and per-address nonce sequencing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use loyalty_codec::selector_from_name;
use loyalty_crypto::StarkKeySigner;
use loyalty_types::{
    ChainId, ContractAddress, Felt, FunctionCall, SigningError, StarkSignature, TransactionSigner,
};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::transport::{NetworkClient, TransportError};

pub const GET_PUBLIC_KEY_ENTRY_POINT: &str = "get_public_key";

/// Who an account acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountRole {
    /// Platform account that pays fees and administers contracts.
    Operator,
    /// End user or merchant account.
    Principal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Address, signing key and chain for one on-chain account. Immutable once
/// built.
#[derive(Clone)]
pub struct AccountContext {
    address: ContractAddress,
    signer: Arc<dyn TransactionSigner>,
    chain_id: ChainId,
    role: AccountRole,
}

impl AccountContext {
    /// Validate well-formedness locally. When `expected_public_key` is given
    /// the signer must derive exactly that key.
    pub fn new(
        address: ContractAddress,
        signer: impl TransactionSigner + 'static,
        chain_id: ChainId,
        role: AccountRole,
        expected_public_key: Option<Felt>,
    ) -> Result<Self, AccountError> {
        if address.is_zero() {
            return Err(AccountError::InvalidCredentials(
                "account address is zero".to_string(),
            ));
        }
        if let Some(expected) = expected_public_key {
            check_public_key(&signer, expected)?;
        }
        Ok(Self {
            address,
            signer: Arc::new(signer),
            chain_id,
            role,
        })
    }

    pub fn from_private_key_hex(
        address: ContractAddress,
        private_key: &str,
        chain_id: ChainId,
        role: AccountRole,
    ) -> Result<Self, AccountError> {
        let signer = StarkKeySigner::from_hex(private_key)?;
        Self::new(address, signer, chain_id, role, None)
    }

    /// Build a context against the live network: the chain id comes from the
    /// node and the account's registered public key must match the signer.
    pub async fn connect<N>(
        network: &N,
        address: ContractAddress,
        signer: impl TransactionSigner + 'static,
        role: AccountRole,
    ) -> Result<Self, AccountError>
    where
        N: NetworkClient + ?Sized,
    {
        let chain_id = network.chain_id().await?;
        let registered = network
            .call(&FunctionCall {
                contract_address: address,
                entry_point_selector: selector_from_name(GET_PUBLIC_KEY_ENTRY_POINT),
                calldata: Vec::new(),
            })
            .await?;
        let registered = registered.first().copied().ok_or_else(|| {
            AccountError::InvalidCredentials("account returned no public key".to_string())
        })?;
        Self::new(address, signer, chain_id, role, Some(registered))
    }

    pub fn address(&self) -> ContractAddress {
        self.address
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn role(&self) -> AccountRole {
        self.role
    }
}

impl TransactionSigner for AccountContext {
    fn public_key(&self) -> Felt {
        self.signer.public_key()
    }

    fn sign_hash(&self, hash: &Felt) -> Result<StarkSignature, SigningError> {
        self.signer.sign_hash(hash)
    }
}

impl fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountContext")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn check_public_key(signer: &impl TransactionSigner, expected: Felt) -> Result<(), AccountError> {
    let derived = signer.public_key();
    if derived != expected {
        return Err(AccountError::InvalidCredentials(format!(
            "signing key does not match account public key {}",
            loyalty_types::felt_to_fixed_hex(&expected)
        )));
    }
    Ok(())
}

/// Local view of an account's next nonce.
#[derive(Debug, Default)]
pub struct NonceSlot {
    next: Option<u64>,
}

impl NonceSlot {
    pub fn cached_next(&self) -> Option<u64> {
        self.next
    }
}

/// One async lock per account address. Holding a [`NonceGuard`] serializes
/// nonce fetch, signing and broadcast for that address; different addresses
/// proceed in parallel.
///
/// A slot lives only while someone holds or waits for it, or while it caches
/// a nonce the network may not report yet. Idle slots are evicted.
#[derive(Debug, Default, Clone)]
pub struct NonceRegistry {
    slots: Arc<Mutex<HashMap<ContractAddress, Arc<AsyncMutex<NonceSlot>>>>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ContractAddress, Arc<AsyncMutex<NonceSlot>>>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, address: ContractAddress) -> Arc<AsyncMutex<NonceSlot>> {
        Arc::clone(self.slots().entry(address).or_default())
    }

    /// Wait for exclusive use of `address`'s nonce sequence.
    pub async fn acquire(&self, address: ContractAddress) -> NonceGuard {
        let slot = self.slot(address).lock_owned().await;
        NonceGuard {
            address,
            slot: Some(slot),
            reserved: None,
            registry: self.clone(),
        }
    }

    /// The transaction at `nonce` is final on the network, so the network
    /// nonce now covers it. Drops the cache unless a later nonce was
    /// committed since.
    pub async fn settle(&self, address: ContractAddress, nonce: u64) {
        self.forget_cached(address, |next| next == nonce + 1).await;
    }

    /// The network refused a broadcast transaction and never consumed its
    /// nonce. Drops the cache so the next holder refetches.
    pub async fn invalidate(&self, address: ContractAddress) {
        self.forget_cached(address, |_| true).await;
    }

    async fn forget_cached(&self, address: ContractAddress, stale: impl FnOnce(u64) -> bool) {
        let Some(slot) = self.slots().get(&address).cloned() else {
            return;
        };
        {
            let mut slot = slot.lock().await;
            if slot.next.is_some_and(stale) {
                tracing::debug!(address = %address, next = ?slot.next, "dropping cached nonce");
                slot.next = None;
            }
        }
        drop(slot);
        self.evict_if_idle(address);
    }

    /// Remove `address`'s slot when nobody holds or waits for it and it
    /// caches nothing.
    fn evict_if_idle(&self, address: ContractAddress) {
        let mut slots = self.slots();
        let idle = slots.get(&address).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|slot| slot.next.is_none())
        });
        if idle {
            slots.remove(&address);
        }
    }

    pub fn tracked_addresses(&self) -> usize {
        self.slots().len()
    }
}

/// Exclusive hold on one address's nonce sequence. Dropping it without
/// `commit` forgets the cached nonce so the next holder refetches.
#[derive(Debug)]
pub struct NonceGuard {
    address: ContractAddress,
    // `None` only while dropping
    slot: Option<OwnedMutexGuard<NonceSlot>>,
    reserved: Option<u64>,
    registry: NonceRegistry,
}

impl NonceGuard {
    pub fn address(&self) -> ContractAddress {
        self.address
    }

    /// Pick the nonce for the next transaction: the network's value, or the
    /// local successor of the last broadcast when the network lags behind.
    pub fn reserve(&mut self, network_nonce: u64) -> u64 {
        let nonce = match self.slot.as_ref().and_then(|slot| slot.next) {
            Some(local) => local.max(network_nonce),
            None => network_nonce,
        };
        self.reserved = Some(nonce);
        nonce
    }

    pub fn reserved(&self) -> Option<u64> {
        self.reserved
    }

    /// Record a successful broadcast of the reserved nonce.
    pub fn commit(mut self) {
        if let (Some(nonce), Some(slot)) = (self.reserved.take(), self.slot.as_mut()) {
            slot.next = Some(nonce + 1);
        }
    }

    /// Give up the reservation and drop the cache.
    pub fn release(mut self) {
        self.reserved = None;
        if let Some(slot) = self.slot.as_mut() {
            slot.next = None;
        }
    }
}

impl Drop for NonceGuard {
    fn drop(&mut self) {
        if let Some(mut slot) = self.slot.take() {
            if self.reserved.take().is_some() {
                slot.next = None;
            }
        }
        self.registry.evict_if_idle(self.address);
    }
}
