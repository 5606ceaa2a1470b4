//! Process-wide signer slot.
//!
//! At most one wallet is active at a time. Every `generate`/`load` builds a
//! complete [`WalletState`] first and then swaps it into the slot in one
//! write, so readers see either the old wallet or the new one, never a mix.

use bip39::{Language, Mnemonic};
use chrono::{DateTime, Utc};
use ethers_core::types::Address;
use ethers_signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::PRIVATE_KEY_ENV;

const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet is loaded. Create one with generateWallet or load one with loadWallet before calling this tool")]
    NoWallet,
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("wallet generation failed: {0}")]
    Generation(String),
}

/// The active signer. Immutable once built; replaced as a whole.
#[derive(Debug)]
pub struct WalletState {
    pub address: Address,
    pub persisted: bool,
    pub created_at: DateTime<Utc>,
    signer: LocalWallet,
    private_key: SecretString,
    mnemonic: Option<SecretString>,
}

impl WalletState {
    fn from_signer(signer: LocalWallet, mnemonic: Option<String>) -> Self {
        let private_key = format!("0x{}", hex::encode(signer.signer().to_bytes()));
        Self {
            address: signer.address(),
            persisted: false,
            created_at: Utc::now(),
            signer,
            private_key: SecretString::new(private_key),
            mnemonic: mnemonic.map(SecretString::new),
        }
    }

    fn persisted_copy(&self) -> Self {
        Self {
            address: self.address,
            persisted: true,
            created_at: self.created_at,
            signer: self.signer.clone(),
            private_key: SecretString::new(self.private_key.expose_secret().clone()),
            mnemonic: self
                .mnemonic
                .as_ref()
                .map(|m| SecretString::new(m.expose_secret().clone())),
        }
    }

    /// Signer bound to `chain_id`, ready for transaction signing.
    pub fn signer_for_chain(&self, chain_id: u64) -> LocalWallet {
        self.signer.clone().with_chain_id(chain_id)
    }

    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }

    /// 0x-prefixed hex private key.
    pub fn private_key(&self) -> &str {
        self.private_key.expose_secret()
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_ref().map(|m| m.expose_secret().as_str())
    }
}

fn parse_private_key(raw: &str) -> Result<LocalWallet, WalletError> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidKey(
            "expected 64 hex characters, optionally prefixed with 0x".to_string(),
        ));
    }
    hex_part
        .parse::<LocalWallet>()
        .map_err(|e| WalletError::InvalidKey(e.to_string()))
}

fn derive_from_mnemonic(phrase: &str) -> Result<LocalWallet, WalletError> {
    let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    Mnemonic::parse_in(Language::English, &phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    MnemonicBuilder::<English>::default()
        .phrase(phrase.as_str())
        .derivation_path(DERIVATION_PATH)
        .and_then(|builder| builder.build())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Owner of the single wallet slot. Cheap to clone; clones share the slot.
#[derive(Clone, Default)]
pub struct WalletManager {
    slot: Arc<RwLock<Option<Arc<WalletState>>>>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `private_key` already active. The key came from the
    /// environment, so the state counts as persisted.
    pub fn with_private_key(private_key: &str) -> Result<Self, WalletError> {
        let mut state = WalletState::from_signer(parse_private_key(private_key)?, None);
        state.persisted = true;
        info!("Loaded wallet {:?} from {}", state.address, PRIVATE_KEY_ENV);
        Ok(Self {
            slot: Arc::new(RwLock::new(Some(Arc::new(state)))),
        })
    }

    pub async fn active(&self) -> Option<Arc<WalletState>> {
        self.slot.read().await.clone()
    }

    /// The active wallet, or [`WalletError::NoWallet`].
    pub async fn require_active(&self) -> Result<Arc<WalletState>, WalletError> {
        self.active().await.ok_or(WalletError::NoWallet)
    }

    /// Creates a fresh random wallet and makes it active.
    pub async fn generate(&self) -> Result<Arc<WalletState>, WalletError> {
        let mut rng = rand::rngs::OsRng;
        let entropy = rand::Rng::gen::<[u8; 16]>(&mut rng);
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|e| WalletError::Generation(e.to_string()))?;
        let phrase = mnemonic.to_string();
        let signer = derive_from_mnemonic(&phrase)
            .map_err(|e| WalletError::Generation(e.to_string()))?;
        Ok(self
            .swap(WalletState::from_signer(signer, Some(phrase)), "Generated")
            .await)
    }

    /// Validates `private_key` and makes it the active wallet. The current
    /// wallet is left untouched when validation fails.
    pub async fn load(&self, private_key: &str) -> Result<Arc<WalletState>, WalletError> {
        let signer = parse_private_key(private_key)?;
        Ok(self
            .swap(WalletState::from_signer(signer, None), "Loaded")
            .await)
    }

    /// Derives the first account of `phrase` and makes it active.
    pub async fn load_mnemonic(&self, phrase: &str) -> Result<Arc<WalletState>, WalletError> {
        let signer = derive_from_mnemonic(phrase)?;
        Ok(self
            .swap(
                WalletState::from_signer(signer, Some(phrase.trim().to_string())),
                "Loaded mnemonic",
            )
            .await)
    }

    /// Mirrors the key of `state` into the process environment. Calling it
    /// again for an already persisted state changes nothing.
    pub async fn persist(&self, state: &Arc<WalletState>) -> Arc<WalletState> {
        if state.persisted {
            return state.clone();
        }
        std::env::set_var(PRIVATE_KEY_ENV, state.private_key());
        let persisted = Arc::new(state.persisted_copy());

        let mut slot = self.slot.write().await;
        if slot.as_ref().map_or(false, |active| Arc::ptr_eq(active, state)) {
            *slot = Some(persisted.clone());
        }
        info!("Persisted wallet {:?} to {}", persisted.address, PRIVATE_KEY_ENV);
        persisted
    }

    async fn swap(&self, state: WalletState, action: &str) -> Arc<WalletState> {
        let state = Arc::new(state);
        let previous = self.slot.write().await.replace(state.clone());
        match previous {
            Some(old) if old.address != state.address => info!(
                "{} wallet {:?}, replacing {:?}",
                action, state.address, old.address
            ),
            _ => info!("{} wallet {:?}", action, state.address),
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development mnemonic and its first account.
    const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn dev_address() -> Address {
        DEV_ADDRESS.parse().unwrap()
    }

    #[tokio::test]
    async fn test_no_wallet_until_created() {
        let manager = WalletManager::new();
        assert!(manager.active().await.is_none());
        assert_eq!(manager.require_active().await.unwrap_err(), WalletError::NoWallet);
    }

    #[tokio::test]
    async fn test_load_private_key_with_and_without_prefix() {
        let manager = WalletManager::new();
        let loaded = manager.load(DEV_KEY).await.unwrap();
        assert_eq!(loaded.address, dev_address());
        assert_eq!(loaded.private_key(), DEV_KEY);
        assert!(!loaded.persisted);

        let bare = manager.load(DEV_KEY.trim_start_matches("0x")).await.unwrap();
        assert_eq!(bare.address, dev_address());
    }

    #[tokio::test]
    async fn test_invalid_key_keeps_previous_wallet() {
        let manager = WalletManager::new();
        manager.load(DEV_KEY).await.unwrap();

        let bad_keys = vec![
            "0x1234".to_string(),
            "not a key".to_string(),
            format!("0x{}", "zz".repeat(32)),
        ];
        for bad in &bad_keys {
            let err = manager.load(bad).await.unwrap_err();
            assert!(matches!(err, WalletError::InvalidKey(_)), "{bad}");
        }
        // The zero scalar has the right shape but is not a valid key.
        let zero = format!("0x{}", "0".repeat(64));
        assert!(matches!(
            manager.load(&zero).await.unwrap_err(),
            WalletError::InvalidKey(_)
        ));

        assert_eq!(manager.require_active().await.unwrap().address, dev_address());
    }

    #[tokio::test]
    async fn test_generate_replaces_active_wallet() {
        let manager = WalletManager::new();
        let first = manager.generate().await.unwrap();
        let second = manager.generate().await.unwrap();
        assert_ne!(first.address, second.address);
        assert_eq!(manager.require_active().await.unwrap().address, second.address);
        assert_eq!(second.mnemonic().unwrap().split(' ').count(), 12);
        assert_eq!(second.signer().address(), second.address);

        // The exposed key and mnemonic both lead back to the active address.
        let active = manager.active().await.unwrap();
        assert_eq!(parse_private_key(active.private_key()).unwrap().address(), active.address);
        assert_eq!(
            derive_from_mnemonic(active.mnemonic().unwrap()).unwrap().address(),
            active.address
        );
    }

    #[tokio::test]
    async fn test_mnemonic_derives_first_account() {
        let manager = WalletManager::new();
        let state = manager.load_mnemonic(DEV_MNEMONIC).await.unwrap();
        assert_eq!(state.address, dev_address());
        assert_eq!(state.private_key(), DEV_KEY);

        let err = manager.load_mnemonic("not a valid phrase").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)));
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let manager = WalletManager::new();
        let state = manager.load(DEV_KEY).await.unwrap();
        let persisted = manager.persist(&state).await;
        assert!(persisted.persisted);
        assert_eq!(std::env::var(PRIVATE_KEY_ENV).unwrap(), DEV_KEY);
        assert!(manager.require_active().await.unwrap().persisted);

        let again = manager.persist(&persisted).await;
        assert!(Arc::ptr_eq(&again, &persisted));
    }

    #[tokio::test]
    async fn test_signer_for_chain_sets_chain_id() {
        let manager = WalletManager::with_private_key(DEV_KEY).unwrap();
        let state = manager.require_active().await.unwrap();
        assert!(state.persisted);
        assert_eq!(state.signer_for_chain(8453).chain_id(), 8453);
    }

    #[tokio::test]
    async fn test_concurrent_swaps_never_mix_address_and_key() {
        let manager = WalletManager::new();
        manager.load(DEV_KEY).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    manager.generate().await.map(|_| ())
                } else {
                    let state = manager.require_active().await?;
                    assert_eq!(state.signer().address(), state.address);
                    let reparsed = parse_private_key(state.private_key())?;
                    assert_eq!(reparsed.address(), state.address);
                    Ok(())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
