// verifier.rs
use ed25519_dalek::{Signature, VerifyingKey};
use solana_program::{keccak, msg, pubkey::Pubkey, secp256k1_recover::secp256k1_recover};

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::state::{PriceFeed, TemporalNumericValue, UpdateData, UpdateSignature};

/// Provider-specific way of authenticating an update.
///
/// `signer` is the key material registered for the provider in the
/// [`OracleConfig`]; its shape depends on the scheme.
pub trait SignatureScheme {
    fn verify(&self, update: &UpdateData, signer: &[u8]) -> bool;
}

/// Stork style: an EVM personal-sign over the packed update, verified by
/// recovering the signer's address from `r`, `s` and `v`.
pub struct Secp256k1EvmScheme;

/// Pyth Lazer style: an ed25519 signature `r || s` over
/// [`UpdateData::canonical_bytes`]. `v` carries the payload format tag.
pub struct Ed25519Scheme {
    pub format_tag: u8,
}

const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Hash that a Stork publisher signs for `update`, before the EVM
/// personal-sign prefix is applied.
pub fn stork_message_hash(signer: &[u8; 20], update: &UpdateData) -> [u8; 32] {
    let asset_id = keccak::hash(update.symbol.as_bytes()).0;
    let timestamp = uint256(update.temporal_numeric_value.timestamp_ns);
    let value = int256(update.temporal_numeric_value.quantized_value);
    keccak::hashv(&[
        &signer[..],
        &asset_id[..],
        &timestamp[..],
        &value[..],
        &update.publisher_merkle_root[..],
        &update.value_compute_alg_hash[..],
    ])
    .0
}

/// The digest actually signed: `keccak256(prefix || message_hash)`.
pub fn eth_signed_message_hash(message_hash: &[u8; 32]) -> [u8; 32] {
    keccak::hashv(&[ETH_SIGNED_MESSAGE_PREFIX, &message_hash[..]]).0
}

/// EVM address of an uncompressed secp256k1 public key (without the 0x04 tag).
pub fn evm_address(public_key: &[u8; 64]) -> [u8; 20] {
    let hash = keccak::hash(public_key).0;
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

fn uint256(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

fn int256(value: i128) -> [u8; 32] {
    let mut out = if value < 0 { [0xff; 32] } else { [0u8; 32] };
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

impl SignatureScheme for Secp256k1EvmScheme {
    fn verify(&self, update: &UpdateData, signer: &[u8]) -> bool {
        let Ok(signer) = <[u8; 20]>::try_from(signer) else {
            return false;
        };
        let recovery_id = match update.v {
            27 | 28 => update.v - 27,
            0 | 1 => update.v,
            _ => return false,
        };

        let digest = eth_signed_message_hash(&stork_message_hash(&signer, update));
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&update.r);
        signature[32..].copy_from_slice(&update.s);

        match secp256k1_recover(&digest, recovery_id, &signature) {
            Ok(public_key) => evm_address(&public_key.0) == signer,
            Err(_) => false,
        }
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn verify(&self, update: &UpdateData, signer: &[u8]) -> bool {
        if update.v != self.format_tag {
            return false;
        }
        let Ok(signer) = <[u8; 32]>::try_from(signer) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&signer) else {
            return false;
        };

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&update.r);
        bytes[32..].copy_from_slice(&update.s);
        let signature = Signature::from_bytes(&bytes);

        let Ok(message) = update.canonical_bytes() else {
            return false;
        };
        key.verify_strict(&message, &signature).is_ok()
    }
}

/// Fields of an accepted update, ready to be written into the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedUpdate {
    pub temporal_numeric_value: TemporalNumericValue,
    pub publisher_merkle_root: [u8; 32],
    pub value_compute_alg_hash: [u8; 32],
    pub signature: UpdateSignature,
}

impl ValidatedUpdate {
    pub fn apply(&self, feed: &mut PriceFeed, slot: u64) {
        feed.temporal_numeric_value = self.temporal_numeric_value;
        feed.publisher_merkle_root = self.publisher_merkle_root;
        feed.value_compute_alg_hash = self.value_compute_alg_hash;
        feed.signature = self.signature;
        feed.posted_slot = slot;
    }
}

/// Decide whether `update` may replace the contents of `feed`, stored at
/// `feed_address`.
pub fn verify_update(
    config: &OracleConfig,
    feed_address: &Pubkey,
    feed: &PriceFeed,
    update: &UpdateData,
) -> Result<ValidatedUpdate, OracleError> {
    if update.id != feed_address.to_bytes() || update.symbol != feed.symbol()? {
        msg!("Update id does not match feed {}", feed_address);
        return Err(OracleError::IdentityMismatch);
    }

    let stored = feed.temporal_numeric_value.timestamp_ns;
    let incoming = update.temporal_numeric_value.timestamp_ns;
    if incoming <= stored {
        msg!("Stale update: {} <= {}", incoming, stored);
        return Err(OracleError::StaleUpdate);
    }

    let provider = config
        .provider(feed.provider()?)
        .ok_or(OracleError::UnknownProvider)?;
    if !provider.scheme.verify(update, provider.signer) {
        msg!("Signature rejected for provider {}", provider.name);
        return Err(OracleError::BadSignature);
    }

    if !provider.supports_algorithm(&update.value_compute_alg_hash) {
        msg!("Algorithm not published by provider {}", provider.name);
        return Err(OracleError::UnsupportedAlgorithm);
    }

    Ok(ValidatedUpdate {
        temporal_numeric_value: update.temporal_numeric_value,
        publisher_merkle_root: update.publisher_merkle_root,
        value_compute_alg_hash: update.value_compute_alg_hash,
        signature: update.signature(),
    })
}
