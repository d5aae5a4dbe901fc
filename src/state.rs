// state.rs
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::address::MAX_LABEL_LEN;
use crate::error::OracleError;

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct TemporalNumericValue {
    pub timestamp_ns: u64,
    pub quantized_value: i128,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct UpdateSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

/// Which execution layer may currently write the feed.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum DelegationState {
    #[default]
    BaseOwned,
    Delegated,
}

/// Signed price update as pushed by a data provider.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateData {
    pub symbol: String,
    pub id: [u8; 32],
    pub temporal_numeric_value: TemporalNumericValue,
    pub publisher_merkle_root: [u8; 32],
    pub value_compute_alg_hash: [u8; 32],
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl UpdateData {
    pub fn signature(&self) -> UpdateSignature {
        UpdateSignature {
            r: self.r,
            s: self.s,
            v: self.v,
        }
    }

    /// Borsh encoding of every field except the signature.
    pub fn canonical_bytes(&self) -> borsh::io::Result<Vec<u8>> {
        borsh::to_vec(&(
            &self.symbol,
            &self.id,
            &self.temporal_numeric_value,
            &self.publisher_merkle_root,
            &self.value_compute_alg_hash,
        ))
    }
}

/// One price feed account, keyed by `(provider, symbol)`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PriceFeed {
    pub authority: Pubkey,
    pub provider: [u8; MAX_LABEL_LEN],
    pub symbol: [u8; MAX_LABEL_LEN],
    pub feed_id: [u8; 32],
    pub exponent: u8,
    pub temporal_numeric_value: TemporalNumericValue,
    pub publisher_merkle_root: [u8; 32],
    pub value_compute_alg_hash: [u8; 32],
    pub signature: UpdateSignature,
    pub delegation_state: DelegationState,
    pub posted_slot: u64,
    pub bump: u8,
}

impl PriceFeed {
    pub const LEN: usize = 32 + MAX_LABEL_LEN * 2 + 32 + 1 + (8 + 16) + 32 + 32 + 65 + 1 + 8 + 1;

    /// A freshly initialized feed: zero value, base-owned.
    pub fn new(
        authority: Pubkey,
        provider: &str,
        symbol: &str,
        feed_id: [u8; 32],
        exponent: u8,
        bump: u8,
    ) -> Self {
        Self {
            authority,
            provider: encode_label(provider),
            symbol: encode_label(symbol),
            feed_id,
            exponent,
            temporal_numeric_value: TemporalNumericValue::default(),
            publisher_merkle_root: [0; 32],
            value_compute_alg_hash: [0; 32],
            signature: UpdateSignature::default(),
            delegation_state: DelegationState::BaseOwned,
            posted_slot: 0,
            bump,
        }
    }

    pub fn provider(&self) -> Result<&str, OracleError> {
        decode_label(&self.provider)
    }

    pub fn symbol(&self) -> Result<&str, OracleError> {
        decode_label(&self.symbol)
    }

    pub fn is_delegated(&self) -> bool {
        self.delegation_state == DelegationState::Delegated
    }

    pub fn price(&self) -> Price {
        Price {
            quantized_value: self.temporal_numeric_value.quantized_value,
            exponent: self.exponent,
            timestamp_ns: self.temporal_numeric_value.timestamp_ns,
        }
    }

    /// Read a feed from account data. Trailing bytes are ignored.
    pub fn unpack(data: &[u8]) -> Result<Self, OracleError> {
        if data.len() < Self::LEN {
            return Err(OracleError::NotFound);
        }
        Self::try_from_slice(&data[..Self::LEN]).map_err(|_| OracleError::NotFound)
    }
}

/// Latest accepted observation of a feed, as served by `sample`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Price {
    pub quantized_value: i128,
    pub exponent: u8,
    pub timestamp_ns: u64,
}

impl Price {
    /// `quantized_value * 10^-exponent`
    pub fn to_f64(&self) -> f64 {
        self.quantized_value as f64 * 10_f64.powi(-(self.exponent as i32))
    }

    /// Reject the price if it was observed more than `maximum_age_secs`
    /// before `now_unix`.
    pub fn no_older_than(self, now_unix: i64, maximum_age_secs: u64) -> Result<Self, OracleError> {
        let observed_secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let age = now_unix.saturating_sub(observed_secs);
        if age > 0 && age as u64 > maximum_age_secs {
            return Err(OracleError::PriceTooOld);
        }
        Ok(self)
    }
}

fn encode_label(label: &str) -> [u8; MAX_LABEL_LEN] {
    let mut out = [0u8; MAX_LABEL_LEN];
    let bytes = label.as_bytes();
    let len = bytes.len().min(MAX_LABEL_LEN);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn decode_label(raw: &[u8; MAX_LABEL_LEN]) -> Result<&str, OracleError> {
    let len = raw.iter().position(|b| *b == 0).unwrap_or(MAX_LABEL_LEN);
    core::str::from_utf8(&raw[..len]).map_err(|_| OracleError::InvalidArgument)
}
