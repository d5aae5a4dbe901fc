// address.rs
use solana_program::pubkey::{Pubkey, MAX_SEED_LEN};

use crate::error::OracleError;

pub const PRICE_FEED_SEED: &[u8] = b"price_feed";

/// Maximum byte length of a provider or symbol label.
pub const MAX_LABEL_LEN: usize = MAX_SEED_LEN;

/// Check that a provider or symbol label can be used as a seed and stored
/// zero-padded in the feed record.
pub fn validate_label(label: &str) -> Result<(), OracleError> {
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_LABEL_LEN || bytes.contains(&0) {
        return Err(OracleError::InvalidArgument);
    }
    Ok(())
}

/// Seeds of a price feed PDA.
///
/// The provider length is a seed of its own so that the concatenation of
/// `provider` and `symbol` cannot be split two ways.
pub struct FeedSeeds<'a> {
    provider: &'a [u8],
    symbol: &'a [u8],
    provider_len: [u8; 1],
    bump: [u8; 1],
}

impl<'a> FeedSeeds<'a> {
    pub fn new(provider: &'a str, symbol: &'a str, bump: u8) -> Result<Self, OracleError> {
        validate_label(provider)?;
        validate_label(symbol)?;
        Ok(Self {
            provider: provider.as_bytes(),
            symbol: symbol.as_bytes(),
            provider_len: [provider.len() as u8],
            bump: [bump],
        })
    }

    /// Seeds without the bump, as expected by `find_program_address` and the
    /// delegation CPI.
    pub fn seeds(&self) -> [&[u8]; 4] {
        [PRICE_FEED_SEED, &self.provider_len, self.provider, self.symbol]
    }

    /// Seeds including the bump, for `invoke_signed`.
    pub fn signer_seeds(&self) -> [&[u8]; 5] {
        [
            PRICE_FEED_SEED,
            &self.provider_len,
            self.provider,
            self.symbol,
            &self.bump,
        ]
    }
}

/// Derive the price feed address for `(provider, symbol)`.
///
/// Any client can reproduce this without talking to the program.
pub fn derive_price_feed_address(
    program_id: &Pubkey,
    provider: &str,
    symbol: &str,
) -> Result<(Pubkey, u8), OracleError> {
    let seeds = FeedSeeds::new(provider, symbol, 0)?;
    Ok(Pubkey::find_program_address(&seeds.seeds(), program_id))
}
