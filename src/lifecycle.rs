// lifecycle.rs
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::address::{derive_price_feed_address, FeedSeeds};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::state::{DelegationState, Price, PriceFeed, UpdateData};
use crate::store::{ExecutionLayer, FeedAccount, PriceFeedStore};
use crate::verifier::verify_update;

/// Hands a feed over to the delegation program.
pub trait Delegator {
    fn delegate(self, feed: &PriceFeed, seeds: &[&[u8]]) -> Result<(), ProgramError>;
}

/// Commits a delegated feed back to the base layer and ends the delegation.
pub trait Committer {
    fn commit_and_undelegate(self, feed: &PriceFeed) -> Result<(), ProgramError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializeArgs {
    pub provider: String,
    pub symbol: String,
    pub feed_id: [u8; 32],
    pub exponent: u8,
}

/// Drives the state machine of a price feed:
/// `Uninitialized -> BaseOwned <-> Delegated`, `BaseOwned -> Closed`.
///
/// The same transitions run on both layers; only the ownership check
/// depends on the store's [`ExecutionLayer`].
pub struct FeedLifecycle<'c> {
    program_id: &'c Pubkey,
    config: &'c OracleConfig<'c>,
}

impl<'c> FeedLifecycle<'c> {
    pub fn new(program_id: &'c Pubkey, config: &'c OracleConfig<'c>) -> Self {
        Self { program_id, config }
    }

    pub fn initialize<A: FeedAccount>(
        &self,
        store: &mut PriceFeedStore<A>,
        authority: &Pubkey,
        args: &InitializeArgs,
    ) -> Result<PriceFeed, ProgramError> {
        let (address, bump) =
            derive_price_feed_address(self.program_id, &args.provider, &args.symbol)?;
        if address != store.address() {
            msg!("Invalid seeds for price feed {}", store.address());
            return Err(OracleError::InvalidArgument.into());
        }
        if store.layer() != ExecutionLayer::Base {
            return Err(OracleError::WrongOwner.into());
        }
        if self.config.provider(&args.provider).is_none() {
            msg!("No verification strategy for provider {}", args.provider);
            return Err(OracleError::UnknownProvider.into());
        }
        if args.feed_id != address.to_bytes() {
            return Err(OracleError::IdentityMismatch.into());
        }

        let feed = store.create(PriceFeed::new(
            *authority,
            &args.provider,
            &args.symbol,
            args.feed_id,
            args.exponent,
            bump,
        ))?;
        msg!(
            "Price feed {} initialized for {}/{} with exponent {}",
            address,
            args.provider,
            args.symbol,
            args.exponent
        );
        Ok(feed)
    }

    pub fn update<A: FeedAccount>(
        &self,
        store: &mut PriceFeedStore<A>,
        update: &UpdateData,
        slot: u64,
    ) -> Result<PriceFeed, ProgramError> {
        let address = store.address();
        let feed = store.write(|feed| {
            let validated = verify_update(self.config, &address, feed, update)?;
            validated.apply(feed, slot);
            Ok(())
        })?;
        msg!("Price: {}", feed.temporal_numeric_value.quantized_value);
        msg!("Exponent: {}", feed.exponent);
        Ok(feed)
    }

    pub fn delegate<A: FeedAccount, D: Delegator>(
        &self,
        store: &mut PriceFeedStore<A>,
        authority: &Pubkey,
        delegator: D,
    ) -> Result<(), ProgramError> {
        let previous = store.read()?;
        if previous.is_delegated() {
            return Err(OracleError::AlreadyDelegated.into());
        }
        if store.layer() != ExecutionLayer::Base {
            return Err(OracleError::WrongOwner.into());
        }
        ensure_authority(&previous, authority)?;

        let mut feed = previous.clone();
        feed.delegation_state = DelegationState::Delegated;
        store.replace(&feed)?;

        let seeds = FeedSeeds::new(feed.provider()?, feed.symbol()?, feed.bump)?;
        if let Err(e) = delegator.delegate(&feed, &seeds.seeds()) {
            store.replace(&previous)?;
            return Err(e);
        }
        msg!("Price feed {} delegated", store.address());
        Ok(())
    }

    pub fn undelegate<A: FeedAccount, C: Committer>(
        &self,
        store: &mut PriceFeedStore<A>,
        authority: &Pubkey,
        committer: C,
    ) -> Result<(), ProgramError> {
        let previous = store.read()?;
        if !previous.is_delegated() {
            return Err(OracleError::NotDelegated.into());
        }
        if store.layer() != ExecutionLayer::Ephemeral {
            return Err(OracleError::WrongOwner.into());
        }
        ensure_authority(&previous, authority)?;

        let mut feed = previous.clone();
        feed.delegation_state = DelegationState::BaseOwned;
        store.replace(&feed)?;

        if let Err(e) = committer.commit_and_undelegate(&feed) {
            store.replace(&previous)?;
            return Err(e);
        }
        msg!("Price feed {} undelegated", store.address());
        Ok(())
    }

    /// Finish an undelegation on the base layer once the committed record
    /// has been copied back. A record committed while still flagged as
    /// delegated is handed back to the base layer.
    pub fn restore<A: FeedAccount>(
        &self,
        store: &mut PriceFeedStore<A>,
    ) -> Result<PriceFeed, ProgramError> {
        let mut feed = store.read()?;
        if feed.is_delegated() {
            feed.delegation_state = DelegationState::BaseOwned;
            store.replace(&feed)?;
        }
        msg!("Price feed {} restored to the base layer", store.address());
        Ok(feed)
    }

    pub fn close<A: FeedAccount>(
        &self,
        store: &mut PriceFeedStore<A>,
        authority: &Pubkey,
    ) -> Result<(), ProgramError> {
        let feed = store.read()?;
        if feed.is_delegated() {
            return Err(OracleError::MustUndelegateFirst.into());
        }
        if store.layer() != ExecutionLayer::Base {
            return Err(OracleError::WrongOwner.into());
        }
        ensure_authority(&feed, authority)?;
        store.destroy()
    }

    pub fn sample<A: FeedAccount>(&self, store: &PriceFeedStore<A>) -> Result<Price, ProgramError> {
        let price = store.read()?.price();
        msg!(
            "The price is {} * 10^-{}",
            price.quantized_value,
            price.exponent
        );
        msg!("The price is: {}", price.to_f64());
        Ok(price)
    }
}

fn ensure_authority(feed: &PriceFeed, authority: &Pubkey) -> Result<(), ProgramError> {
    if feed.authority != *authority {
        msg!("{} is not the authority of this price feed", authority);
        return Err(OracleError::Unauthorized.into());
    }
    Ok(())
}
