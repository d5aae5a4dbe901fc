// store.rs
use borsh::BorshSerialize;
use ephemeral_rollups_sdk::consts::DELEGATION_PROGRAM_ID;
use solana_program::{
    account_info::AccountInfo,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{rent::Rent, Sysvar},
};

use crate::address::FeedSeeds;
use crate::error::OracleError;
use crate::state::{DelegationState, PriceFeed};

/// Execution layer a transition is being processed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionLayer {
    Base,
    Ephemeral,
}

impl ExecutionLayer {
    /// Whether this layer holds write access for a feed in `state`.
    pub fn owns(self, state: DelegationState) -> bool {
        matches!(
            (self, state),
            (ExecutionLayer::Base, DelegationState::BaseOwned)
                | (ExecutionLayer::Ephemeral, DelegationState::Delegated)
        )
    }
}

/// Raw persistence of one price feed record.
pub trait FeedAccount {
    fn address(&self) -> Pubkey;

    /// `None` when nothing has been created at this address.
    fn load(&self) -> Result<Option<PriceFeed>, ProgramError>;

    /// Create the account and write its first record.
    fn allocate(&mut self, feed: &PriceFeed) -> Result<(), ProgramError>;

    fn store(&mut self, feed: &PriceFeed) -> Result<(), ProgramError>;

    /// Destroy the account and reclaim its storage.
    fn release(&mut self) -> Result<(), ProgramError>;
}

/// A price feed as seen from one execution layer.
pub struct PriceFeedStore<A> {
    account: A,
    layer: ExecutionLayer,
}

impl<A: FeedAccount> PriceFeedStore<A> {
    pub fn new(account: A, layer: ExecutionLayer) -> Self {
        Self { account, layer }
    }

    pub fn layer(&self) -> ExecutionLayer {
        self.layer
    }

    pub fn address(&self) -> Pubkey {
        self.account.address()
    }

    pub fn create(&mut self, feed: PriceFeed) -> Result<PriceFeed, ProgramError> {
        if self.account.load()?.is_some() {
            return Err(OracleError::AlreadyExists.into());
        }
        self.account.allocate(&feed)?;
        Ok(feed)
    }

    pub fn read(&self) -> Result<PriceFeed, ProgramError> {
        self.account
            .load()?
            .ok_or_else(|| OracleError::NotFound.into())
    }

    /// Apply `mutator` to the record and persist it, provided this layer
    /// currently owns the feed. Nothing is written if the mutator fails.
    pub fn write<F>(&mut self, mutator: F) -> Result<PriceFeed, ProgramError>
    where
        F: FnOnce(&mut PriceFeed) -> Result<(), ProgramError>,
    {
        let mut feed = self.read()?;
        if !self.layer.owns(feed.delegation_state) {
            msg!(
                "{:?} layer cannot write a {:?} feed",
                self.layer,
                feed.delegation_state
            );
            return Err(OracleError::WrongOwner.into());
        }
        mutator(&mut feed)?;
        self.account.store(&feed)?;
        Ok(feed)
    }

    /// Persist `feed` without the ownership check. Used by ownership
    /// transitions, which check the state themselves.
    pub(crate) fn replace(&mut self, feed: &PriceFeed) -> Result<(), ProgramError> {
        self.account.store(feed)
    }

    pub(crate) fn destroy(&mut self) -> Result<(), ProgramError> {
        self.account.release()
    }
}

/// Signer seeds needed to create the feed PDA.
pub struct FeedCreation<'a, 'info> {
    pub payer: &'a AccountInfo<'info>,
    pub system_program: &'a AccountInfo<'info>,
    pub seeds: FeedSeeds<'a>,
}

/// A price feed backed by a Solana account.
pub struct ProgramFeedAccount<'a, 'info> {
    program_id: &'a Pubkey,
    account: &'a AccountInfo<'info>,
    /// Receives the rent when the feed is closed.
    recipient: Option<&'a AccountInfo<'info>>,
    creation: Option<FeedCreation<'a, 'info>>,
}

impl<'a, 'info> ProgramFeedAccount<'a, 'info> {
    pub fn new(program_id: &'a Pubkey, account: &'a AccountInfo<'info>) -> Self {
        Self {
            program_id,
            account,
            recipient: None,
            creation: None,
        }
    }

    pub fn with_creation(mut self, creation: FeedCreation<'a, 'info>) -> Self {
        self.creation = Some(creation);
        self
    }

    pub fn with_recipient(mut self, recipient: &'a AccountInfo<'info>) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Resolve the layer this instruction runs on from the account itself.
    ///
    /// On the base layer a delegated feed is owned by the delegation program.
    /// A feed owned by this program that is flagged as delegated is only
    /// writable inside the ephemeral rollup.
    pub fn execution_layer(&self) -> Result<ExecutionLayer, ProgramError> {
        if *self.account.owner == DELEGATION_PROGRAM_ID {
            return Ok(ExecutionLayer::Base);
        }
        match self.load()? {
            Some(feed) if feed.is_delegated() => Ok(ExecutionLayer::Ephemeral),
            _ => Ok(ExecutionLayer::Base),
        }
    }
}

impl FeedAccount for ProgramFeedAccount<'_, '_> {
    fn address(&self) -> Pubkey {
        *self.account.key
    }

    fn load(&self) -> Result<Option<PriceFeed>, ProgramError> {
        if self.account.lamports() == 0 || self.account.data_is_empty() {
            return Ok(None);
        }
        if self.account.owner != self.program_id && *self.account.owner != DELEGATION_PROGRAM_ID {
            msg!("Price feed {} has unexpected owner {}", self.account.key, self.account.owner);
            return Err(ProgramError::IncorrectProgramId);
        }
        let data = self.account.try_borrow_data()?;
        let mut feed = PriceFeed::unpack(&data).map_err(|_| ProgramError::InvalidAccountData)?;
        // The delegation program owns the base-layer copy while it is delegated.
        if *self.account.owner == DELEGATION_PROGRAM_ID {
            feed.delegation_state = DelegationState::Delegated;
        }
        Ok(Some(feed))
    }

    fn allocate(&mut self, feed: &PriceFeed) -> Result<(), ProgramError> {
        let creation = self
            .creation
            .as_ref()
            .ok_or(ProgramError::NotEnoughAccountKeys)?;

        let rent_lamports = Rent::get()?.minimum_balance(PriceFeed::LEN);
        msg!(
            "Initializing price feed {} with {} lamports",
            self.account.key,
            rent_lamports
        );
        invoke_signed(
            &system_instruction::create_account(
                creation.payer.key,
                self.account.key,
                rent_lamports,
                PriceFeed::LEN as u64,
                self.program_id,
            ),
            &[
                creation.payer.clone(),
                self.account.clone(),
                creation.system_program.clone(),
            ],
            &[&creation.seeds.signer_seeds()],
        )?;

        self.store(feed)
    }

    fn store(&mut self, feed: &PriceFeed) -> Result<(), ProgramError> {
        feed.serialize(&mut &mut self.account.try_borrow_mut_data()?[..])?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ProgramError> {
        let recipient = self.recipient.ok_or(ProgramError::NotEnoughAccountKeys)?;

        let lamports = self.account.lamports();
        let refunded = recipient
            .lamports()
            .checked_add(lamports)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        **recipient.try_borrow_mut_lamports()? = refunded;
        **self.account.try_borrow_mut_lamports()? = 0;

        self.account.try_borrow_mut_data()?.fill(0);
        self.account.resize(0)?;
        self.account.assign(&system_program::ID);
        msg!(
            "Closed price feed {}, refunded {} lamports",
            self.account.key,
            lamports
        );
        Ok(())
    }
}
