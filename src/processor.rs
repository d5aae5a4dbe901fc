use borsh::BorshSerialize;
use ephemeral_rollups_sdk::cpi::{
    delegate_account, undelegate_account, DelegateAccounts, DelegateConfig,
};
use ephemeral_rollups_sdk::ephem::commit_and_undelegate_accounts;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::set_return_data,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::address::{derive_price_feed_address, FeedSeeds};
use crate::config::{OracleConfig, ORACLE_CONFIG};
use crate::instruction::{FeedKey, InitializePriceFeed, OracleInstruction, UpdatePriceFeed};
use crate::lifecycle::{Committer, Delegator, FeedLifecycle, InitializeArgs};
use crate::state::PriceFeed;
use crate::store::{ExecutionLayer, FeedCreation, PriceFeedStore, ProgramFeedAccount};

/// Dispatch an instruction against the compiled-in [`ORACLE_CONFIG`].
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    process_instruction_with_config(program_id, accounts, instruction_data, &ORACLE_CONFIG)
}

/// Dispatch an instruction against an explicit provider configuration.
pub fn process_instruction_with_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
    config: &OracleConfig,
) -> ProgramResult {
    // Unpack instruction discriminator and instruction data
    let instruction = OracleInstruction::unpack(instruction_data)?;
    let lifecycle = FeedLifecycle::new(program_id, config);

    match instruction {
        OracleInstruction::InitializePriceFeed(args) => {
            msg!("Instruction: InitializePriceFeed");
            process_initialize_price_feed(program_id, accounts, &lifecycle, args)
        }
        OracleInstruction::UpdatePriceFeed(args) => {
            msg!("Instruction: UpdatePriceFeed");
            process_update_price_feed(program_id, accounts, &lifecycle, args)
        }
        OracleInstruction::DelegatePriceFeed(key) => {
            msg!("Instruction: DelegatePriceFeed");
            process_delegate_price_feed(program_id, accounts, &lifecycle, key)
        }
        OracleInstruction::UndelegatePriceFeed(key) => {
            msg!("Instruction: UndelegatePriceFeed");
            process_undelegate_price_feed(program_id, accounts, &lifecycle, key)
        }
        OracleInstruction::ClosePriceFeed(key) => {
            msg!("Instruction: ClosePriceFeed");
            process_close_price_feed(program_id, accounts, &lifecycle, key)
        }
        OracleInstruction::Sample(args) => {
            msg!("Instruction: Sample");
            process_sample(program_id, accounts, &lifecycle, args.maximum_age_secs)
        }
        OracleInstruction::UndelegationCallback { pda_seeds } => {
            msg!("Instruction: UndelegationCallback");
            process_undelegation_callback(program_id, accounts, &lifecycle, pda_seeds)
        }
    }
}

/// Check that `price_feed` is the PDA of `(provider, symbol)`.
fn check_price_feed_address(
    program_id: &Pubkey,
    price_feed: &AccountInfo,
    provider: &str,
    symbol: &str,
) -> Result<u8, ProgramError> {
    let (price_feed_pda, bump) = derive_price_feed_address(program_id, provider, symbol)?;
    if price_feed_pda != *price_feed.key {
        msg!("Invalid seeds for PDA");
        return Err(ProgramError::InvalidArgument);
    }
    Ok(bump)
}

fn ensure_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        msg!("{} should be a signer", account.key);
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

pub fn process_initialize_price_feed(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    args: InitializePriceFeed,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let payer = next_account_info(accounts_iter)?;
    let price_feed = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    ensure_signer(payer)?;
    let bump = check_price_feed_address(program_id, price_feed, &args.provider, &args.symbol)?;

    let account = ProgramFeedAccount::new(program_id, price_feed).with_creation(FeedCreation {
        payer,
        system_program,
        seeds: FeedSeeds::new(&args.provider, &args.symbol, bump)?,
    });
    let layer = account.execution_layer()?;
    let mut store = PriceFeedStore::new(account, layer);

    lifecycle.initialize(
        &mut store,
        payer.key,
        &InitializeArgs {
            provider: args.provider.clone(),
            symbol: args.symbol.clone(),
            feed_id: args.feed_id,
            exponent: args.exponent,
        },
    )?;
    Ok(())
}

pub fn process_update_price_feed(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    args: UpdatePriceFeed,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let payer = next_account_info(accounts_iter)?;
    let price_feed = next_account_info(accounts_iter)?;

    ensure_signer(payer)?;
    check_price_feed_address(
        program_id,
        price_feed,
        &args.provider,
        &args.update_data.symbol,
    )?;

    let account = ProgramFeedAccount::new(program_id, price_feed);
    let layer = account.execution_layer()?;
    let mut store = PriceFeedStore::new(account, layer);

    let slot = Clock::get()?.slot;
    lifecycle.update(&mut store, &args.update_data, slot)?;
    Ok(())
}

/// Delegation through the delegation program CPI.
struct DelegateCpi<'a, 'info> {
    accounts: DelegateAccounts<'a, 'info>,
    config: DelegateConfig,
}

impl Delegator for DelegateCpi<'_, '_> {
    fn delegate(self, _feed: &PriceFeed, seeds: &[&[u8]]) -> ProgramResult {
        delegate_account(self.accounts, seeds, self.config)
    }
}

pub fn process_delegate_price_feed(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    key: FeedKey,
) -> ProgramResult {
    // Get accounts
    let account_info_iter = &mut accounts.iter();
    let payer = next_account_info(account_info_iter)?;
    let pda_to_delegate = next_account_info(account_info_iter)?;
    let owner_program = next_account_info(account_info_iter)?;
    let delegation_buffer = next_account_info(account_info_iter)?;
    let delegation_record = next_account_info(account_info_iter)?;
    let delegation_metadata = next_account_info(account_info_iter)?;
    let delegation_program = next_account_info(account_info_iter)?;
    let system_program = next_account_info(account_info_iter)?;
    let validator = next_account_info(account_info_iter).ok().map(|v| *v.key);

    ensure_signer(payer)?;
    check_price_feed_address(program_id, pda_to_delegate, &key.provider, &key.symbol)?;
    if owner_program.key != program_id {
        msg!("Owner program {} is not this program", owner_program.key);
        return Err(ProgramError::IncorrectProgramId);
    }

    let account = ProgramFeedAccount::new(program_id, pda_to_delegate);
    let layer = account.execution_layer()?;
    let mut store = PriceFeedStore::new(account, layer);

    let delegator = DelegateCpi {
        accounts: DelegateAccounts {
            payer,
            pda: pda_to_delegate,
            owner_program,
            buffer: delegation_buffer,
            delegation_record,
            delegation_metadata,
            delegation_program,
            system_program,
        },
        config: DelegateConfig {
            commit_frequency_ms: 30_000,
            validator,
        },
    };
    lifecycle.delegate(&mut store, payer.key, delegator)
}

/// Commit through the magic program of the ephemeral rollup.
struct CommitCpi<'a, 'info> {
    payer: &'a AccountInfo<'info>,
    price_feed: &'a AccountInfo<'info>,
    magic_program: &'a AccountInfo<'info>,
    magic_context: &'a AccountInfo<'info>,
}

impl Committer for CommitCpi<'_, '_> {
    fn commit_and_undelegate(self, _feed: &PriceFeed) -> ProgramResult {
        commit_and_undelegate_accounts(
            self.payer,
            vec![self.price_feed],
            self.magic_context,
            self.magic_program,
        )
    }
}

pub fn process_undelegate_price_feed(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    key: FeedKey,
) -> ProgramResult {
    // Get accounts
    let account_info_iter = &mut accounts.iter();
    let payer = next_account_info(account_info_iter)?;
    let price_feed = next_account_info(account_info_iter)?;
    let magic_program = next_account_info(account_info_iter)?;
    let magic_context = next_account_info(account_info_iter)?;

    ensure_signer(payer)?;
    check_price_feed_address(program_id, price_feed, &key.provider, &key.symbol)?;

    let account = ProgramFeedAccount::new(program_id, price_feed);
    let layer = account.execution_layer()?;
    let mut store = PriceFeedStore::new(account, layer);

    let committer = CommitCpi {
        payer,
        price_feed,
        magic_program,
        magic_context,
    };
    lifecycle.undelegate(&mut store, payer.key, committer)
}

pub fn process_close_price_feed(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    key: FeedKey,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let payer = next_account_info(accounts_iter)?;
    let price_feed = next_account_info(accounts_iter)?;

    ensure_signer(payer)?;
    check_price_feed_address(program_id, price_feed, &key.provider, &key.symbol)?;

    let account = ProgramFeedAccount::new(program_id, price_feed).with_recipient(payer);
    let layer = account.execution_layer()?;
    let mut store = PriceFeedStore::new(account, layer);

    lifecycle.close(&mut store, payer.key)
}

pub fn process_sample(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    maximum_age_secs: Option<u64>,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let price_feed = next_account_info(accounts_iter)?;

    let account = ProgramFeedAccount::new(program_id, price_feed);
    let layer = account.execution_layer()?;
    let store = PriceFeedStore::new(account, layer);

    let mut price = lifecycle.sample(&store)?;
    if let Some(maximum_age_secs) = maximum_age_secs {
        price = price.no_older_than(Clock::get()?.unix_timestamp, maximum_age_secs)?;
    }

    let mut data = Vec::with_capacity(32);
    price.serialize(&mut data)?;
    set_return_data(&data);
    Ok(())
}

pub fn process_undelegation_callback(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    lifecycle: &FeedLifecycle,
    pda_seeds: Vec<Vec<u8>>,
) -> ProgramResult {
    // Get accounts
    let account_info_iter = &mut accounts.iter();
    let delegated_pda = next_account_info(account_info_iter)?;
    let delegation_buffer = next_account_info(account_info_iter)?;
    let payer = next_account_info(account_info_iter)?;
    let system_program = next_account_info(account_info_iter)?;

    // CPI on Solana
    undelegate_account(
        delegated_pda,
        program_id,
        delegation_buffer,
        payer,
        system_program,
        pda_seeds,
    )?;

    let mut store = PriceFeedStore::new(
        ProgramFeedAccount::new(program_id, delegated_pda),
        ExecutionLayer::Base,
    );
    lifecycle.restore(&mut store)?;
    Ok(())
}
