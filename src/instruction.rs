// instruction.rs
use borsh::{BorshDeserialize, BorshSerialize};
use ephemeral_rollups_sdk::consts::{
    BUFFER, DELEGATION_METADATA, DELEGATION_PROGRAM_ID, DELEGATION_RECORD, MAGIC_CONTEXT_ID,
    MAGIC_PROGRAM_ID,
};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::address::derive_price_feed_address;
use crate::state::UpdateData;

pub const INITIALIZE_PRICE_FEED: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 0];
pub const UPDATE_PRICE_FEED: [u8; 8] = [1, 0, 0, 0, 0, 0, 0, 0];
pub const DELEGATE_PRICE_FEED: [u8; 8] = [2, 0, 0, 0, 0, 0, 0, 0];
pub const UNDELEGATE_PRICE_FEED: [u8; 8] = [3, 0, 0, 0, 0, 0, 0, 0];
pub const CLOSE_PRICE_FEED: [u8; 8] = [4, 0, 0, 0, 0, 0, 0, 0];
pub const SAMPLE: [u8; 8] = [5, 0, 0, 0, 0, 0, 0, 0];
/// Sent by the delegation program when a feed is handed back to the base layer.
pub const UNDELEGATION_CALLBACK: [u8; 8] = [196, 28, 41, 206, 48, 37, 51, 167];

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct InitializePriceFeed {
    pub provider: String,
    pub symbol: String,
    pub feed_id: [u8; 32],
    pub exponent: u8,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpdatePriceFeed {
    pub provider: String,
    pub update_data: UpdateData,
}

/// Payload of the delegate, undelegate and close instructions.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct FeedKey {
    pub provider: String,
    pub symbol: String,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub maximum_age_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleInstruction {
    InitializePriceFeed(InitializePriceFeed),
    UpdatePriceFeed(UpdatePriceFeed),
    DelegatePriceFeed(FeedKey),
    UndelegatePriceFeed(FeedKey),
    ClosePriceFeed(FeedKey),
    Sample(Sample),
    UndelegationCallback { pda_seeds: Vec<Vec<u8>> },
}

impl OracleInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        // Ensure the input has at least 8 bytes for the variant
        if input.len() < 8 {
            return Err(ProgramError::InvalidInstructionData);
        }

        let (ix_discriminator, rest) = input.split_at(8);
        let ix_discriminator: [u8; 8] = ix_discriminator
            .try_into()
            .map_err(|_| ProgramError::InvalidInstructionData)?;

        Ok(match ix_discriminator {
            INITIALIZE_PRICE_FEED => Self::InitializePriceFeed(decode(rest)?),
            UPDATE_PRICE_FEED => Self::UpdatePriceFeed(decode(rest)?),
            DELEGATE_PRICE_FEED => Self::DelegatePriceFeed(decode(rest)?),
            UNDELEGATE_PRICE_FEED => Self::UndelegatePriceFeed(decode(rest)?),
            CLOSE_PRICE_FEED => Self::ClosePriceFeed(decode(rest)?),
            SAMPLE => Self::Sample(decode(rest)?),
            UNDELEGATION_CALLBACK => Self::UndelegationCallback {
                pda_seeds: decode(rest)?,
            },
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let (discriminator, payload) = match self {
            Self::InitializePriceFeed(args) => (INITIALIZE_PRICE_FEED, borsh::to_vec(args)),
            Self::UpdatePriceFeed(args) => (UPDATE_PRICE_FEED, borsh::to_vec(args)),
            Self::DelegatePriceFeed(key) => (DELEGATE_PRICE_FEED, borsh::to_vec(key)),
            Self::UndelegatePriceFeed(key) => (UNDELEGATE_PRICE_FEED, borsh::to_vec(key)),
            Self::ClosePriceFeed(key) => (CLOSE_PRICE_FEED, borsh::to_vec(key)),
            Self::Sample(args) => (SAMPLE, borsh::to_vec(args)),
            Self::UndelegationCallback { pda_seeds } => {
                (UNDELEGATION_CALLBACK, borsh::to_vec(pda_seeds))
            }
        };
        let mut data = discriminator.to_vec();
        data.extend(payload.map_err(|_| ProgramError::InvalidInstructionData)?);
        Ok(data)
    }
}

fn decode<T: BorshDeserialize>(payload: &[u8]) -> Result<T, ProgramError> {
    T::try_from_slice(payload).map_err(|_| ProgramError::InvalidInstructionData)
}

/// Build `InitializePriceFeed`; the feed id is the derived feed address.
pub fn initialize_price_feed(
    program_id: &Pubkey,
    payer: &Pubkey,
    provider: &str,
    symbol: &str,
    exponent: u8,
) -> Result<Instruction, ProgramError> {
    let (price_feed, _) = derive_price_feed_address(program_id, provider, symbol)?;
    let data = OracleInstruction::InitializePriceFeed(InitializePriceFeed {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
        feed_id: price_feed.to_bytes(),
        exponent,
    })
    .pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(price_feed, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data,
    })
}

pub fn update_price_feed(
    program_id: &Pubkey,
    payer: &Pubkey,
    provider: &str,
    update_data: &UpdateData,
) -> Result<Instruction, ProgramError> {
    let (price_feed, _) = derive_price_feed_address(program_id, provider, &update_data.symbol)?;
    let data = OracleInstruction::UpdatePriceFeed(UpdatePriceFeed {
        provider: provider.to_string(),
        update_data: update_data.clone(),
    })
    .pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(price_feed, false),
        ],
        data,
    })
}

/// Build `DelegatePriceFeed`, including the delegation program's buffer,
/// record and metadata PDAs.
pub fn delegate_price_feed(
    program_id: &Pubkey,
    payer: &Pubkey,
    provider: &str,
    symbol: &str,
    validator: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    let (price_feed, _) = derive_price_feed_address(program_id, provider, symbol)?;
    let (buffer, _) = Pubkey::find_program_address(&[BUFFER, price_feed.as_ref()], program_id);
    let (delegation_record, _) = Pubkey::find_program_address(
        &[DELEGATION_RECORD, price_feed.as_ref()],
        &DELEGATION_PROGRAM_ID,
    );
    let (delegation_metadata, _) = Pubkey::find_program_address(
        &[DELEGATION_METADATA, price_feed.as_ref()],
        &DELEGATION_PROGRAM_ID,
    );

    let mut accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(price_feed, false),
        AccountMeta::new_readonly(*program_id, false),
        AccountMeta::new(buffer, false),
        AccountMeta::new(delegation_record, false),
        AccountMeta::new(delegation_metadata, false),
        AccountMeta::new_readonly(DELEGATION_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    if let Some(validator) = validator {
        accounts.push(AccountMeta::new_readonly(validator, false));
    }

    let data = OracleInstruction::DelegatePriceFeed(FeedKey {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
    })
    .pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `UndelegatePriceFeed`. Must be sent to the ephemeral rollup.
pub fn undelegate_price_feed(
    program_id: &Pubkey,
    payer: &Pubkey,
    provider: &str,
    symbol: &str,
) -> Result<Instruction, ProgramError> {
    let (price_feed, _) = derive_price_feed_address(program_id, provider, symbol)?;
    let data = OracleInstruction::UndelegatePriceFeed(FeedKey {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
    })
    .pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(price_feed, false),
            AccountMeta::new_readonly(MAGIC_PROGRAM_ID, false),
            AccountMeta::new(MAGIC_CONTEXT_ID, false),
        ],
        data,
    })
}

pub fn close_price_feed(
    program_id: &Pubkey,
    payer: &Pubkey,
    provider: &str,
    symbol: &str,
) -> Result<Instruction, ProgramError> {
    let (price_feed, _) = derive_price_feed_address(program_id, provider, symbol)?;
    let data = OracleInstruction::ClosePriceFeed(FeedKey {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
    })
    .pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(price_feed, false),
        ],
        data,
    })
}

pub fn sample(
    program_id: &Pubkey,
    price_feed: &Pubkey,
    maximum_age_secs: Option<u64>,
) -> Result<Instruction, ProgramError> {
    let data = OracleInstruction::Sample(Sample { maximum_age_secs }).pack()?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*price_feed, false)],
        data,
    })
}
