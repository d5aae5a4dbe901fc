#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ed25519_dalek::Signer as _;
use ephemeral_oracle::config::{
    OracleConfig, ProviderConfig, PYTH_LAZER_ALG_HASH, PYTH_LAZER_FORMAT_TAG,
    PYTH_LAZER_PROVIDER, STORK_MEDIAN_V1_ALG_HASH, STORK_PROVIDER,
};
use ephemeral_oracle::lifecycle::{Committer, Delegator};
use ephemeral_oracle::processor::process_instruction_with_config;
use ephemeral_oracle::state::{PriceFeed, TemporalNumericValue, UpdateData};
use ephemeral_oracle::store::FeedAccount;
use ephemeral_oracle::verifier::{
    eth_signed_message_hash, evm_address, stork_message_hash, Ed25519Scheme, Secp256k1EvmScheme,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, program_error::ProgramError,
    pubkey::Pubkey,
};
use solana_program_test::{processor, ProgramTest};

pub const PROGRAM: Pubkey = Pubkey::new_from_array([7u8; 32]);

const STORK_SECRET: [u8; 32] = [0x11; 32];
const LAZER_SECRET: [u8; 32] = [0x22; 32];

pub fn stork_signing_key() -> k256::ecdsa::SigningKey {
    k256::ecdsa::SigningKey::from_bytes(&STORK_SECRET.into()).unwrap()
}

pub fn stork_signer() -> [u8; 20] {
    let point = stork_signing_key().verifying_key().to_encoded_point(false);
    let public_key: [u8; 64] = point.as_bytes()[1..].try_into().unwrap();
    evm_address(&public_key)
}

pub fn lazer_signing_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::from_bytes(&LAZER_SECRET)
}

pub fn lazer_signer() -> [u8; 32] {
    lazer_signing_key().verifying_key().to_bytes()
}

/// Sign `update` in place the way a Stork publisher does.
pub fn sign_stork(update: &mut UpdateData) {
    let digest = eth_signed_message_hash(&stork_message_hash(&stork_signer(), update));
    let (signature, recovery_id) = stork_signing_key()
        .sign_prehash_recoverable(&digest)
        .unwrap();
    let bytes = signature.to_bytes();
    update.r.copy_from_slice(&bytes[..32]);
    update.s.copy_from_slice(&bytes[32..]);
    update.v = recovery_id.to_byte() + 27;
}

/// Sign `update` in place the way Pyth Lazer does.
pub fn sign_lazer(update: &mut UpdateData) {
    update.v = PYTH_LAZER_FORMAT_TAG;
    let signature = lazer_signing_key().sign(&update.canonical_bytes().unwrap()).to_bytes();
    update.r.copy_from_slice(&signature[..32]);
    update.s.copy_from_slice(&signature[32..]);
}

pub fn stork_update(
    feed: &Pubkey,
    symbol: &str,
    timestamp_ns: u64,
    quantized_value: i128,
) -> UpdateData {
    let mut update = UpdateData {
        symbol: symbol.to_string(),
        id: feed.to_bytes(),
        temporal_numeric_value: TemporalNumericValue {
            timestamp_ns,
            quantized_value,
        },
        publisher_merkle_root: [3; 32],
        value_compute_alg_hash: STORK_MEDIAN_V1_ALG_HASH,
        ..UpdateData::default()
    };
    sign_stork(&mut update);
    update
}

pub fn lazer_update(
    feed: &Pubkey,
    symbol: &str,
    timestamp_ns: u64,
    quantized_value: i128,
) -> UpdateData {
    let mut update = UpdateData {
        symbol: symbol.to_string(),
        id: feed.to_bytes(),
        temporal_numeric_value: TemporalNumericValue {
            timestamp_ns,
            quantized_value,
        },
        value_compute_alg_hash: PYTH_LAZER_ALG_HASH,
        ..UpdateData::default()
    };
    sign_lazer(&mut update);
    update
}

/// Run `f` against a configuration that trusts the test signers.
pub fn with_test_config<R>(f: impl FnOnce(&OracleConfig) -> R) -> R {
    let stork = stork_signer();
    let lazer = lazer_signer();
    let lazer_scheme = Ed25519Scheme {
        format_tag: PYTH_LAZER_FORMAT_TAG,
    };
    let providers = [
        ProviderConfig {
            name: STORK_PROVIDER,
            scheme: &Secp256k1EvmScheme,
            signer: &stork,
            algorithms: &[STORK_MEDIAN_V1_ALG_HASH],
        },
        ProviderConfig {
            name: PYTH_LAZER_PROVIDER,
            scheme: &lazer_scheme,
            signer: &lazer,
            algorithms: &[PYTH_LAZER_ALG_HASH],
        },
    ];
    f(&OracleConfig {
        providers: &providers,
    })
}

/// Program processor for `ProgramTest` that trusts the test signers.
pub fn process_with_test_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    with_test_config(|config| {
        process_instruction_with_config(program_id, accounts, instruction_data, config)
    })
}

/// The oracle program running natively with [`process_with_test_config`].
pub fn program_test() -> ProgramTest {
    let mut program_test = ProgramTest::new(
        "ephemeral_oracle",
        PROGRAM,
        processor!(process_with_test_config),
    );
    program_test.prefer_bpf(false);
    program_test
}

pub fn delegate_stub(
    _program_id: &Pubkey,
    _accounts: &[AccountInfo],
    _data: &[u8],
) -> ProgramResult {
    Ok(())
}

/// Feed records of one execution layer, keyed by address.
pub type Ledger = Rc<RefCell<BTreeMap<Pubkey, PriceFeed>>>;

pub fn ledger() -> Ledger {
    Rc::new(RefCell::new(BTreeMap::new()))
}

/// A feed stored in an in-memory [`Ledger`].
pub struct LedgerAccount {
    pub address: Pubkey,
    pub ledger: Ledger,
}

impl FeedAccount for LedgerAccount {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn load(&self) -> Result<Option<PriceFeed>, ProgramError> {
        Ok(self.ledger.borrow().get(&self.address).cloned())
    }

    fn allocate(&mut self, feed: &PriceFeed) -> Result<(), ProgramError> {
        self.store(feed)
    }

    fn store(&mut self, feed: &PriceFeed) -> Result<(), ProgramError> {
        self.ledger.borrow_mut().insert(self.address, feed.clone());
        Ok(())
    }

    fn release(&mut self) -> Result<(), ProgramError> {
        self.ledger.borrow_mut().remove(&self.address);
        Ok(())
    }
}

/// Clones a delegated feed into the ephemeral ledger.
pub struct CloneToEphemeral {
    pub address: Pubkey,
    pub ephemeral: Ledger,
}

impl Delegator for CloneToEphemeral {
    fn delegate(self, feed: &PriceFeed, _seeds: &[&[u8]]) -> Result<(), ProgramError> {
        self.ephemeral
            .borrow_mut()
            .insert(self.address, feed.clone());
        Ok(())
    }
}

/// Flushes the ephemeral record back to the base ledger.
pub struct CommitToBase {
    pub address: Pubkey,
    pub base: Ledger,
    pub ephemeral: Ledger,
}

impl Committer for CommitToBase {
    fn commit_and_undelegate(self, feed: &PriceFeed) -> Result<(), ProgramError> {
        self.base.borrow_mut().insert(self.address, feed.clone());
        self.ephemeral.borrow_mut().remove(&self.address);
        Ok(())
    }
}

/// A delegation layer that is unavailable.
pub struct Unreachable;

impl Delegator for Unreachable {
    fn delegate(self, _feed: &PriceFeed, _seeds: &[&[u8]]) -> Result<(), ProgramError> {
        Err(ProgramError::Custom(42))
    }
}

impl Committer for Unreachable {
    fn commit_and_undelegate(self, _feed: &PriceFeed) -> Result<(), ProgramError> {
        Err(ProgramError::Custom(42))
    }
}
