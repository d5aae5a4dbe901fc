use ephemeral_oracle::address::{derive_price_feed_address, PRICE_FEED_SEED};
use ephemeral_oracle::error::OracleError;
use ephemeral_oracle::instruction::{self, OracleInstruction};
use ephemeral_oracle::state::{DelegationState, PriceFeed, TemporalNumericValue};
use ephemeral_rollups_sdk::consts::{DELEGATION_PROGRAM_ID, MAGIC_PROGRAM_ID};
use solana_program::{pubkey::Pubkey, rent::Rent, system_program};
use solana_program_test::{processor, tokio, ProgramTestContext};
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction, InstructionError},
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

mod utils;

async fn delegated_feed() -> (ProgramTestContext, Pubkey) {
    let mut program_test = utils::program_test();
    program_test.add_program(
        "magicblock_delegation_program",
        DELEGATION_PROGRAM_ID,
        processor!(utils::delegate_stub),
    );
    let context = program_test.start_with_context().await;

    let payer = context.payer.pubkey();
    let (price_feed, _) = derive_price_feed_address(&utils::PROGRAM, "stork", "SOLUSD").unwrap();
    let init_ix =
        instruction::initialize_price_feed(&utils::PROGRAM, &payer, "stork", "SOLUSD", 18).unwrap();
    let delegate_ix = instruction::delegate_price_feed(
        &utils::PROGRAM,
        &payer,
        "stork",
        "SOLUSD",
        Some(Pubkey::new_unique()),
    )
    .unwrap();

    send(&context, &[init_ix, delegate_ix]).await.unwrap();
    (context, price_feed)
}

async fn send(
    context: &ProgramTestContext,
    instructions: &[Instruction],
) -> Result<(), TransactionError> {
    let tx = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &[&context.payer],
        context.last_blockhash,
    );
    context
        .banks_client
        .process_transaction(tx)
        .await
        .map_err(|e| e.unwrap())
}

fn custom(error: OracleError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

async fn read_feed(context: &ProgramTestContext, price_feed: Pubkey) -> (Pubkey, PriceFeed) {
    let account = context
        .banks_client
        .get_account(price_feed)
        .await
        .unwrap()
        .expect("price feed account must exist");
    (account.owner, PriceFeed::unpack(&account.data).unwrap())
}

fn rent_exempt(data: Vec<u8>, owner: Pubkey) -> Account {
    Account {
        lamports: Rent::default().minimum_balance(data.len()),
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

/// A `stork/SOLUSD` record of `authority`, flagged as delegated.
fn delegated_record(authority: &Pubkey) -> (Pubkey, PriceFeed) {
    let (price_feed, bump) =
        derive_price_feed_address(&utils::PROGRAM, "stork", "SOLUSD").unwrap();
    let mut feed = PriceFeed::new(
        *authority,
        "stork",
        "SOLUSD",
        price_feed.to_bytes(),
        18,
        bump,
    );
    feed.delegation_state = DelegationState::Delegated;
    (price_feed, feed)
}

#[tokio::test]
async fn delegate_price_feed() {
    let (context, price_feed) = delegated_feed().await;

    let account = context
        .banks_client
        .get_account(price_feed)
        .await
        .unwrap()
        .expect("price feed account must exist");

    assert_eq!(account.owner, DELEGATION_PROGRAM_ID);
    assert_eq!(account.data.len(), PriceFeed::LEN);
    assert!(account.data.iter().all(|byte| *byte == 0));
}

#[tokio::test]
async fn delegated_feed_is_read_only_on_base() {
    let (context, price_feed) = delegated_feed().await;
    let payer = context.payer.pubkey();

    let update_data = utils::stork_update(&price_feed, "SOLUSD", 1000, 1_000_000);
    let update_ix =
        instruction::update_price_feed(&utils::PROGRAM, &payer, "stork", &update_data).unwrap();
    assert_eq!(
        send(&context, &[update_ix]).await,
        Err(custom(OracleError::WrongOwner))
    );

    let delegate_ix =
        instruction::delegate_price_feed(&utils::PROGRAM, &payer, "stork", "SOLUSD", None)
            .unwrap();
    assert_eq!(
        send(&context, &[delegate_ix]).await,
        Err(custom(OracleError::AlreadyDelegated))
    );

    let close_ix =
        instruction::close_price_feed(&utils::PROGRAM, &payer, "stork", "SOLUSD").unwrap();
    assert_eq!(
        send(&context, &[close_ix]).await,
        Err(custom(OracleError::MustUndelegateFirst))
    );
}

#[tokio::test]
async fn undelegate_requires_delegation() {
    let context = utils::program_test().start_with_context().await;
    let payer = context.payer.pubkey();

    let init_ix =
        instruction::initialize_price_feed(&utils::PROGRAM, &payer, "stork", "SOLUSD", 18).unwrap();
    let undelegate_ix =
        instruction::undelegate_price_feed(&utils::PROGRAM, &payer, "stork", "SOLUSD").unwrap();

    assert_eq!(
        send(&context, &[init_ix, undelegate_ix]).await,
        Err(TransactionError::InstructionError(
            1,
            InstructionError::Custom(OracleError::NotDelegated as u32)
        ))
    );
}

#[tokio::test]
async fn delegated_feed_is_writable_in_the_rollup() {
    let authority = Keypair::new();
    let (price_feed, feed) = delegated_record(&authority.pubkey());

    // The rollup clones the feed with this program as owner.
    let mut program_test = utils::program_test();
    program_test.add_program(
        "magic_program",
        MAGIC_PROGRAM_ID,
        processor!(utils::delegate_stub),
    );
    program_test.add_account(
        price_feed,
        rent_exempt(borsh::to_vec(&feed).unwrap(), utils::PROGRAM),
    );
    program_test.add_account(
        authority.pubkey(),
        Account::new(1_000_000_000, 0, &system_program::ID),
    );
    let context = program_test.start_with_context().await;

    let update_data = utils::stork_update(&price_feed, "SOLUSD", 1000, 1_000_000);
    let update_ix = instruction::update_price_feed(
        &utils::PROGRAM,
        &context.payer.pubkey(),
        "stork",
        &update_data,
    )
    .unwrap();
    send(&context, &[update_ix]).await.unwrap();

    let (owner, updated) = read_feed(&context, price_feed).await;
    assert_eq!(owner, utils::PROGRAM);
    assert_eq!(updated.delegation_state, DelegationState::Delegated);
    assert_eq!(updated.temporal_numeric_value.quantized_value, 1_000_000);

    let intruder_ix = instruction::undelegate_price_feed(
        &utils::PROGRAM,
        &context.payer.pubkey(),
        "stork",
        "SOLUSD",
    )
    .unwrap();
    assert_eq!(
        send(&context, &[intruder_ix]).await,
        Err(custom(OracleError::Unauthorized))
    );

    let undelegate_ix =
        instruction::undelegate_price_feed(&utils::PROGRAM, &authority.pubkey(), "stork", "SOLUSD")
            .unwrap();
    let tx = Transaction::new_signed_with_payer(
        &[undelegate_ix],
        Some(&context.payer.pubkey()),
        &[&context.payer, &authority],
        context.last_blockhash,
    );
    context.banks_client.process_transaction(tx).await.unwrap();

    let (_, undelegated) = read_feed(&context, price_feed).await;
    assert_eq!(undelegated.delegation_state, DelegationState::BaseOwned);
    assert_eq!(
        undelegated.temporal_numeric_value,
        updated.temporal_numeric_value
    );
    assert_eq!(undelegated.signature, update_data.signature());
}

#[tokio::test]
async fn undelegation_callback_restores_the_feed() {
    let authority = Keypair::new();
    let (price_feed, mut committed) = delegated_record(&authority.pubkey());
    committed.temporal_numeric_value = TemporalNumericValue {
        timestamp_ns: 2000,
        quantized_value: 2_000_000,
    };

    // The delegation program hands the committed record back through a buffer.
    let buffer = Keypair::new();
    let mut program_test = utils::program_test();
    program_test.add_account(
        buffer.pubkey(),
        rent_exempt(borsh::to_vec(&committed).unwrap(), DELEGATION_PROGRAM_ID),
    );
    let context = program_test.start_with_context().await;
    let payer = context.payer.pubkey();

    let pda_seeds = vec![
        PRICE_FEED_SEED.to_vec(),
        vec![b"stork".len() as u8],
        b"stork".to_vec(),
        b"SOLUSD".to_vec(),
    ];
    let callback_ix = Instruction {
        program_id: utils::PROGRAM,
        accounts: vec![
            AccountMeta::new(price_feed, false),
            AccountMeta::new_readonly(buffer.pubkey(), true),
            AccountMeta::new(payer, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: OracleInstruction::UndelegationCallback { pda_seeds }
            .pack()
            .unwrap(),
    };
    let tx = Transaction::new_signed_with_payer(
        &[callback_ix],
        Some(&payer),
        &[&context.payer, &buffer],
        context.last_blockhash,
    );
    context.banks_client.process_transaction(tx).await.unwrap();

    let (owner, restored) = read_feed(&context, price_feed).await;
    assert_eq!(owner, utils::PROGRAM);
    assert_eq!(restored.delegation_state, DelegationState::BaseOwned);
    assert_eq!(restored.temporal_numeric_value.quantized_value, 2_000_000);
    assert_eq!(restored.authority, authority.pubkey());

    // Writable again on the base layer.
    let update_data = utils::stork_update(&price_feed, "SOLUSD", 3000, 3_000_000);
    let update_ix =
        instruction::update_price_feed(&utils::PROGRAM, &payer, "stork", &update_data).unwrap();
    send(&context, &[update_ix]).await.unwrap();
    let (_, updated) = read_feed(&context, price_feed).await;
    assert_eq!(updated.temporal_numeric_value.quantized_value, 3_000_000);
}
