use solana_program::declare_id;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint; // where the Solana program process starts

pub mod address; // price feed PDA derivation
pub mod config; // trusted signers and aggregation algorithms
pub mod error;
pub mod instruction; // instruction discriminators, payloads and client builders
pub mod lifecycle; // feed state machine shared by both layers
pub mod processor; // account wiring and delegation CPIs
pub mod state; // on-chain price feed record
pub mod store;
pub mod verifier; // signature schemes and update validation

declare_id!("PriCems5tHihc6UDXDjzjeawomAwBduWMGAi8ZUjppd");
