// config.rs
use crate::verifier::{Ed25519Scheme, Secp256k1EvmScheme, SignatureScheme};

pub const STORK_PROVIDER: &str = "stork";
pub const PYTH_LAZER_PROVIDER: &str = "pyth-lazer";

/// EVM address of the Stork aggregate signer, 0x0a803F9b1CCe32e2773e0d2e98b37E0775cA5d44.
pub const STORK_EVM_SIGNER: [u8; 20] = [
    0x0a, 0x80, 0x3f, 0x9b, 0x1c, 0xce, 0x32, 0xe2, 0x77, 0x3e, 0x0d, 0x2e, 0x98, 0xb3, 0x7e,
    0x07, 0x75, 0xca, 0x5d, 0x44,
];

/// Pyth Lazer signer, HaXscpSUcbCLSnPQB8Z7H6idyANxp1mZAXTbHeYpfrJJ.
pub const PYTH_LAZER_SIGNER: [u8; 32] = [
    0xf6, 0x52, 0x10, 0xbe, 0xe4, 0xfc, 0xf5, 0xb1, 0xce, 0xe1, 0xe5, 0x37, 0xfa, 0xbc, 0xfd,
    0x95, 0x01, 0x02, 0x97, 0x65, 0x3b, 0x94, 0xaf, 0x04, 0xd4, 0x54, 0xfc, 0x47, 0x3e, 0x94,
    0x83, 0x4f,
];

/// `v` value carried by Pyth Lazer updates.
pub const PYTH_LAZER_FORMAT_TAG: u8 = 4;

/// Stork `median` v1 calculation checksum.
pub const STORK_MEDIAN_V1_ALG_HASH: [u8; 32] = [
    0x9b, 0xe7, 0xe9, 0xf9, 0xed, 0x45, 0x94, 0x17, 0xd9, 0x61, 0x12, 0xa7, 0x46, 0x7b, 0xd0,
    0xb2, 0x75, 0x75, 0xa2, 0xc7, 0x84, 0x71, 0x95, 0xc6, 0x8f, 0x80, 0x5b, 0x70, 0xce, 0x17,
    0x95, 0xba,
];

/// Pyth Lazer payloads carry no algorithm commitment.
pub const PYTH_LAZER_ALG_HASH: [u8; 32] = [0; 32];

/// One trusted data provider and the aggregation algorithms it publishes.
pub struct ProviderConfig<'a> {
    pub name: &'a str,
    pub scheme: &'a dyn SignatureScheme,
    pub signer: &'a [u8],
    pub algorithms: &'a [[u8; 32]],
}

impl ProviderConfig<'_> {
    pub fn supports_algorithm(&self, hash: &[u8; 32]) -> bool {
        self.algorithms.contains(hash)
    }
}

/// Read-only program configuration: who may sign for which provider.
pub struct OracleConfig<'a> {
    pub providers: &'a [ProviderConfig<'a>],
}

impl<'a> OracleConfig<'a> {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig<'a>> {
        self.providers.iter().find(|provider| provider.name == name)
    }
}

pub const ORACLE_CONFIG: OracleConfig<'static> = OracleConfig {
    providers: &[
        ProviderConfig {
            name: STORK_PROVIDER,
            scheme: &Secp256k1EvmScheme,
            signer: &STORK_EVM_SIGNER,
            algorithms: &[STORK_MEDIAN_V1_ALG_HASH],
        },
        ProviderConfig {
            name: PYTH_LAZER_PROVIDER,
            scheme: &Ed25519Scheme {
                format_tag: PYTH_LAZER_FORMAT_TAG,
            },
            signer: &PYTH_LAZER_SIGNER,
            algorithms: &[PYTH_LAZER_ALG_HASH],
        },
    ],
};
