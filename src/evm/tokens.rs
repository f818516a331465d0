//! Token catalog
//!
//! Lists every token the bridge can move on the active chain: the chain's
//! original tokens from the registry followed by the wrapped tokens the bridge
//! has minted, each with the connected account's balance. The list is rebuilt
//! wholesale on every refresh.

use alloy::{
    primitives::{
        utils::{parse_units, ParseUnits},
        Address, U256,
    },
    providers::Provider,
    transports::Transport,
};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::evm::client::BridgeHandle;
use crate::evm::contracts::{Bridge, PermitToken};
use crate::evm::multicall::{MulticallReader, DEFAULT_BATCH_SIZE};
use crate::registry::ChainRegistry;
use crate::types::{Token, TokenMetadata};

/// Builds token snapshots for a bridge deployment
#[derive(Debug, Clone)]
pub struct TokenCatalog {
    batch_size: usize,
    skip_unreadable: bool,
}

impl Default for TokenCatalog {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_unreadable: false,
        }
    }
}

impl TokenCatalog {
    /// `skip_unreadable` drops tokens whose name/symbol/balance cannot be read
    /// instead of failing the refresh.
    pub fn new(batch_size: usize, skip_unreadable: bool) -> Self {
        Self {
            batch_size,
            skip_unreadable,
        }
    }

    /// Snapshot all bridgeable tokens for the handle's chain and account
    pub async fn refresh(&self, handle: &BridgeHandle, registry: &ChainRegistry) -> Result<Vec<Token>> {
        let provider = handle.provider();
        let originals = registry.original_tokens(handle.chain_id());

        let tokens = self
            .refresh_with(
                &provider,
                handle.bridge_address(),
                handle.multicall_address(),
                originals,
                handle.account(),
            )
            .await?;

        info!(
            chain_id = %handle.chain_id(),
            originals = originals.len(),
            tokens = tokens.len(),
            "Token catalog refreshed"
        );
        Ok(tokens)
    }

    /// Same as [`TokenCatalog::refresh`], against an explicit provider
    pub async fn refresh_with<T, P>(
        &self,
        provider: &P,
        bridge_address: Address,
        multicall_address: Address,
        originals: &[Address],
        account: Address,
    ) -> Result<Vec<Token>>
    where
        T: Transport + Clone,
        P: Provider<T>,
    {
        let reader = MulticallReader::new(provider, multicall_address, self.batch_size);

        let wrapped = reader
            .read_array(
                bridge_address,
                Bridge::getNumberOfWrappedTokensCall {},
                |r| r.count,
                |index| Bridge::wrappedTokensAddressesCall { index },
            )
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.map(|r| r.token).ok_or_else(|| {
                    BridgeError::Connectivity(format!("wrapped token #{} could not be read", i))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let addresses = concat_addresses(originals, &wrapped);
        debug!(
            originals = originals.len(),
            wrapped = wrapped.len(),
            "Resolved catalog addresses"
        );
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let name_call = PermitToken::nameCall {};
        let symbol_call = PermitToken::symbolCall {};
        let balance_call = PermitToken::balanceOfCall { account };
        let (names, symbols, balances) = tokio::try_join!(
            reader.read_many(&addresses, &name_call),
            reader.read_many(&addresses, &symbol_call),
            reader.read_many(&addresses, &balance_call),
        )?;

        assemble_tokens(
            &addresses,
            names.into_iter().map(|r| r.map(|r| r._0)).collect(),
            symbols.into_iter().map(|r| r.map(|r| r._0)).collect(),
            balances.into_iter().map(|r| r.map(|r| r._0)).collect(),
            self.skip_unreadable,
        )
    }
}

/// Originals first (registry order), then wrapped tokens (registration order)
pub fn concat_addresses(originals: &[Address], wrapped: &[Address]) -> Vec<Address> {
    let mut addresses = Vec::with_capacity(originals.len() + wrapped.len());
    addresses.extend_from_slice(originals);
    addresses.extend_from_slice(wrapped);
    addresses
}

/// Zip per-slot reads into tokens, preserving address order
pub fn assemble_tokens(
    addresses: &[Address],
    names: Vec<Option<String>>,
    symbols: Vec<Option<String>>,
    balances: Vec<Option<U256>>,
    skip_unreadable: bool,
) -> Result<Vec<Token>> {
    if names.len() != addresses.len()
        || symbols.len() != addresses.len()
        || balances.len() != addresses.len()
    {
        return Err(BridgeError::Connectivity(
            "token batch results do not match requested addresses".into(),
        ));
    }

    let mut tokens = Vec::with_capacity(addresses.len());
    for (((address, name), symbol), balance) in addresses.iter().zip(names).zip(symbols).zip(balances)
    {
        match (name, symbol, balance) {
            (Some(name), Some(symbol), Some(balance)) => tokens.push(Token {
                name,
                symbol,
                address: *address,
                balance,
            }),
            _ if skip_unreadable => {
                warn!(token = %address, "Skipping token that does not answer ERC20 reads");
            }
            _ => {
                return Err(BridgeError::Connectivity(format!(
                    "token {} does not answer name/symbol/balanceOf",
                    address
                )));
            }
        }
    }
    Ok(tokens)
}

/// Read a single token's name and symbol
pub async fn token_metadata<T, P>(provider: &P, token: Address) -> Result<TokenMetadata>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    let contract = PermitToken::new(token, provider);
    let (name, symbol) = tokio::try_join!(
        async {
            contract
                .name()
                .call()
                .await
                .map(|r| r._0)
                .map_err(|e| BridgeError::connectivity("name()", e))
        },
        async {
            contract
                .symbol()
                .call()
                .await
                .map(|r| r._0)
                .map_err(|e| BridgeError::connectivity("symbol()", e))
        }
    )?;
    Ok(TokenMetadata { name, symbol })
}

/// Get token decimals
pub async fn token_decimals<T, P>(provider: &P, token: Address) -> Result<u8>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    PermitToken::new(token, provider)
        .decimals()
        .call()
        .await
        .map(|r| r._0)
        .map_err(|e| BridgeError::connectivity("decimals()", e))
}

/// Convert a human-readable amount ("1.5") to raw token units
///
/// Negative amounts are rejected; they would otherwise wrap to a huge `U256`.
pub fn to_token_units(amount: &str, decimals: u8) -> Result<U256> {
    let parsed = parse_units(amount, decimals)
        .map_err(|e| BridgeError::Precondition(format!("invalid amount {:?}: {}", amount, e)))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(BridgeError::Precondition(format!(
            "amount {:?} must not be negative",
            amount
        ))),
    }
}
