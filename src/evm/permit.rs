//! Token spending authorization
//!
//! Decides per token whether the bridge can pull funds with an ERC-2612 permit
//! signature (no extra transaction) or needs a classic `approve` first.
//!
//! Permit support is resolved by introspecting the token's interface: the
//! runtime bytecode (or, behind an EIP-1967 proxy, the implementation's
//! bytecode) must dispatch the `permit` selector. A token that does not is an
//! approve-path token. A token that does must also answer `nonces(owner)` and
//! `DOMAIN_SEPARATOR()` consistently with the domain we sign under; if it
//! doesn't, the probe fails and the error propagates. Path selection never
//! depends on the text of an RPC error.

use alloy::{
    primitives::{b256, Address, Bytes, B256, U256},
    providers::Provider,
    signers::local::PrivateKeySigner,
    sol_types::{Eip712Domain, SolCall},
    transports::Transport,
};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::evm::contracts::{PermitToken, Signature};
use crate::evm::signer::{sign_permit, DomainIdentity};
use crate::types::ChainId;

/// `permit(address,address,uint256,uint256,uint8,bytes32,bytes32)`
pub const PERMIT_SELECTOR: [u8; 4] = PermitToken::permitCall::SELECTOR;

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// Whether a token's interface exposes `permit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitCapability {
    Supported,
    Unsupported,
}

/// How the bridge will be allowed to move the depositor's tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Signed ERC-2612 permit, embedded in the deposit payload
    Permit(Signature),
    /// Separate `approve(bridge, amount)` transaction before the deposit
    Approve,
}

impl Authorization {
    pub fn is_permit(&self) -> bool {
        matches!(self, Authorization::Permit(_))
    }
}

/// Scan runtime bytecode for a function selector pushed by the dispatcher
///
/// Walks opcodes so PUSH immediates are never misread as instructions. Selectors
/// with leading zero bytes may be pushed with a narrower PUSH, so any PUSH1..PUSH4
/// whose value equals the selector counts.
pub fn bytecode_exposes_selector(code: &[u8], selector: [u8; 4]) -> bool {
    let wanted = u32::from_be_bytes(selector);
    let mut i = 0;

    while i < code.len() {
        let op = code[i];
        if (0x60..=0x7f).contains(&op) {
            let width = (op - 0x5f) as usize;
            let end = i + 1 + width;
            if width <= 4 && end <= code.len() {
                let value = code[i + 1..end]
                    .iter()
                    .fold(0u32, |acc, b| (acc << 8) | *b as u32);
                if value == wanted {
                    return true;
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    false
}

/// Classify a token from its bytecode and, for proxies, its implementation's bytecode
pub fn classify_capability(
    token: Address,
    code: &[u8],
    implementation_code: Option<&[u8]>,
) -> Result<PermitCapability> {
    if code.is_empty() {
        return Err(BridgeError::probe(token, "no contract deployed at token address"));
    }
    if bytecode_exposes_selector(code, PERMIT_SELECTOR) {
        return Ok(PermitCapability::Supported);
    }
    match implementation_code {
        Some(impl_code) if bytecode_exposes_selector(impl_code, PERMIT_SELECTOR) => {
            Ok(PermitCapability::Supported)
        }
        _ => Ok(PermitCapability::Unsupported),
    }
}

/// Reject a permit domain that would not reproduce the token's separator
pub fn verify_domain(token: Address, domain: &Eip712Domain, onchain: B256) -> Result<()> {
    let local = domain.separator();
    if local != onchain {
        return Err(BridgeError::probe(
            token,
            format!(
                "DOMAIN_SEPARATOR mismatch (token {}, computed {})",
                onchain, local
            ),
        ));
    }
    Ok(())
}

/// Decode the implementation address stored in an EIP-1967 slot value
pub fn implementation_from_slot(value: U256) -> Option<Address> {
    if value.is_zero() {
        return None;
    }
    Some(Address::from_word(B256::from(value.to_be_bytes::<32>())))
}

/// Picks and produces the authorization for a deposit
pub struct AuthorizationNegotiator<'a, T, P> {
    provider: &'a P,
    signer: &'a PrivateKeySigner,
    chain_id: ChainId,
    _transport: std::marker::PhantomData<fn() -> T>,
}

impl<'a, T, P> AuthorizationNegotiator<'a, T, P>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(provider: &'a P, signer: &'a PrivateKeySigner, chain_id: ChainId) -> Self {
        Self {
            provider,
            signer,
            chain_id,
            _transport: std::marker::PhantomData,
        }
    }

    /// Permit signature if the token supports it, otherwise the approve path
    pub async fn negotiate(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        deadline: U256,
    ) -> Result<Authorization> {
        match self.probe(token).await? {
            PermitCapability::Unsupported => {
                info!(token = %token, "Token has no permit, using approve");
                Ok(Authorization::Approve)
            }
            PermitCapability::Supported => {
                let (domain, nonce) = self.permit_domain(token).await?;
                let signature =
                    sign_permit(self.signer, &domain, spender, amount, nonce, deadline)?;
                info!(token = %token, nonce = %nonce, "Signed permit");
                Ok(Authorization::Permit(signature))
            }
        }
    }

    /// Introspect the token's interface for `permit`
    pub async fn probe(&self, token: Address) -> Result<PermitCapability> {
        let code = self
            .provider
            .get_code_at(token)
            .await
            .map_err(|e| BridgeError::connectivity("eth_getCode", e))?;

        if code.is_empty() || bytecode_exposes_selector(&code, PERMIT_SELECTOR) {
            return classify_capability(token, &code, None);
        }

        let slot = self
            .provider
            .get_storage_at(token, U256::from_be_bytes(EIP1967_IMPLEMENTATION_SLOT.0))
            .await
            .map_err(|e| BridgeError::connectivity("eth_getStorageAt", e))?;

        let implementation_code: Option<Bytes> = match implementation_from_slot(slot) {
            Some(implementation) => {
                debug!(token = %token, implementation = %implementation, "Token is a proxy");
                Some(
                    self.provider
                        .get_code_at(implementation)
                        .await
                        .map_err(|e| BridgeError::connectivity("eth_getCode", e))?,
                )
            }
            None => None,
        };

        classify_capability(token, &code, implementation_code.as_deref().map(|b| &b[..]))
    }

    /// Domain and current nonce for signing a permit on `token`
    async fn permit_domain(&self, token: Address) -> Result<(Eip712Domain, U256)> {
        let contract = PermitToken::new(token, self.provider);
        let owner = self.signer.address();

        let nonce = contract
            .nonces(owner)
            .call()
            .await
            .map_err(|e| BridgeError::probe(token, format!("nonces() failed: {}", e)))?
            ._0;
        let separator = contract
            .DOMAIN_SEPARATOR()
            .call()
            .await
            .map_err(|e| BridgeError::probe(token, format!("DOMAIN_SEPARATOR() failed: {}", e)))?
            ._0;

        // ERC-5267 tokens publish name/version; older ones use name() and version "1"
        let identity = match contract.eip712Domain().call().await {
            Ok(published) => DomainIdentity::new(published.name, published.version),
            Err(_) => {
                let name = contract
                    .name()
                    .call()
                    .await
                    .map_err(|e| BridgeError::probe(token, format!("name() failed: {}", e)))?
                    ._0;
                DomainIdentity::new(name, "1")
            }
        };

        let domain = identity.bind(self.chain_id, token);
        verify_domain(token, &domain, separator)?;
        Ok((domain, nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const TOKEN: Address = address!("0707070707070707070707070707070707070707");

    /// PUSH4 <selector> EQ, the shape of a solc dispatcher entry
    fn dispatcher_with(selector: [u8; 4]) -> Vec<u8> {
        let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x80];
        code.push(0x63);
        code.extend_from_slice(&selector);
        code.push(0x14);
        code
    }

    #[test]
    fn test_permit_selector_value() {
        assert_eq!(PERMIT_SELECTOR, [0xd5, 0x05, 0xac, 0xcf]);
    }

    #[test]
    fn test_selector_found_in_dispatcher() {
        assert!(bytecode_exposes_selector(
            &dispatcher_with(PERMIT_SELECTOR),
            PERMIT_SELECTOR
        ));
        assert!(!bytecode_exposes_selector(
            &dispatcher_with([0x09, 0x5e, 0xa7, 0xb3]),
            PERMIT_SELECTOR
        ));
    }

    #[test]
    fn test_selector_inside_push_data_ignored() {
        // PUSH32 whose immediate contains the selector bytes
        let mut code = vec![0x7f];
        let mut data = [0u8; 32];
        data[3..8].copy_from_slice(&[0x63, 0xd5, 0x05, 0xac, 0xcf]);
        code.extend_from_slice(&data);
        assert!(!bytecode_exposes_selector(&code, PERMIT_SELECTOR));
    }

    #[test]
    fn test_narrow_push_matches_leading_zero_selector() {
        let selector = [0x00, 0x12, 0x34, 0x56];
        let code = vec![0x62, 0x12, 0x34, 0x56, 0x14];
        assert!(bytecode_exposes_selector(&code, selector));
    }

    #[test]
    fn test_truncated_push_is_safe() {
        assert!(!bytecode_exposes_selector(&[0x63, 0xd5, 0x05], PERMIT_SELECTOR));
    }

    #[test]
    fn test_classify_missing_permit_selects_approve() {
        let code = dispatcher_with([0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(
            classify_capability(TOKEN, &code, None).unwrap(),
            PermitCapability::Unsupported
        );
    }

    #[test]
    fn test_classify_proxy_implementation() {
        let proxy = vec![0x36, 0x3d, 0x3d, 0x37, 0xf4];
        let implementation = dispatcher_with(PERMIT_SELECTOR);
        assert_eq!(
            classify_capability(TOKEN, &proxy, Some(&implementation)).unwrap(),
            PermitCapability::Supported
        );
        assert_eq!(
            classify_capability(TOKEN, &proxy, None).unwrap(),
            PermitCapability::Unsupported
        );
    }

    #[test]
    fn test_classify_no_code_is_probe_failure() {
        let err = classify_capability(TOKEN, &[], None).unwrap_err();
        assert!(matches!(err, BridgeError::CapabilityProbe { .. }));
    }

    #[test]
    fn test_domain_mismatch_is_error_not_fallback() {
        let domain = DomainIdentity::new("Foo", "1").bind(ChainId(1), TOKEN);
        assert!(verify_domain(TOKEN, &domain, domain.separator()).is_ok());

        let err = verify_domain(TOKEN, &domain, B256::repeat_byte(1)).unwrap_err();
        assert!(matches!(err, BridgeError::CapabilityProbe { .. }));
    }

    #[test]
    fn test_implementation_from_slot() {
        assert_eq!(implementation_from_slot(U256::ZERO), None);
        let word = U256::from_be_bytes(Address::repeat_byte(0x42).into_word().0);
        assert_eq!(
            implementation_from_slot(word),
            Some(Address::repeat_byte(0x42))
        );
    }

    #[test]
    fn test_authorization_is_permit() {
        assert!(Authorization::Permit(Signature::zero()).is_permit());
        assert!(!Authorization::Approve.is_permit());
    }
}
