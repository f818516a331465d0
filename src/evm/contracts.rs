//! EVM contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the bridge,
//! the bridged ERC-20/ERC-2612 tokens and Multicall3.
//!
//! The payload structs double as EIP-712 typed data: the permit message and the
//! claim authorization are hashed with `SolStruct::eip712_signing_hash`, so the
//! field names and order below are part of the signed type string.

#![allow(clippy::too_many_arguments)]

use alloy::primitives::{B256, U256};
use alloy::sol;

use crate::types::{ChainId, PartyRef as Party, SourceTx};

sol! {
    /// Account plus the chain it acts on
    #[derive(Debug, PartialEq, Eq)]
    struct PartyRef {
        address account;
        uint256 chainId;
    }

    /// ECDSA signature in contract form
    #[derive(Debug, PartialEq, Eq)]
    struct Signature {
        uint8 v;
        bytes32 r;
        bytes32 s;
    }

    /// Source-chain deposit request
    #[derive(Debug, PartialEq, Eq)]
    struct DepositPayload {
        PartyRef from;
        PartyRef to;
        address spender;
        address token;
        uint256 value;
        uint256 deadline;
        Signature approveTokenTransferSig;
    }

    /// Canonical (original) token identity
    #[derive(Debug, PartialEq, Eq)]
    struct ClaimToken {
        address tokenAddress;
        uint256 originChainId;
    }

    /// Position of the originating deposit event
    #[derive(Debug, PartialEq, Eq)]
    struct SourceTxData {
        bytes32 transactionHash;
        bytes32 blockHash;
        uint256 logIndex;
    }

    /// Destination-chain claim request
    #[derive(Debug, PartialEq, Eq)]
    struct ClaimPayload {
        PartyRef from;
        PartyRef to;
        uint256 value;
        ClaimToken token;
        address depositTxSourceToken;
        address targetTokenAddress;
        string targetTokenName;
        string targetTokenSymbol;
        uint256 deadline;
        SourceTxData sourceTxData;
    }

    /// ERC-2612 permit message
    #[derive(Debug, PartialEq, Eq)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    // ========================================================================
    // Bridge
    // ========================================================================

    /// Lock/mint/burn/claim bridge contract
    #[sol(rpc)]
    contract Bridge {
        /// Number of wrapped tokens minted by this bridge
        function getNumberOfWrappedTokens() external view returns (uint256 count);

        /// Wrapped token address by registration index
        function wrappedTokensAddresses(uint256 index) external view returns (address token);

        /// Deposit using an ERC-2612 permit signature instead of a prior approve
        function depositWithPermit(DepositPayload calldata payload) external;

        /// Deposit after a classic approve (zero signature in the payload)
        function deposit(DepositPayload calldata payload) external;

        /// Release or mint on the destination chain
        function claim(ClaimPayload calldata payload, Signature calldata signature) external;

        /// Original token locked on its home chain
        event LockOriginalToken(
            address indexed lockedTokenAddress,
            uint256 value,
            address indexed sender,
            address recipient,
            uint256 sourceChainId,
            uint256 toChainId
        );

        /// Wrapped token burned to move value to another chain
        event BurnWrappedToken(
            address indexed burnedWrappedTokenAddress,
            uint256 value,
            address indexed sender,
            address recipient,
            uint256 sourceChainId,
            uint256 toChainId,
            address originalTokenAddress,
            uint256 originalTokenChainId
        );
    }

    // ========================================================================
    // Token (ERC-20 + ERC-2612 + ERC-5267)
    // ========================================================================

    /// ERC20 token with optional permit support
    #[sol(rpc)]
    contract PermitToken {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);

        function permit(
            address owner,
            address spender,
            uint256 value,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
        function nonces(address owner) external view returns (uint256);
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
    }

    // ========================================================================
    // Multicall3
    // ========================================================================

    /// Multicall3 aggregator (read path only)
    #[sol(rpc)]
    contract Multicall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Outcome {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Outcome[] memory returnData);
    }
}

impl Signature {
    /// Zero signature used by the approve path
    pub fn zero() -> Self {
        Self {
            v: 0,
            r: B256::ZERO,
            s: B256::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.v == 0 && self.r.is_zero() && self.s.is_zero()
    }

    /// Split a 65-byte `r || s || v` signature (v = 27/28)
    pub fn from_rsv(bytes: &[u8; 65]) -> Self {
        Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
        }
    }
}

impl From<Party> for PartyRef {
    fn from(party: Party) -> Self {
        Self {
            account: party.address,
            chainId: party.chain_id.to_u256(),
        }
    }
}

impl From<SourceTx> for SourceTxData {
    fn from(source: SourceTx) -> Self {
        Self {
            transactionHash: source.transaction_hash,
            blockHash: source.block_hash,
            logIndex: U256::from(source.log_index),
        }
    }
}

impl ClaimPayload {
    /// Chain the claim must be submitted on
    pub fn destination_chain(&self) -> Option<ChainId> {
        ChainId::from_u256(self.to.chainId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use alloy::sol_types::{SolCall, SolEvent, SolStruct};

    #[test]
    fn test_zero_signature() {
        assert!(Signature::zero().is_zero());
        let sig = Signature {
            v: 27,
            ..Signature::zero()
        };
        assert!(!sig.is_zero());
    }

    #[test]
    fn test_from_rsv_splits_components() {
        let mut bytes = [0u8; 65];
        bytes[..32].fill(0x11);
        bytes[32..64].fill(0x22);
        bytes[64] = 28;
        let sig = Signature::from_rsv(&bytes);
        assert_eq!(sig.r, B256::repeat_byte(0x11));
        assert_eq!(sig.s, B256::repeat_byte(0x22));
        assert_eq!(sig.v, 28);
    }

    #[test]
    fn test_permit_selector() {
        assert_eq!(PermitToken::permitCall::SELECTOR, [0xd5, 0x05, 0xac, 0xcf]);
    }

    #[test]
    fn test_permit_type_string() {
        assert_eq!(
            Permit::eip712_encode_type(),
            "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)"
        );
    }

    #[test]
    fn test_claim_type_string_includes_nested_structs() {
        let encoded = ClaimPayload::eip712_encode_type();
        assert!(encoded.starts_with("ClaimPayload(PartyRef from,PartyRef to,uint256 value"));
        assert!(encoded.contains("ClaimToken(address tokenAddress,uint256 originChainId)"));
        assert!(encoded.contains("PartyRef(address account,uint256 chainId)"));
        assert!(encoded.contains(
            "SourceTxData(bytes32 transactionHash,bytes32 blockHash,uint256 logIndex)"
        ));
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            Bridge::LockOriginalToken::SIGNATURE,
            "LockOriginalToken(address,uint256,address,address,uint256,uint256)"
        );
        assert_eq!(
            Bridge::BurnWrappedToken::SIGNATURE,
            "BurnWrappedToken(address,uint256,address,address,uint256,uint256,address,uint256)"
        );
    }

    #[test]
    fn test_party_conversion() {
        let party = Party::new(Address::repeat_byte(0x42), ChainId(56));
        let sol: PartyRef = party.into();
        assert_eq!(sol.account, Address::repeat_byte(0x42));
        assert_eq!(sol.chainId, U256::from(56));
    }
}
