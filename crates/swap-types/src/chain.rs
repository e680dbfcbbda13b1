//! Chain identifiers, principals, and token references.
//!
//! Reference: spec §3 (maker/taker, sourceToken/destinationToken).

use serde::{Deserialize, Serialize};

/// Which side of the swap a chain reference points at.
///
/// The orchestrator bridges exactly two chains: an EVM-compatible
/// chain (`ChainA`) and a non-EVM chain (`ChainB`). Sessions always
/// run source-on-A, destination-on-B; the type exists so call sites
/// never confuse the two address spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// The EVM-compatible chain.
    ChainA,
    /// The non-EVM chain.
    ChainB,
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainId::ChainA => write!(f, "chain_a"),
            ChainId::ChainB => write!(f, "chain_b"),
        }
    }
}

/// A principal (account) identifier on either chain.
///
/// Non-EVM accounts are carried verbatim (see spec §3, §4.5); a
/// deterministic placeholder EVM address is synthesized only where
/// chain A's contract interface requires an address-shaped field
/// (spec §9, "Placeholder-address for non-EVM taker").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    /// A 20-byte EVM address.
    Evm([u8; 20]),
    /// A chain-B native account identifier (e.g. a NEAR account id).
    NonEvm(String),
}

impl Principal {
    /// Deterministic non-zero placeholder used when an EVM contract
    /// requires an address-shaped parameter for a non-EVM principal.
    ///
    /// Reference: spec §4.5 "Address handling", §9 open question.
    pub const PLACEHOLDER: [u8; 20] = {
        let mut bytes = [0u8; 20];
        bytes[19] = 1;
        bytes
    };

    /// Resolve the EVM-address representation of this principal.
    ///
    /// Real EVM addresses pass through; non-EVM accounts resolve to
    /// [`Principal::PLACEHOLDER`]. The caller is responsible for
    /// carrying the real receiver in the session record (spec §9).
    pub fn as_evm_address(&self) -> [u8; 20] {
        match self {
            Principal::Evm(addr) => *addr,
            Principal::NonEvm(_) => Self::PLACEHOLDER,
        }
    }

    /// True if this principal is address-shaped (native to chain A).
    pub fn is_evm(&self) -> bool {
        matches!(self, Principal::Evm(_))
    }
}

/// An opaque token identifier: either the chain's native asset, an
/// EVM contract address, or a non-EVM token/contract identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenRef {
    /// The chain's native token (ETH, NEAR, ...).
    Native,
    /// An ERC-20-like token at an EVM address.
    Evm([u8; 20]),
    /// A non-EVM token/contract identifier.
    NonEvm(String),
}

impl TokenRef {
    /// True if this is the chain's native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, TokenRef::Native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_nonzero() {
        assert_ne!(Principal::PLACEHOLDER, [0u8; 20]);
    }

    #[test]
    fn non_evm_principal_resolves_to_placeholder() {
        let p = Principal::NonEvm("alice.testnet".to_string());
        assert_eq!(p.as_evm_address(), Principal::PLACEHOLDER);
        assert!(!p.is_evm());
    }

    #[test]
    fn evm_principal_passes_through() {
        let addr = [0xABu8; 20];
        let p = Principal::Evm(addr);
        assert_eq!(p.as_evm_address(), addr);
        assert!(p.is_evm());
    }

    #[test]
    fn chain_id_display() {
        assert_eq!(ChainId::ChainA.to_string(), "chain_a");
        assert_eq!(ChainId::ChainB.to_string(), "chain_b");
    }
}
