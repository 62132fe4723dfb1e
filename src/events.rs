//! Event filters and address extraction
//!
//! Two event kinds matter to the rewarder: bridge-in mints, which are ERC-20
//! `Transfer` events whose `from` is the zero address, and the reward
//! contract's own `sendValue` payout events. Indexed addresses sit
//! right-aligned in their 32-byte topic slots.

use alloy::primitives::{keccak256, Address, B256};
use alloy::rpc::types::{Filter, Log};

use crate::error::DecodeError;

/// Signature hash of `Transfer(address,address,uint256)`.
pub fn transfer_topic() -> B256 {
    keccak256(b"Transfer(address,address,uint256)")
}

/// Signature hash of `sendValue(address,bool)`, emitted by the batch-send
/// contract once per paid recipient.
pub fn payout_topic() -> B256 {
    keccak256(b"sendValue(address,bool)")
}

/// Filter for mint transfers on a token contract: `Transfer` events whose
/// `from` topic is the zero address. Block bounds are applied by the scanner.
pub fn mint_filter(token: Address) -> Filter {
    Filter::new()
        .address(token)
        .event_signature(transfer_topic())
        .topic1(B256::ZERO)
}

/// Filter for the reward contract's historical payout events.
pub fn payout_filter(contract: Address) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(payout_topic())
}

/// Recipient of a mint transfer: the `to` parameter in `topics[2]`.
pub fn mint_recipient(log: &Log) -> Result<Address, DecodeError> {
    let topics = log.topics();
    if topics.len() < 3 {
        return Err(DecodeError::MissingTopics {
            expected: 3,
            found: topics.len(),
        });
    }
    Ok(Address::from_word(topics[2]))
}

/// Receiver of a prior payout: `topics[1]`.
pub fn payout_recipient(log: &Log) -> Result<Address, DecodeError> {
    let topics = log.topics();
    if topics.len() < 2 {
        return Err(DecodeError::MissingTopics {
            expected: 2,
            found: topics.len(),
        });
    }
    Ok(Address::from_word(topics[1]))
}
