//! # Event Decoder
//!
//! Pure conversion of explorer logs into typed events.
//!
//! A `TroveUpdated` payload is four ABI words:
//!
//! ```text
//! [0] debt        uint256 (wei, 18 decimals)
//! [1] collateral  uint256 (wei, 18 decimals)
//! [2] stake       uint256 (ignored)
//! [3] operation   uint8
//! ```

use primitive_types::U256;
use std::cmp::Reverse;

use crate::domain::{
    Address, Amount, DecodeError, Operation, RawLog, Topic, TroveEvent, TROVE_UPDATED_WORDS,
};

const WORD: usize = 32;

/// Parse a `0x`-prefixed hex quantity.
///
/// The explorer reports index zero as a bare `"0x"`, so empty digits read as 0.
pub fn parse_hex_u64(field: &'static str, value: &str) -> Result<u64, DecodeError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| DecodeError::InvalidHex {
            field,
            value: value.to_string(),
        })?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

fn decode_words(data: &str) -> Result<Vec<[u8; WORD]>, DecodeError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(digits).map_err(|_| DecodeError::InvalidHex {
        field: "data",
        value: data.to_string(),
    })?;

    let expected = TROVE_UPDATED_WORDS * WORD;
    if bytes.len() != expected {
        return Err(DecodeError::PayloadLength {
            expected,
            got: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Topic at `index`, parsed.
pub fn topic_at(log: &RawLog, index: usize) -> Result<Topic, DecodeError> {
    let raw = log.topics.get(index).ok_or(DecodeError::MissingTopic(index))?;
    raw.parse().map_err(|_| DecodeError::InvalidHex {
        field: "topics",
        value: raw.clone(),
    })
}

/// Decode a `TroveUpdated` log.
///
/// # Errors
/// - `PayloadLength` unless the payload is exactly four words
/// - `OperationOutOfRange` if the operation word exceeds `u8`
/// - `InvalidHex` for malformed numeric fields
pub fn decode_trove_updated(log: &RawLog) -> Result<TroveEvent, DecodeError> {
    let words = decode_words(&log.data)?;

    let op_word = &words[3];
    if op_word[..WORD - 1].iter().any(|b| *b != 0) {
        return Err(DecodeError::OperationOutOfRange);
    }

    let borrower = match log.topics.get(1) {
        Some(_) => Some(Address::from_topic(&topic_at(log, 1)?)?),
        None => None,
    };

    let log_index = log
        .log_index
        .as_deref()
        .map(|v| parse_hex_u64("logIndex", v))
        .transpose()?;

    Ok(TroveEvent {
        tx_hash: log.transaction_hash.clone(),
        block_number: parse_hex_u64("blockNumber", &log.block_number)?,
        timestamp: parse_hex_u64("timeStamp", &log.time_stamp)?,
        log_index,
        borrower,
        debt: Amount::from_wei(U256::from_big_endian(&words[0])),
        collateral: Amount::from_wei(U256::from_big_endian(&words[1])),
        operation: Operation::from(op_word[WORD - 1]),
    })
}

/// Recipient (`to`) of an ERC-20 `Transfer` log.
pub fn decode_transfer_recipient(log: &RawLog) -> Result<Address, DecodeError> {
    Address::from_topic(&topic_at(log, 2)?)
}

/// ABI-encode a `TroveUpdated` payload.
pub fn encode_trove_updated(debt: Amount, collateral: Amount, operation: Operation) -> String {
    let mut bytes = [0u8; TROVE_UPDATED_WORDS * WORD];
    debt.wei().to_big_endian(&mut bytes[0..WORD]);
    collateral.wei().to_big_endian(&mut bytes[WORD..2 * WORD]);
    bytes[4 * WORD - 1] = u8::from(operation);
    format!("0x{}", hex::encode(bytes))
}

/// Order sweep candidates most recent first: timestamp, block, log index.
///
/// Logs whose header fields do not parse sort last; they fail decoding later.
pub fn sort_newest_first(logs: &mut [RawLog]) {
    logs.sort_by_key(|log| {
        let ts = parse_hex_u64("timeStamp", &log.time_stamp).unwrap_or(0);
        let block = parse_hex_u64("blockNumber", &log.block_number).unwrap_or(0);
        let idx = log
            .log_index
            .as_deref()
            .and_then(|v| parse_hex_u64("logIndex", v).ok())
            .unwrap_or(0);
        Reverse((ts, block, idx))
    });
}
