//! # Domain Value Objects
//!
//! Immutable value types: fixed-point amounts, addresses, topics and the
//! small enums that tag events and reconstruction provenance.

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::{DecodeError, TroveError};

/// Fractional digits of on-chain token amounts.
pub const AMOUNT_DECIMALS: usize = 18;

fn wei_per_unit() -> U256 {
    U256::exp10(AMOUNT_DECIMALS)
}

// =============================================================================
// Amount
// =============================================================================

/// Unsigned 18-decimal fixed-point amount, held as integral wei.
///
/// Parsing and rendering go through integer arithmetic only, so every one
/// of the 18 fractional digits survives a decode/display cycle.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    /// Zero amount.
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    /// Wrap a raw wei value.
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    /// Raw wei value.
    pub fn wei(&self) -> U256 {
        self.0
    }

    /// True if exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: &Amount) -> Amount {
        if self.0 >= other.0 {
            Amount(self.0 - other.0)
        } else {
            Amount(other.0 - self.0)
        }
    }

    /// Render with exactly `places` fractional digits, rounding half up.
    pub fn format_fixed(&self, places: usize) -> String {
        let places = places.min(AMOUNT_DECIMALS);
        let scale = U256::exp10(AMOUNT_DECIMALS - places);
        let mut scaled = self.0 / scale;
        let remainder = self.0 % scale;
        if places < AMOUNT_DECIMALS && remainder * U256::from(2u8) >= scale {
            scaled = scaled.saturating_add(U256::one());
        }

        let denom = U256::exp10(places);
        let int = scaled / denom;
        if places == 0 {
            return int.to_string();
        }
        let frac = (scaled % denom).to_string();
        format!("{}.{:0>width$}", int, frac, width = places)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = wei_per_unit();
        let int = self.0 / unit;
        let frac = self.0 % unit;
        if frac.is_zero() {
            return write!(f, "{}", int);
        }
        let padded = format!("{:0>width$}", frac.to_string(), width = AMOUNT_DECIMALS);
        write!(f, "{}.{}", int, padded.trim_end_matches('0'))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self)
    }
}

impl FromStr for Amount {
    type Err = TroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TroveError::InvalidInput(format!("invalid decimal amount: {s:?}"));

        let trimmed = s.trim();
        let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) || frac_part.len() > AMOUNT_DECIMALS {
            return Err(invalid());
        }

        let int = U256::from_dec_str(int_part).map_err(|_| invalid())?;
        let padded = format!("{:0<width$}", frac_part, width = AMOUNT_DECIMALS);
        let frac = U256::from_dec_str(&padded).map_err(|_| invalid())?;

        int.checked_mul(wei_per_unit())
            .and_then(|v| v.checked_add(frac))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Address / Topic
// =============================================================================

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// 20-byte account or contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Left-pad to a 32-byte indexed topic.
    pub fn to_topic(&self) -> Topic {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        Topic(word)
    }

    /// Extract an address from a left-padded topic.
    pub fn from_topic(topic: &Topic) -> Result<Self, DecodeError> {
        if topic.0[..12].iter().any(|b| *b != 0) {
            return Err(DecodeError::InvalidTopic(topic.to_string()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&topic.0[12..]);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = TroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| TroveError::InvalidInput(format!("invalid address {s:?}: {e}")))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| TroveError::InvalidInput(format!("address {s:?} is not 20 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 32-byte indexed log field.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Topic([u8; 32]);

impl Topic {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Topic {
    type Err = TroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| TroveError::InvalidInput(format!("invalid topic {s:?}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TroveError::InvalidInput(format!("topic {s:?} is not 32 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tags
// =============================================================================

/// Operation tag carried by a `TroveUpdated` log.
///
/// Only `Redeemed` is load-bearing; the other codes follow the usual
/// borrower-operations numbering and are used for display only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Operation {
    /// Trove opened (code 0).
    Opened,
    /// Trove closed (code 1).
    Closed,
    /// Trove adjusted (code 2).
    Adjusted,
    /// Trove redeemed against (code 3).
    Redeemed,
    /// Any other code.
    Other(u8),
}

impl Operation {
    /// True only for redemptions.
    pub fn is_redemption(&self) -> bool {
        matches!(self, Operation::Redeemed)
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Opened => "Trove Opened",
            Operation::Closed => "Trove Closed",
            Operation::Adjusted | Operation::Other(_) => "Trove Adjusted",
            Operation::Redeemed => "Redeemed",
        }
    }
}

impl From<u8> for Operation {
    fn from(code: u8) -> Self {
        match code {
            0 => Operation::Opened,
            1 => Operation::Closed,
            2 => Operation::Adjusted,
            3 => Operation::Redeemed,
            other => Operation::Other(other),
        }
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Opened => 0,
            Operation::Closed => 1,
            Operation::Adjusted => 2,
            Operation::Redeemed => 3,
            Operation::Other(code) => code,
        }
    }
}

/// Which fallback tier produced a previous state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateSource {
    /// Exact position-manager query bounded at `before_block - 1`.
    OnChainExact,
    /// Caller-supplied lifecycle event.
    LifecycleFallback,
    /// Caller-supplied event that was itself a redemption.
    Redemption,
    /// Merged sweep over position manager and redemption contract.
    SecondaryContract,
}

impl StateSource {
    /// Stable label, matching the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            StateSource::OnChainExact => "on-chain-exact",
            StateSource::LifecycleFallback => "lifecycle-fallback",
            StateSource::Redemption => "redemption",
            StateSource::SecondaryContract => "secondary-contract",
        }
    }
}

/// Identity of one decoded log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKey {
    /// Block and log index (true key).
    Log {
        /// Block number
        block: u64,
        /// Position of the log within the block
        log_index: u64,
    },
    /// Transaction hash and borrower, when the log index is unknown. One
    /// redemption tx touches several Troves, each with its own borrower.
    Tx {
        /// Emitting transaction
        tx_hash: String,
        /// Trove owner from `topic1`
        borrower: Option<Address>,
    },
}

/// Upper block bound of a log query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    /// Concrete block.
    Number(u64),
    /// Chain head.
    Latest,
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Number(n) => write!(f, "{}", n),
            BlockTag::Latest => f.write_str("latest"),
        }
    }
}

/// Rate-limit class of an external call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Per-account lookups.
    PerAccount,
    /// Bulk sweep over the global redemption log.
    Bulk,
}

/// Result of work that a cancellation token may interrupt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cancellable<T> {
    /// Work ran to the end.
    Completed(T),
    /// Token fired before the work finished.
    Cancelled,
}

impl<T> Cancellable<T> {
    /// True if cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Cancellable::Cancelled)
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Cancellable::Completed(v) => Some(v),
            Cancellable::Cancelled => None,
        }
    }

    /// Map the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cancellable<U> {
        match self {
            Cancellable::Completed(v) => Cancellable::Completed(f(v)),
            Cancellable::Cancelled => Cancellable::Cancelled,
        }
    }
}

/// Redemption classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionKind {
    /// Debt and collateral both reduced to exactly zero.
    Full,
    /// Anything else.
    Partial,
}

impl RedemptionKind {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            RedemptionKind::Full => "FULL",
            RedemptionKind::Partial => "PARTIAL",
        }
    }
}

/// Collateral and debt removed by one redemption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedemptionImpact {
    /// Collateral handed to the redeemer.
    pub collateral_redeemed: Amount,
    /// Debt cancelled.
    pub debt_reduced: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_amount_display_trims_trailing_zeros() {
        assert_eq!(amount("10.0000").to_string(), "10");
        assert_eq!(amount("4.50").to_string(), "4.5");
        assert_eq!(amount("0").to_string(), "0");
        assert_eq!(amount("0.000000000000000001").to_string(), "0.000000000000000001");
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!(".5".parse::<Amount>().is_err());
        assert!("1e18".parse::<Amount>().is_err());
        assert!("0.0000000000000000001".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_from_wei() {
        let wei = U256::from_dec_str("1500000000000000000").unwrap();
        assert_eq!(Amount::from_wei(wei).to_string(), "1.5");
    }

    #[test]
    fn test_amount_abs_diff() {
        assert_eq!(amount("10.0").abs_diff(&amount("4.0")), amount("6"));
        assert_eq!(amount("4.0").abs_diff(&amount("10.0")), amount("6"));
    }

    #[test]
    fn test_amount_format_fixed_rounds_half_up() {
        assert_eq!(amount("1.23455").format_fixed(4), "1.2346");
        assert_eq!(amount("1.23454").format_fixed(4), "1.2345");
        assert_eq!(amount("9.99995").format_fixed(4), "10.0000");
        assert_eq!(amount("3").format_fixed(4), "3.0000");
        assert_eq!(amount("2.5").format_fixed(0), "3");
    }

    #[test]
    fn test_amount_serde_is_decimal_string() {
        let json = serde_json::to_string(&amount("12.345")).unwrap();
        assert_eq!(json, "\"12.345\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount("12.345"));
    }

    #[test]
    fn test_address_parse_and_topic() {
        let addr: Address = "0x80d32B0FE29A56dd4b6eD5BdcfD2D488db4878fb".parse().unwrap();
        assert_eq!(addr.to_string(), "0x80d32b0fe29a56dd4b6ed5bdcfd2d488db4878fb");

        let topic = addr.to_topic();
        assert!(topic.to_string().starts_with("0x000000000000000000000000"));
        assert_eq!(Address::from_topic(&topic).unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_from_dirty_topic_fails() {
        let topic = Topic::from_bytes([0xff; 32]);
        assert!(matches!(
            Address::from_topic(&topic),
            Err(DecodeError::InvalidTopic(_))
        ));
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::from(3), Operation::Redeemed);
        assert!(Operation::from(3).is_redemption());
        assert!(!Operation::from(0).is_redemption());
        assert_eq!(Operation::from(9), Operation::Other(9));
        assert_eq!(u8::from(Operation::Other(9)), 9);
    }

    #[test]
    fn test_state_source_serde_labels() {
        let json = serde_json::to_string(&StateSource::OnChainExact).unwrap();
        assert_eq!(json, "\"on-chain-exact\"");
        assert_eq!(StateSource::SecondaryContract.label(), "secondary-contract");
    }

    #[test]
    fn test_cancellable_helpers() {
        let done = Cancellable::Completed(2).map(|v| v * 2);
        assert_eq!(done.completed(), Some(4));
        assert!(Cancellable::<u8>::Cancelled.is_cancelled());
    }

    proptest! {
        #[test]
        fn prop_amount_keeps_all_eighteen_digits(
            int in 0u64..=u64::MAX,
            frac in 0u64..1_000_000_000_000_000_000u64,
        ) {
            let text = format!("{}.{:018}", int, frac);
            let parsed: Amount = text.parse().unwrap();
            let expected = U256::from(int) * U256::exp10(18) + U256::from(frac);
            prop_assert_eq!(parsed.wei(), expected);

            let reparsed: Amount = parsed.to_string().parse().unwrap();
            prop_assert_eq!(reparsed, parsed);
        }
    }
}
