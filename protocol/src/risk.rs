//! # Risk Engine
//!
//! Second opinion on a transaction that has already passed the validator.
//! The whitelist rules duplicate some validator checks on purpose so the
//! outcome shown to the user is self-contained; any whitelist failure is a
//! [`RiskLevel::Block`].
//!
//! Past the whitelist, the price per unit is classified into tiers:
//!
//! ```text
//! price < 1_000 sun                  Warn  "abnormally low"
//! 1_000 ..= 1_000_000 sun            Pass
//! 1_000_000 < price <= 10_000_000    Warn  "elevated"
//! price > 10_000_000                 Warn  "very high", confirmation required
//! ```
//!
//! A recipient that the caller's whitelist predicate does not recognise
//! escalates the outcome by one step.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::codec::address::Address;
use crate::codec::amount::sun_to_trx;
use crate::config::{
    Settings, PRICE_ELEVATED_CEILING, PRICE_LOW_THRESHOLD, PRICE_NORMAL_CEILING,
};
use crate::transaction::types::UnsignedTransaction;
use crate::transaction::verification::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Pass,
    Warn,
    Block,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Pass => "pass",
            RiskLevel::Warn => "warn",
            RiskLevel::Block => "block",
        };
        f.write_str(s)
    }
}

/// What the risk engine thinks of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskOutcome {
    pub level: RiskLevel,
    pub message: String,
    pub requires_confirmation: bool,
}

impl RiskOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Pass,
            message: message.into(),
            requires_confirmation: false,
        }
    }

    fn warn(message: impl Into<String>, requires_confirmation: bool) -> Self {
        Self {
            level: RiskLevel::Warn,
            message: message.into(),
            requires_confirmation,
        }
    }

    fn block(message: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Block,
            message: message.into(),
            requires_confirmation: false,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.level == RiskLevel::Block
    }

    /// Pass becomes Warn; Warn stays Warn but now needs confirmation.
    fn escalate(self, reason: &str) -> Self {
        match self.level {
            RiskLevel::Pass => Self::warn(reason, false),
            RiskLevel::Warn => Self::warn(format!("{}; {reason}", self.message), true),
            RiskLevel::Block => self,
        }
    }
}

/// Whitelist rules. `Some(reason)` means block.
fn whitelist_violation(tx: &UnsignedTransaction, settings: &Settings, now_ms: i64) -> Option<String> {
    if let Err(e) = validate(tx) {
        return Some(e.to_string());
    }
    if tx.amount() <= 0 {
        return Some(format!("amount must be positive, got {}", tx.amount()));
    }
    match settings.total_sun() {
        Ok(total) if total == tx.amount() => {}
        Ok(total) => {
            return Some(format!(
                "amount {} sun does not equal price x multiplier ({total} sun)",
                tx.amount()
            ))
        }
        Err(e) => return Some(e.to_string()),
    }
    match settings.seller() {
        Ok(seller) if seller == *tx.to() => {}
        Ok(seller) => return Some(format!("recipient {} is not the seller {seller}", tx.to())),
        Err(e) => return Some(e.to_string()),
    }
    if tx.is_expired(now_ms) {
        return Some(format!("transaction expired at {}", tx.expiration()));
    }
    None
}

fn price_tier(price_per_unit_sun: i64) -> RiskOutcome {
    let shown = sun_to_trx(price_per_unit_sun);
    if price_per_unit_sun < PRICE_LOW_THRESHOLD {
        RiskOutcome::warn(format!("price {shown} TRX per unit is abnormally low"), false)
    } else if price_per_unit_sun <= PRICE_NORMAL_CEILING {
        RiskOutcome::pass(format!("price {shown} TRX per unit"))
    } else if price_per_unit_sun <= PRICE_ELEVATED_CEILING {
        RiskOutcome::warn(format!("price {shown} TRX per unit is elevated"), false)
    } else {
        RiskOutcome::warn(format!("price {shown} TRX per unit is very high"), true)
    }
}

/// Assesses `tx` against `settings` at time `now_ms`.
///
/// `is_whitelisted` is the caller's address book: recipients it rejects
/// escalate the outcome.
pub fn assess<F>(tx: &UnsignedTransaction, settings: &Settings, now_ms: i64, is_whitelisted: F) -> RiskOutcome
where
    F: Fn(&Address) -> bool,
{
    if let Some(reason) = whitelist_violation(tx, settings, now_ms) {
        tracing::warn!(tx_id = %tx.tx_id_hex(), %reason, "risk engine blocked transaction");
        return RiskOutcome::block(reason);
    }

    let mut outcome = price_tier(settings.price_per_unit_sun);
    if !is_whitelisted(tx.to()) {
        outcome = outcome.escalate("recipient is not in the address book");
    }

    tracing::debug!(
        tx_id = %tx.tx_id_hex(),
        level = %outcome.level,
        requires_confirmation = outcome.requires_confirmation,
        "risk assessed"
    );
    outcome
}

/// [`assess`] at the current wall-clock time.
pub fn assess_now<F>(tx: &UnsignedTransaction, settings: &Settings, is_whitelisted: F) -> RiskOutcome
where
    F: Fn(&Address) -> bool,
{
    assess(tx, settings, Utc::now().timestamp_millis(), is_whitelisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::TronKeypair;
    use crate::transaction::builder::{assemble_transfer, Tapos};

    const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const NOW: i64 = 1_700_000_000_000;

    fn tx_for(settings: &Settings) -> UnsignedTransaction {
        let kp = TronKeypair::generate();
        let to: Address = SELLER.parse().unwrap();
        let amount = settings.total_sun().unwrap();
        assemble_transfer(&kp.address(), &to, amount, &Tapos::synthetic(NOW)).unwrap()
    }

    fn anyone(_: &Address) -> bool {
        true
    }

    fn nobody(_: &Address) -> bool {
        false
    }

    #[test]
    fn tiers() {
        let cases = [
            (999, RiskLevel::Warn, false),
            (1_000, RiskLevel::Pass, false),
            (1_000_000, RiskLevel::Pass, false),
            (1_000_001, RiskLevel::Warn, false),
            (10_000_000, RiskLevel::Warn, false),
            (10_000_001, RiskLevel::Warn, true),
        ];
        for (price, level, confirm) in cases {
            let settings = Settings::new(SELLER, price, 1);
            let outcome = assess(&tx_for(&settings), &settings, NOW + 1, anyone);
            assert_eq!(outcome.level, level, "price {price}");
            assert_eq!(outcome.requires_confirmation, confirm, "price {price}");
        }
    }

    #[test]
    fn very_high_message() {
        let settings = Settings::new(SELLER, 20_000_000, 1);
        let outcome = assess(&tx_for(&settings), &settings, NOW, anyone);
        assert!(outcome.message.contains("very high"));
    }

    #[test]
    fn unknown_recipient_escalates() {
        let normal = Settings::new(SELLER, 500_000, 2);
        let outcome = assess(&tx_for(&normal), &normal, NOW, nobody);
        assert_eq!(outcome.level, RiskLevel::Warn);
        assert!(!outcome.requires_confirmation);

        let elevated = Settings::new(SELLER, 2_000_000, 1);
        let outcome = assess(&tx_for(&elevated), &elevated, NOW, nobody);
        assert_eq!(outcome.level, RiskLevel::Warn);
        assert!(outcome.requires_confirmation);
    }

    #[test]
    fn amount_not_matching_config_blocks() {
        let settings = Settings::new(SELLER, 1_000_000, 2);
        let tx = tx_for(&settings);
        let changed = Settings::new(SELLER, 1_000_000, 3);
        let outcome = assess(&tx, &changed, NOW, anyone);
        assert!(outcome.is_blocked());
    }

    #[test]
    fn other_seller_blocks() {
        let settings = Settings::new(SELLER, 1_000_000, 1);
        let tx = tx_for(&settings);
        let other = Settings::new(TronKeypair::generate().address().encode(), 1_000_000, 1);
        assert!(assess(&tx, &other, NOW, anyone).is_blocked());
    }

    #[test]
    fn expired_blocks() {
        let settings = Settings::new(SELLER, 1_000_000, 1);
        let tx = tx_for(&settings);
        let outcome = assess(&tx, &settings, tx.expiration(), anyone);
        assert!(outcome.is_blocked());
        assert!(outcome.message.contains("expired"));
    }
}
