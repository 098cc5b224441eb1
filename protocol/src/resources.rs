//! # Resource Estimator
//!
//! A plain TRX transfer costs bandwidth and nothing else. If the account
//! has enough free or staked bandwidth left today the transfer is free;
//! otherwise the shortfall is burned from the balance at a fixed rate.
//!
//! ```text
//! burn = max(0, 280 - available) * 1_000 sun
//! ```

use serde::Serialize;

use crate::codec::address::Address;
use crate::config::{SUN_PER_BANDWIDTH_BYTE, TRANSFER_BANDWIDTH_BYTES};
use crate::error::{PaymentError, PaymentResult};
use crate::network::client::TronClient;

/// Whether an account can pay for a transfer, fees included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordability {
    pub balance_sun: i64,
    pub transfer_sun: i64,
    pub available_bandwidth: i64,
    pub burn_sun: i64,
    pub total_needed_sun: i64,
    pub can_afford: bool,
}

pub struct ResourceEstimator {
    client: TronClient,
}

impl ResourceEstimator {
    pub fn new(client: TronClient) -> Self {
        Self { client }
    }

    /// Bandwidth a signed transfer consumes.
    pub fn estimated_bandwidth() -> i64 {
        TRANSFER_BANDWIDTH_BYTES
    }

    /// Sun burned when only `available` bandwidth is left.
    pub fn burn_for_bandwidth(available: i64) -> i64 {
        (Self::estimated_bandwidth() - available).max(0) * SUN_PER_BANDWIDTH_BYTE
    }

    /// Fetches balance and resources concurrently and compares.
    pub async fn affordability(
        &self,
        address: &Address,
        transfer_sun: i64,
    ) -> PaymentResult<Affordability> {
        let (balance_sun, resource) = tokio::try_join!(
            self.client.get_account_balance(address),
            self.client.get_account_resource(address),
        )?;

        let available_bandwidth = resource.available_bandwidth();
        let burn_sun = Self::burn_for_bandwidth(available_bandwidth);
        let total_needed_sun = transfer_sun
            .checked_add(burn_sun)
            .ok_or(PaymentError::Overflow)?;

        Ok(Affordability {
            balance_sun,
            transfer_sun,
            available_bandwidth,
            burn_sun,
            total_needed_sun,
            can_afford: balance_sun >= total_needed_sun,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::crypto::keys::TronKeypair;
    use crate::network::mock::{MockReply, MockTransport};
    use serde_json::json;

    #[test]
    fn burn_formula() {
        assert_eq!(ResourceEstimator::estimated_bandwidth(), 280);
        assert_eq!(ResourceEstimator::burn_for_bandwidth(0), 280_000);
        assert_eq!(ResourceEstimator::burn_for_bandwidth(200), 80_000);
        assert_eq!(ResourceEstimator::burn_for_bandwidth(280), 0);
        assert_eq!(ResourceEstimator::burn_for_bandwidth(5_000), 0);
    }

    async fn check(balance: i64, free_used: i64, transfer: i64) -> Affordability {
        let mock = Arc::new(MockTransport::new());
        mock.push("wallet/getaccount", MockReply::Json(json!({"address": "x", "balance": balance})));
        mock.push(
            "wallet/getaccountresource",
            MockReply::Json(json!({"freeNetLimit": 600, "freeNetUsed": free_used})),
        );
        ResourceEstimator::new(crate::network::client::TronClient::new(mock))
            .affordability(&TronKeypair::generate().address(), transfer)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn free_bandwidth_means_no_burn() {
        let a = check(1_000_000, 0, 1_000_000).await;
        assert_eq!(a.burn_sun, 0);
        assert!(a.can_afford);
    }

    #[tokio::test]
    async fn shortfall_is_burned_from_balance() {
        let a = check(1_000_000, 600, 1_000_000).await;
        assert_eq!(a.available_bandwidth, 0);
        assert_eq!(a.burn_sun, 280_000);
        assert_eq!(a.total_needed_sun, 1_280_000);
        assert!(!a.can_afford);
    }
}
