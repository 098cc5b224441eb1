//! The offline half of a QR round trip.

use super::payload::{SignedPayload, UnsignedPayload};
use crate::error::PaymentResult;
use crate::vault::KeyStore;

/// Signs a scanned unsigned payload with wallet `wallet_id`.
///
/// The displayed fields are checked against `rawData` before the key is
/// touched, and only the raw bytes are signed.
pub async fn cold_sign(
    keystore: &KeyStore,
    wallet_id: &str,
    payload: &UnsignedPayload,
) -> PaymentResult<SignedPayload> {
    let tx = payload.to_transaction()?;
    tracing::info!(
        tx_id = %tx.tx_id_hex(),
        to = %tx.to(),
        amount_sun = tx.amount(),
        "cold signing scanned transfer"
    );
    let signed = keystore.sign_transfer(wallet_id, &tx).await?;
    SignedPayload::from_signed(&signed)
}
