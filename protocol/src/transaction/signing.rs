//! Transaction signing with secp256k1 keypairs.
//!
//! Signing is a separate step from building because the key lives behind the
//! key store and may be unlocked only after the user confirms. The digest is
//! always the transaction ID, `SHA-256(raw_data)`, recomputed from the exact
//! bytes being signed.

use super::types::{SignedTransaction, UnsignedTransaction};
use super::verification::validate;
use crate::crypto::keys::TronKeypair;
use crate::crypto::signatures::sign_digest;
use crate::error::{PaymentError, PaymentResult};

/// Signs `tx` with `keypair`.
///
/// The procedure:
/// 1. Re-run the structural validator over the raw bytes.
/// 2. Refuse if the keypair's address is not the transaction owner.
/// 3. Produce a low-s recoverable signature over the transaction ID.
///
/// # Example
///
/// ```rust,no_run
/// use trxsafe_protocol::crypto::keys::TronKeypair;
/// use trxsafe_protocol::transaction::{assemble_transfer, sign_transaction, Tapos};
///
/// let keypair = TronKeypair::generate();
/// let seller = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
/// let tx = assemble_transfer(&keypair.address(), &seller, 1_000_000, &Tapos::synthetic(1_700_000_000_000)).unwrap();
///
/// let signed = sign_transaction(&tx, &keypair).unwrap();
/// assert_eq!(signed.signatures().len(), 1);
/// ```
pub fn sign_transaction(
    tx: &UnsignedTransaction,
    keypair: &TronKeypair,
) -> PaymentResult<SignedTransaction> {
    validate(tx)?;

    let signer = keypair.address();
    if signer != *tx.owner() {
        return Err(PaymentError::OwnerMismatch {
            expected: tx.owner().encode(),
            actual: signer.encode(),
        });
    }

    let signature = sign_digest(keypair, tx.tx_id())?;
    tracing::debug!(tx_id = %tx.tx_id_hex(), v = signature.v(), "transaction signed");
    Ok(SignedTransaction::new(tx.clone(), signature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
