//! Tamper check for a scanned signed payload.
//!
//! The online device never trusts what comes back from the cold signer.
//! It keeps the unsigned payload it displayed and accepts only a
//! signature, which it attaches to its own copy of the raw bytes:
//!
//! ```text
//! retained unsigned ──► to_transaction() ──┐
//!                                          ├─► SignedTransaction ──► validate_signed
//! scanned signed ─────► signature() ───────┘
//! ```
//!
//! The scanned `signedTx` is compared for diagnostics only and never
//! broadcast.

use super::payload::{SignedPayload, UnsignedPayload};
use crate::error::{PaymentError, PaymentResult};
use crate::transaction::types::SignedTransaction;
use crate::transaction::verification::validate_signed;

/// Rebuilds the signed transaction from the retained payload plus the
/// scanned signature. Any disagreement between the two payloads is
/// [`PaymentError::TamperDetected`].
pub fn verify_scanned(
    retained: &UnsignedPayload,
    scanned: &SignedPayload,
) -> PaymentResult<SignedTransaction> {
    if scanned.to != retained.to {
        return Err(PaymentError::TamperDetected(format!(
            "recipient changed from {} to {}",
            retained.to, scanned.to
        )));
    }
    if scanned.amount != retained.amount {
        return Err(PaymentError::TamperDetected(format!(
            "amount changed from {} to {}",
            retained.amount, scanned.amount
        )));
    }

    let unsigned = retained.to_transaction()?;
    let signed = SignedTransaction::new(unsigned, scanned.signature()?);
    validate_signed(&signed)?;

    match scanned.signed_tx_bytes() {
        Ok(bytes) if bytes == signed.to_envelope_bytes() => {}
        Ok(_) => tracing::warn!(
            tx_id = %signed.tx_id_hex(),
            "scanned signedTx differs from the locally assembled transaction; using local bytes"
        ),
        Err(err) => tracing::warn!(
            tx_id = %signed.tx_id_hex(),
            error = %err,
            "scanned signedTx is unreadable; using local bytes"
        ),
    }

    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::address::Address;
    use crate::crypto::keys::TronKeypair;
    use crate::transaction::builder::{assemble_transfer, Tapos};
    use crate::transaction::signing::sign_transaction;
    use crate::transaction::types::UnsignedTransaction;
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine;

    fn sample() -> (TronKeypair, UnsignedTransaction) {
        let kp = TronKeypair::generate();
        let to: Address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
        let tx = assemble_transfer(&kp.address(), &to, 3_000_000, &Tapos::synthetic(1_700_000_000_000))
            .unwrap();
        (kp, tx)
    }

    fn pair() -> (UnsignedPayload, SignedPayload, SignedTransaction) {
        let (kp, tx) = sample();
        let signed = sign_transaction(&tx, &kp).unwrap();
        (
            UnsignedPayload::from_transaction(&tx),
            SignedPayload::from_signed(&signed).unwrap(),
            signed,
        )
    }

    #[test]
    fn matching_scan_yields_signed_transaction() {
        let (retained, scanned, expected) = pair();
        let signed = verify_scanned(&retained, &scanned).unwrap();
        assert_eq!(signed.to_envelope_bytes(), expected.to_envelope_bytes());
    }

    #[test]
    fn changed_recipient_is_tamper() {
        let (retained, mut scanned, _) = pair();
        scanned.to = TronKeypair::generate().address().encode();
        match verify_scanned(&retained, &scanned) {
            Err(PaymentError::TamperDetected(msg)) => assert!(msg.contains("recipient")),
            other => panic!("expected TamperDetected, got {:?}", other),
        }
    }

    #[test]
    fn changed_amount_is_tamper() {
        let (retained, mut scanned, _) = pair();
        scanned.amount += 1;
        assert!(matches!(
            verify_scanned(&retained, &scanned),
            Err(PaymentError::TamperDetected(_))
        ));
    }

    #[test]
    fn foreign_signature_is_owner_mismatch() {
        let (retained, mut scanned, signed) = pair();
        let stranger = TronKeypair::generate();
        let forged = crate::crypto::signatures::sign_digest(&stranger, signed.tx_id()).unwrap();
        scanned.signature = B64.encode(forged.to_bytes());
        assert!(matches!(
            verify_scanned(&retained, &scanned),
            Err(PaymentError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn divergent_signed_tx_is_ignored() {
        let (retained, mut scanned, expected) = pair();
        scanned.signed_tx = B64.encode(b"garbage");
        let signed = verify_scanned(&retained, &scanned).unwrap();
        assert_eq!(signed.tx_id(), expected.tx_id());
    }
}
