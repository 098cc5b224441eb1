//! Transaction validation: the one function every stage runs.
//!
//! The same checks run on builder output, before signing, before broadcast
//! and after a QR scan. Every check is AND-composed and the first failure is
//! returned verbatim. Checks are ordered from cheapest to most expensive
//! (byte comparisons before signature recovery).
//!
//! [`validate_raw`] is the structural core and also the only way an
//! [`UnsignedTransaction`] comes into existence.

use std::fmt;

use prost::Message;

use super::proto::{contract_type_name, ContractType, RawData, TransferContract};
use super::types::{SignedTransaction, UnsignedTransaction};
use crate::codec::address::Address;
use crate::config::{Settings, SIGNATURE_LENGTH, TRANSFER_CONTRACT_TYPE_URL};
use crate::crypto::signatures::{recover_address, RecoverableSignature};
use crate::error::{PaymentError, PaymentResult};

/// Fields decoded from a structurally valid transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransferFields {
    pub owner: Address,
    pub to: Address,
    pub amount: i64,
    pub timestamp: i64,
    pub expiration: i64,
    pub fee_limit: i64,
    pub ref_block_bytes: Vec<u8>,
    pub ref_block_hash: Vec<u8>,
}

/// Pipeline stage a validation ran at. Used for log context only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BuilderOutput,
    PreSign,
    PreBroadcast,
    PostScan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BuilderOutput => "builder-output",
            Stage::PreSign => "pre-sign",
            Stage::PreBroadcast => "pre-broadcast",
            Stage::PostScan => "post-scan",
        };
        f.write_str(name)
    }
}

fn malformed(reason: impl Into<String>) -> PaymentError {
    PaymentError::MalformedTransaction(reason.into())
}

/// Structural checks over raw `Transaction.raw` bytes.
///
/// 1. Bytes decode and re-encode to exactly themselves (no unknown or
///    reordered fields).
/// 2. Exactly one contract.
/// 3. That contract is a TransferContract with the matching type URL.
/// 4. `data` and `scripts` are empty.
/// 5. `timestamp > 0` and `expiration > timestamp`.
/// 6. Owner and recipient are 21-byte `0x41` addresses and differ.
/// 7. `amount > 0`.
pub(crate) fn validate_raw(raw_bytes: &[u8]) -> PaymentResult<TransferFields> {
    // 1. Canonical decode.
    let raw = RawData::decode(raw_bytes).map_err(|e| malformed(format!("raw_data: {e}")))?;
    if raw.encode_to_vec() != raw_bytes {
        return Err(malformed("raw_data is not in canonical form"));
    }

    // 2. Exactly one contract.
    if raw.contract.len() != 1 {
        return Err(malformed(format!(
            "expected exactly one contract, found {}",
            raw.contract.len()
        )));
    }
    let contract = &raw.contract[0];

    // 3. TransferContract only.
    if contract.r#type != ContractType::TransferContract as i32 {
        return Err(PaymentError::ForbiddenType(contract_type_name(contract.r#type)));
    }
    let parameter = contract
        .parameter
        .as_ref()
        .ok_or_else(|| malformed("contract has no parameter"))?;
    if parameter.type_url != TRANSFER_CONTRACT_TYPE_URL {
        return Err(PaymentError::ForbiddenType(parameter.type_url.clone()));
    }
    if contract.permission_id != 0 || !contract.provider.is_empty() || !contract.contract_name.is_empty() {
        return Err(malformed("contract carries permission or provider fields"));
    }
    let transfer = TransferContract::decode(parameter.value.as_slice())
        .map_err(|e| malformed(format!("TransferContract: {e}")))?;
    if transfer.encode_to_vec() != parameter.value {
        return Err(malformed("TransferContract is not in canonical form"));
    }

    // 4. No payload of any kind.
    if !raw.data.is_empty() || !raw.scripts.is_empty() {
        return Err(PaymentError::ExtraDataForbidden);
    }

    // 5. Time window.
    if raw.timestamp <= 0 || raw.expiration <= raw.timestamp {
        return Err(malformed(format!(
            "invalid time window: timestamp {} expiration {}",
            raw.timestamp, raw.expiration
        )));
    }

    // 6. Addresses.
    let owner = Address::from_raw(&transfer.owner_address)?;
    let to = Address::from_raw(&transfer.to_address)?;
    if owner == to {
        return Err(malformed(format!("owner and recipient are both {owner}")));
    }

    // 7. Amount.
    if transfer.amount <= 0 {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be > 0, got {}",
            transfer.amount
        )));
    }

    Ok(TransferFields {
        owner,
        to,
        amount: transfer.amount,
        timestamp: raw.timestamp,
        expiration: raw.expiration,
        fee_limit: raw.fee_limit,
        ref_block_bytes: raw.ref_block_bytes,
        ref_block_hash: raw.ref_block_hash,
    })
}

/// Structural validation of an unsigned transaction.
pub fn validate(tx: &UnsignedTransaction) -> PaymentResult<()> {
    let fields = validate_raw(tx.raw_bytes())?;
    if &fields != tx.fields() {
        return Err(malformed("decoded fields disagree with raw bytes"));
    }
    Ok(())
}

/// Structural validation plus the merchant configuration:
/// owner is `from`, amount is `price * multiplier`, recipient is the seller.
pub fn validate_with_config(
    tx: &UnsignedTransaction,
    settings: &Settings,
    from: &Address,
) -> PaymentResult<()> {
    validate(tx)?;

    if tx.owner() != from {
        return Err(PaymentError::OwnerMismatch {
            expected: from.encode(),
            actual: tx.owner().encode(),
        });
    }

    let expected = settings.total_sun()?;
    if tx.amount() != expected {
        return Err(PaymentError::AmountMismatch {
            expected,
            actual: tx.amount(),
        });
    }

    let seller = settings.seller()?;
    if *tx.to() != seller {
        return Err(PaymentError::RecipientMismatch {
            expected: seller.encode(),
            actual: tx.to().encode(),
        });
    }

    Ok(())
}

/// Validation of a signed transaction: the unsigned checks, then exactly one
/// 65-byte signature that recovers to the owner.
pub fn validate_signed(tx: &SignedTransaction) -> PaymentResult<()> {
    validate(tx.unsigned())?;

    // 8. Exactly one 65-byte signature.
    match tx.signatures() {
        [only] if only.len() == SIGNATURE_LENGTH => {}
        [only] => {
            return Err(malformed(format!(
                "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                only.len()
            )))
        }
        sigs => {
            return Err(malformed(format!(
                "expected exactly one signature, found {}",
                sigs.len()
            )))
        }
    }

    let signature = RecoverableSignature::from_bytes(&tx.signatures()[0])?;
    if !signature.is_low_s() {
        return Err(PaymentError::CryptoFailure("signature is not low-s".into()));
    }
    let signer = recover_address(tx.tx_id(), &signature)?;
    if signer != *tx.unsigned().owner() {
        return Err(PaymentError::OwnerMismatch {
            expected: tx.unsigned().owner().encode(),
            actual: signer.encode(),
        });
    }

    Ok(())
}

/// [`validate_signed`] plus [`validate_with_config`].
pub fn validate_signed_with_config(
    tx: &SignedTransaction,
    settings: &Settings,
    from: &Address,
) -> PaymentResult<()> {
    validate_signed(tx)?;
    validate_with_config(tx.unsigned(), settings, from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::TronKeypair;
    use crate::crypto::signatures::sign_digest;
    use crate::transaction::builder::{assemble_transfer, encode_raw, Tapos};
    use crate::transaction::proto::{Any, Contract};

    const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn tapos() -> Tapos {
        Tapos {
            ref_block_bytes: [0xab, 0xcd],
            ref_block_hash: [1u8; 8],
            timestamp: 1_700_000_000_000,
            expiration: 1_700_000_060_000,
        }
    }

    fn transfer_raw(owner: &Address, to: &Address, amount: i64) -> RawData {
        let transfer = TransferContract {
            owner_address: owner.as_bytes().to_vec(),
            to_address: to.as_bytes().to_vec(),
            amount,
        };
        RawData {
            ref_block_bytes: vec![0xab, 0xcd],
            ref_block_hash: vec![1u8; 8],
            expiration: 1_700_000_060_000,
            timestamp: 1_700_000_000_000,
            contract: vec![Contract {
                r#type: ContractType::TransferContract as i32,
                parameter: Some(Any {
                    type_url: TRANSFER_CONTRACT_TYPE_URL.to_string(),
                    value: transfer.encode_to_vec(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn seller() -> Address {
        SELLER.parse().unwrap()
    }

    #[test]
    fn well_formed_transfer_passes() {
        let kp = TronKeypair::generate();
        let tx = assemble_transfer(&kp.address(), &seller(), 15_000_000, &tapos()).unwrap();
        validate(&tx).unwrap();
        let settings = Settings::new(SELLER, 5_000_000, 3);
        validate_with_config(&tx, &settings, &kp.address()).unwrap();
    }

    #[test]
    fn amount_must_match_price_times_multiplier() {
        let kp = TronKeypair::generate();
        let settings = Settings::new(SELLER, 5_000_000, 3);
        let tx = assemble_transfer(&kp.address(), &seller(), 10_000_000, &tapos()).unwrap();
        match validate_with_config(&tx, &settings, &kp.address()) {
            Err(PaymentError::AmountMismatch { expected, actual }) => {
                assert_eq!(expected, 15_000_000);
                assert_eq!(actual, 10_000_000);
            }
            other => panic!("expected AmountMismatch, got {:?}", other),
        }
    }

    #[test]
    fn recipient_must_be_seller() {
        let kp = TronKeypair::generate();
        let stranger = TronKeypair::generate().address();
        let settings = Settings::new(SELLER, 1_000_000, 1);
        let tx = assemble_transfer(&kp.address(), &stranger, 1_000_000, &tapos()).unwrap();
        assert!(matches!(
            validate_with_config(&tx, &settings, &kp.address()),
            Err(PaymentError::RecipientMismatch { .. })
        ));
    }

    #[test]
    fn owner_must_be_from() {
        let kp = TronKeypair::generate();
        let other = TronKeypair::generate();
        let settings = Settings::new(SELLER, 1_000_000, 1);
        let tx = assemble_transfer(&kp.address(), &seller(), 1_000_000, &tapos()).unwrap();
        assert!(matches!(
            validate_with_config(&tx, &settings, &other.address()),
            Err(PaymentError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn other_contract_types_are_forbidden() {
        let owner = TronKeypair::generate().address();
        let mut raw = transfer_raw(&owner, &seller(), 1);
        raw.contract[0].r#type = ContractType::TriggerSmartContract as i32;
        match UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()) {
            Err(PaymentError::ForbiddenType(name)) => assert_eq!(name, "TriggerSmartContract"),
            other => panic!("expected ForbiddenType, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_type_url_is_forbidden() {
        let owner = TronKeypair::generate().address();
        let mut raw = transfer_raw(&owner, &seller(), 1);
        if let Some(p) = raw.contract[0].parameter.as_mut() {
            p.type_url = "type.googleapis.com/protocol.TransferAssetContract".into();
        }
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::ForbiddenType(_))
        ));
    }

    #[test]
    fn memo_data_is_forbidden() {
        let owner = TronKeypair::generate().address();
        let mut raw = transfer_raw(&owner, &seller(), 1);
        raw.data = b"hello".to_vec();
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::ExtraDataForbidden)
        ));
    }

    #[test]
    fn two_contracts_are_rejected() {
        let owner = TronKeypair::generate().address();
        let mut raw = transfer_raw(&owner, &seller(), 1);
        raw.contract.push(raw.contract[0].clone());
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn time_window_and_amount_and_self_transfer() {
        let owner = TronKeypair::generate().address();

        let mut raw = transfer_raw(&owner, &seller(), 1);
        raw.expiration = raw.timestamp;
        assert!(UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()).is_err());

        let raw = transfer_raw(&owner, &seller(), 0);
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::InvalidAmount(_))
        ));

        let raw = transfer_raw(&owner, &owner, 1);
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn bad_raw_address_is_invalid_address() {
        let owner = TronKeypair::generate().address();
        let mut raw = transfer_raw(&owner, &seller(), 1);
        let mut transfer = TransferContract {
            owner_address: owner.as_bytes().to_vec(),
            to_address: vec![0x42; 21],
            amount: 1,
        };
        if let Some(p) = raw.contract[0].parameter.as_mut() {
            p.value = transfer.encode_to_vec();
        }
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::InvalidAddress(_))
        ));

        transfer.to_address.clear();
        if let Some(p) = raw.contract[0].parameter.as_mut() {
            p.value = transfer.encode_to_vec();
        }
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(raw.encode_to_vec()),
            Err(PaymentError::InvalidAddress(_))
        ));
    }

    #[test]
    fn unknown_fields_are_caught_by_reencoding() {
        let owner = TronKeypair::generate().address();
        let mut bytes = transfer_raw(&owner, &seller(), 1).encode_to_vec();
        // Append field 9 (auths), length-delimited, 2 bytes.
        bytes.extend_from_slice(&[0x4a, 0x02, 0x01, 0x02]);
        assert!(matches!(
            UnsignedTransaction::from_raw_bytes(bytes),
            Err(PaymentError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn signed_transaction_needs_exactly_one_signature() {
        let kp = TronKeypair::generate();
        let tx = assemble_transfer(&kp.address(), &seller(), 1_000_000, &tapos()).unwrap();
        let sig = sign_digest(&kp, tx.tx_id()).unwrap();

        let good = SignedTransaction::new(tx.clone(), sig);
        validate_signed(&good).unwrap();

        let none = SignedTransaction::from_parts(tx.clone(), vec![]);
        assert!(matches!(
            validate_signed(&none),
            Err(PaymentError::MalformedTransaction(_))
        ));

        let two = SignedTransaction::from_parts(
            tx.clone(),
            vec![sig.to_bytes().to_vec(), sig.to_bytes().to_vec()],
        );
        assert!(validate_signed(&two).is_err());

        let short = SignedTransaction::from_parts(tx, vec![sig.to_bytes()[..64].to_vec()]);
        assert!(validate_signed(&short).is_err());
    }

    #[test]
    fn signature_from_another_key_is_owner_mismatch() {
        let kp = TronKeypair::generate();
        let intruder = TronKeypair::generate();
        let tx = assemble_transfer(&kp.address(), &seller(), 1_000_000, &tapos()).unwrap();
        let sig = sign_digest(&intruder, tx.tx_id()).unwrap();
        assert!(matches!(
            validate_signed(&SignedTransaction::new(tx, sig)),
            Err(PaymentError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn encode_raw_matches_assembled_bytes() {
        let kp = TronKeypair::generate();
        let tx = assemble_transfer(&kp.address(), &seller(), 7, &tapos()).unwrap();
        assert_eq!(
            encode_raw(&kp.address(), &seller(), 7, &tapos()),
            tx.raw_bytes().to_vec()
        );
    }
}
