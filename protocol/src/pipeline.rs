//! # Payment Pipeline
//!
//! [`PaymentEngine`] runs a payment through every component in a fixed
//! order. Each arrow is a point where the payment can stop, and nothing to
//! the right of a failure runs:
//!
//! ```text
//! current wallet -> build -> validate -> risk           (prepare)
//!   -> confirm? -> sign -> validate -> broadcast -> history (sign_and_broadcast)
//! ```
//!
//! The air-gapped variant splits the same path across two devices:
//!
//! ```text
//! prepare -> export_unsigned ==QR==> cold_sign ==QR==> broadcast_scanned
//! ```
//!
//! History is written only after the node has accepted the transaction.

use std::sync::Arc;

use chrono::Utc;

use crate::codec::address::Address;
use crate::config::Settings;
use crate::error::{PaymentError, PaymentResult};
use crate::history::{HistoryLedger, TransactionRecord};
use crate::network::client::TronClient;
use crate::qr::framing::encode_frames;
use crate::qr::payload::{SignedPayload, UnsignedPayload};
use crate::qr::verifier::verify_scanned;
use crate::risk::{assess_now, RiskOutcome};
use crate::transaction::builder::TransactionBuilder;
use crate::transaction::types::{SignedTransaction, UnsignedTransaction};
use crate::transaction::verification::{validate_signed_with_config, validate_with_config, Stage};
use crate::vault::{KeyStore, Wallet};

/// A built, validated and risk-assessed transfer waiting for a signature.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub tx: UnsignedTransaction,
    pub risk: RiskOutcome,
    pub wallet: Wallet,
}

/// What the online device shows and keeps for an air-gapped payment.
#[derive(Debug, Clone)]
pub struct UnsignedExport {
    pub payload: UnsignedPayload,
    pub frames: Vec<String>,
}

pub struct PaymentEngine {
    keystore: Arc<KeyStore>,
    client: TronClient,
    ledger: Arc<HistoryLedger>,
    settings: Settings,
}

impl PaymentEngine {
    pub fn new(
        keystore: Arc<KeyStore>,
        client: TronClient,
        ledger: Arc<HistoryLedger>,
        settings: Settings,
    ) -> Self {
        Self {
            keystore,
            client,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &TronClient {
        &self.client
    }

    pub fn keystore(&self) -> &Arc<KeyStore> {
        &self.keystore
    }

    pub fn ledger(&self) -> &Arc<HistoryLedger> {
        &self.ledger
    }

    /// Builds the payment from the current wallet to the seller and runs the
    /// risk engine over it. A blocked outcome is an error.
    pub async fn prepare<F>(&self, is_whitelisted: F) -> PaymentResult<Prepared>
    where
        F: Fn(&Address) -> bool,
    {
        let wallet = self
            .keystore
            .current()
            .await?
            .ok_or(PaymentError::NoCurrentWallet)?;
        tracing::debug!(wallet_id = %wallet.id, from = %wallet.address, "building payment");

        let tx = TransactionBuilder::new(&self.settings)
            .sender(wallet.address)
            .build(&self.client)
            .await?;
        validate_with_config(&tx, &self.settings, &wallet.address)?;
        tracing::debug!(tx_id = %tx.tx_id_hex(), stage = %Stage::BuilderOutput, "validated");

        let risk = assess_now(&tx, &self.settings, is_whitelisted);
        if risk.is_blocked() {
            return Err(PaymentError::RiskBlocked(risk.message));
        }
        tracing::debug!(tx_id = %tx.tx_id_hex(), level = %risk.level, "risk assessed");

        Ok(Prepared { tx, risk, wallet })
    }

    /// Signs with the prepared wallet and broadcasts once. `confirmed` must
    /// be `true` when the risk outcome asked for confirmation.
    pub async fn sign_and_broadcast(
        &self,
        prepared: &Prepared,
        confirmed: bool,
        memo: &str,
    ) -> PaymentResult<TransactionRecord> {
        if prepared.risk.requires_confirmation && !confirmed {
            return Err(PaymentError::ConfirmationRequired(prepared.risk.message.clone()));
        }

        let signed = self
            .keystore
            .sign_transfer(&prepared.wallet.id, &prepared.tx)
            .await?;
        tracing::debug!(tx_id = %signed.tx_id_hex(), stage = %Stage::PreSign, "signed");

        self.submit(signed, &prepared.wallet.address, Stage::PreBroadcast, memo)
            .await
    }

    /// The unsigned QR payload for `prepared` and its frames.
    pub fn export_unsigned(&self, prepared: &Prepared) -> PaymentResult<UnsignedExport> {
        let payload = UnsignedPayload::from_transaction(&prepared.tx);
        let frames = encode_frames(&payload.to_json()?)?;
        tracing::debug!(
            tx_id = %prepared.tx.tx_id_hex(),
            frames = frames.len(),
            "exported unsigned payload"
        );
        Ok(UnsignedExport { payload, frames })
    }

    /// Verifies a signature scanned back from the cold signer against the
    /// payload this device exported, then broadcasts.
    pub async fn broadcast_scanned(
        &self,
        retained: &UnsignedPayload,
        scanned: &SignedPayload,
        memo: &str,
    ) -> PaymentResult<TransactionRecord> {
        let signed = verify_scanned(retained, scanned)?;
        let owner = *signed.unsigned().owner();
        tracing::debug!(tx_id = %signed.tx_id_hex(), stage = %Stage::PostScan, "scan verified");

        self.submit(signed, &owner, Stage::PostScan, memo).await
    }

    async fn submit(
        &self,
        signed: SignedTransaction,
        owner: &Address,
        stage: Stage,
        memo: &str,
    ) -> PaymentResult<TransactionRecord> {
        validate_signed_with_config(&signed, &self.settings, owner)?;
        let now = Utc::now().timestamp_millis();
        if signed.unsigned().is_expired(now) {
            return Err(PaymentError::Expired {
                expiration: signed.unsigned().expiration(),
                now,
            });
        }
        tracing::debug!(tx_id = %signed.tx_id_hex(), %stage, "ready to broadcast");

        let tx_id = self.client.broadcast(&signed).await?;

        let record = TransactionRecord::new(
            tx_id,
            *owner,
            *signed.unsigned().to(),
            signed.unsigned().amount(),
            now,
            memo.to_string(),
        );
        self.ledger.save(record.clone()).await?;
        tracing::info!(tx_id = %record.tx_id, amount_sun = record.amount_sun, "payment recorded as pending");
        Ok(record)
    }
}
