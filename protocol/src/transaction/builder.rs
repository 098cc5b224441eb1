//! Transaction construction.
//!
//! The [`TransactionBuilder`] asks the node for a fresh `createtransaction`,
//! then refuses to take the answer on faith: the binary `raw_data_hex` is
//! decoded and structurally validated, its JSON twin is compared field by
//! field, the node's `txID` is recomputed, and owner / recipient / amount
//! must equal what the configuration demands. Any disagreement is
//! `NodeMismatch`.
//!
//! The builder does not sign. That happens in [`super::signing`], behind the
//! key store.

use chrono::Utc;
use prost::Message;
use serde::Deserialize;

use super::proto::{Any, Contract, ContractType, RawData, TransferContract};
use super::types::{TaposSource, UnsignedTransaction};
use super::verification::validate_with_config;
use crate::codec::address::Address;
use crate::config::{
    Settings, MAX_TAPOS_WINDOW_MS, TRANSFER_CONTRACT_NAME, TRANSFER_CONTRACT_TYPE_URL,
};
use crate::crypto::hash::sha256;
use crate::error::{PaymentError, PaymentResult};
use crate::network::client::TronClient;
use crate::network::types::CreatedTransaction;

// ---------------------------------------------------------------------------
// TAPOS
// ---------------------------------------------------------------------------

/// Reference-block binding and validity window of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tapos {
    pub ref_block_bytes: [u8; 2],
    pub ref_block_hash: [u8; 8],
    pub timestamp: i64,
    pub expiration: i64,
}

impl Tapos {
    /// A made-up reference block. Transactions built on it are tagged
    /// [`TaposSource::Synthetic`] and can never be broadcast.
    pub fn synthetic(now_ms: i64) -> Self {
        let digest = sha256(&now_ms.to_be_bytes());
        let mut ref_block_hash = [0u8; 8];
        ref_block_hash.copy_from_slice(&digest[..8]);
        Self {
            ref_block_bytes: [0, 0],
            ref_block_hash,
            timestamp: now_ms,
            expiration: now_ms + MAX_TAPOS_WINDOW_MS,
        }
    }
}

/// Canonical `Transaction.raw` bytes for a plain TRX transfer.
pub fn encode_raw(owner: &Address, to: &Address, amount: i64, tapos: &Tapos) -> Vec<u8> {
    let transfer = TransferContract {
        owner_address: owner.as_bytes().to_vec(),
        to_address: to.as_bytes().to_vec(),
        amount,
    };

    RawData {
        ref_block_bytes: tapos.ref_block_bytes.to_vec(),
        ref_block_hash: tapos.ref_block_hash.to_vec(),
        expiration: tapos.expiration,
        timestamp: tapos.timestamp,
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
    .encode_to_vec()
}

/// Encodes and validates a transfer in one step.
pub fn assemble_transfer(
    owner: &Address,
    to: &Address,
    amount: i64,
    tapos: &Tapos,
) -> PaymentResult<UnsignedTransaction> {
    UnsignedTransaction::from_raw_bytes(encode_raw(owner, to, amount, tapos))
}

// ---------------------------------------------------------------------------
// Node JSON shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NodeRawData {
    contract: Vec<NodeContract>,
    ref_block_bytes: String,
    ref_block_hash: String,
    expiration: i64,
    timestamp: i64,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeContract {
    #[serde(rename = "type")]
    kind: String,
    parameter: NodeParameter,
}

#[derive(Debug, Deserialize)]
struct NodeParameter {
    #[serde(default)]
    type_url: String,
    value: NodeTransferValue,
}

#[derive(Debug, Deserialize)]
struct NodeTransferValue {
    #[serde(default)]
    amount: i64,
    owner_address: String,
    to_address: String,
}

fn mismatch(reason: impl Into<String>) -> PaymentError {
    PaymentError::NodeMismatch(reason.into())
}

/// Compares the node's JSON rendering and txID against the decoded bytes.
fn cross_check(tx: &UnsignedTransaction, created: &CreatedTransaction) -> PaymentResult<()> {
    if !created.tx_id.eq_ignore_ascii_case(&tx.tx_id_hex()) {
        return Err(mismatch(format!(
            "node txID {} does not hash raw_data ({})",
            created.tx_id,
            tx.tx_id_hex()
        )));
    }

    let json: NodeRawData = serde_json::from_value(created.raw_data.clone())
        .map_err(|e| mismatch(format!("unreadable raw_data JSON: {e}")))?;

    if json.data.as_deref().is_some_and(|d| !d.is_empty()) {
        return Err(mismatch("raw_data JSON carries data"));
    }
    let [contract] = json.contract.as_slice() else {
        return Err(mismatch(format!(
            "raw_data JSON has {} contracts",
            json.contract.len()
        )));
    };
    if contract.kind != TRANSFER_CONTRACT_NAME {
        return Err(mismatch(format!("raw_data JSON contract is {}", contract.kind)));
    }
    if !contract.parameter.type_url.is_empty()
        && contract.parameter.type_url != TRANSFER_CONTRACT_TYPE_URL
    {
        return Err(mismatch(format!(
            "raw_data JSON type_url is {}",
            contract.parameter.type_url
        )));
    }

    let value = &contract.parameter.value;
    let owner = Address::from_node_repr(&value.owner_address)
        .map_err(|_| mismatch("raw_data JSON owner_address is not an address"))?;
    let to = Address::from_node_repr(&value.to_address)
        .map_err(|_| mismatch("raw_data JSON to_address is not an address"))?;
    if owner != *tx.owner() || to != *tx.to() || value.amount != tx.amount() {
        return Err(mismatch("raw_data JSON disagrees with raw_data_hex"));
    }

    if !json.ref_block_bytes.eq_ignore_ascii_case(&hex::encode(tx.ref_block_bytes()))
        || !json.ref_block_hash.eq_ignore_ascii_case(&hex::encode(tx.ref_block_hash()))
        || json.expiration != tx.expiration()
        || json.timestamp != tx.timestamp()
    {
        return Err(mismatch("raw_data JSON TAPOS fields disagree with raw_data_hex"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for the one transaction this engine makes.
///
/// ```rust,no_run
/// # async fn demo(client: &trxsafe_protocol::network::TronClient,
/// #               owner: trxsafe_protocol::codec::Address) -> trxsafe_protocol::error::PaymentResult<()> {
/// use trxsafe_protocol::config::Settings;
/// use trxsafe_protocol::transaction::TransactionBuilder;
///
/// let settings = Settings::new("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", 5_000_000, 3);
/// let tx = TransactionBuilder::new(&settings)
///     .sender(owner)
///     .build(client)
///     .await?;
/// assert_eq!(tx.amount(), 15_000_000);
/// # Ok(())
/// # }
/// ```
pub struct TransactionBuilder<'a> {
    settings: &'a Settings,
    sender: Option<Address>,
    synthetic: Option<Tapos>,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            sender: None,
            synthetic: None,
        }
    }

    /// The paying address. Becomes `owner_address`.
    pub fn sender(mut self, owner: Address) -> Self {
        self.sender = Some(owner);
        self
    }

    /// Reference block for [`build_offline`](Self::build_offline).
    pub fn synthetic_tapos(mut self, tapos: Tapos) -> Self {
        self.synthetic = Some(tapos);
        self
    }

    fn targets(&self) -> PaymentResult<(Address, Address, i64)> {
        self.settings.validate()?;
        let owner = self.sender.ok_or(PaymentError::NoCurrentWallet)?;
        Ok((owner, self.settings.seller()?, self.settings.total_sun()?))
    }

    /// Builds through the node: `createtransaction`, then every check above.
    pub async fn build(&self, client: &TronClient) -> PaymentResult<UnsignedTransaction> {
        let (owner, seller, amount) = self.targets()?;

        let created = client.create_transaction(&owner, &seller, amount).await?;
        let raw_bytes = hex::decode(&created.raw_data_hex)
            .map_err(|_| mismatch("raw_data_hex is not hex"))?;
        let tx = UnsignedTransaction::from_raw_bytes(raw_bytes)?;

        if *tx.owner() != owner {
            return Err(mismatch(format!("owner {} != requested {owner}", tx.owner())));
        }
        if *tx.to() != seller {
            return Err(mismatch(format!("recipient {} != requested {seller}", tx.to())));
        }
        if tx.amount() != amount {
            return Err(mismatch(format!(
                "amount {} != requested {amount}",
                tx.amount()
            )));
        }
        if tx.expiration() - tx.timestamp() > MAX_TAPOS_WINDOW_MS {
            return Err(mismatch(format!(
                "validity window {} ms exceeds {MAX_TAPOS_WINDOW_MS} ms",
                tx.expiration() - tx.timestamp()
            )));
        }
        cross_check(&tx, &created)?;

        validate_with_config(&tx, self.settings, &owner)?;
        tracing::debug!(tx_id = %tx.tx_id_hex(), amount, "transaction built from node TAPOS");
        Ok(tx)
    }

    /// Builds without a node. Requires [`synthetic_tapos`](Self::synthetic_tapos);
    /// otherwise fails with `NoTapos` rather than inventing a reference block.
    pub fn build_offline(&self) -> PaymentResult<UnsignedTransaction> {
        let (owner, seller, amount) = self.targets()?;
        let tapos = self.synthetic.ok_or(PaymentError::NoTapos)?;

        if tapos.expiration - tapos.timestamp > MAX_TAPOS_WINDOW_MS {
            return Err(PaymentError::MalformedTransaction(format!(
                "validity window {} ms exceeds {MAX_TAPOS_WINDOW_MS} ms",
                tapos.expiration - tapos.timestamp
            )));
        }

        let tx = assemble_transfer(&owner, &seller, amount, &tapos)?
            .with_tapos_source(TaposSource::Synthetic);
        validate_with_config(&tx, self.settings, &owner)?;
        tracing::warn!(tx_id = %tx.tx_id_hex(), "built transaction with synthetic TAPOS");
        Ok(tx)
    }
}

/// Synthetic TAPOS anchored at the current wall clock.
pub fn synthetic_tapos_now() -> Tapos {
    Tapos::synthetic(Utc::now().timestamp_millis())
}
