//! Offline walkthrough of one air-gapped trxsafe payment.
//!
//! Builds a transfer on a synthetic reference block, classifies it, moves
//! it to a cold wallet and back as QR frames, catches a tampered reply, and
//! shows the broadcaster refusing a synthetic transaction. No node needed.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;
use std::time::Instant;

use trxsafe_protocol::codec::amount::sun_to_trx;
use trxsafe_protocol::config::Settings;
use trxsafe_protocol::network::{MockTransport, TronClient};
use trxsafe_protocol::qr::{
    cold_sign, encode_frames, reassemble, verify_scanned, SignedPayload, UnsignedPayload,
};
use trxsafe_protocol::resources::ResourceEstimator;
use trxsafe_protocol::risk::assess_now;
use trxsafe_protocol::storage::MemoryBlobStore;
use trxsafe_protocol::transaction::{synthetic_tapos_now, SignedTransaction, TransactionBuilder};
use trxsafe_protocol::vault::{KeyStore, StaticMasterKey};
use trxsafe_protocol::{PaymentError, PaymentResult};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]============================================{RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn refused(text: &str) {
    println!("{RED}  [REFUSED] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}  [{label}: {ms:.2} ms]{RESET}");
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> PaymentResult<()> {
    let demo_start = Instant::now();

    section(1, "Cold wallet and merchant settings");
    let cold = KeyStore::new(
        Arc::new(MemoryBlobStore::new()),
        Arc::new(StaticMasterKey::random()),
    );
    let wallet = cold.create_private_key("cold").await?;
    let settings = Settings::new(SELLER, 2_500_000, 3);
    info("wallet", &wallet.address.encode());
    info("seller", SELLER);
    info("each payment", &format!("{} TRX", sun_to_trx(settings.total_sun()?)));

    section(2, "Build on a synthetic reference block");
    let t = Instant::now();
    let tx = TransactionBuilder::new(&settings)
        .sender(wallet.address)
        .synthetic_tapos(synthetic_tapos_now())
        .build_offline()?;
    timing("build + validate", t.elapsed());
    info("tx id", &tx.tx_id_hex());

    let risk = assess_now(&tx, &settings, |a| a.encode() == SELLER);
    info("risk", &format!("{} ({})", risk.level, risk.message));
    info(
        "burn with no free bandwidth",
        &format!("{} TRX", sun_to_trx(ResourceEstimator::burn_for_bandwidth(0))),
    );

    section(3, "Unsigned payload out over QR");
    let unsigned = UnsignedPayload::from_transaction(&tx);
    let frames = encode_frames(&unsigned.to_json()?)?;
    info("frames", &frames.len().to_string());
    let scanned = UnsignedPayload::from_json(&reassemble(frames.iter().rev())?)?;
    success("reassembled in reverse order");

    section(4, "Cold signature back over QR");
    let t = Instant::now();
    let signed = cold_sign(&cold, &wallet.id, &scanned).await?;
    timing("cold sign", t.elapsed());
    let back = SignedPayload::from_json(&reassemble(encode_frames(&signed.to_json()?)?)?)?;
    let verified = verify_scanned(&unsigned, &back)?;
    success("signature recovers to the wallet over the retained raw bytes");

    let mut forged = back.clone();
    forged.amount += 1;
    match verify_scanned(&unsigned, &forged) {
        Err(PaymentError::TamperDetected(why)) => refused(&why),
        other => println!("  unexpected: {other:?}"),
    }

    section(5, "Broadcast");
    let client = TronClient::new(Arc::new(MockTransport::new()));
    let local = SignedTransaction::new(tx.clone(), verified.signature()?);
    match client.broadcast(&local).await {
        Err(PaymentError::NoTapos) => {
            refused("synthetic reference block; a node-built transaction is required")
        }
        other => println!("  unexpected: {other:?}"),
    }

    println!();
    timing("total", demo_start.elapsed());
    Ok(())
}
