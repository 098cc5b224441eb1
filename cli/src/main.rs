// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # trxsafe
//!
//! Entry point for the `trxsafe` binary. Parses CLI arguments, initializes
//! logging, opens the data directory and runs one subcommand:
//!
//! - `wallet`  - create, import, select, rename, delete and back up wallets
//! - `config`  - show or change the seller, price and node
//! - `balance` / `estimate` - account state and transfer cost
//! - `send`    - one payment, online
//! - `qr`      - one payment, air-gapped
//! - `history` / `poll` - what was sent and whether it landed

mod cli;
mod context;
mod logging;

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use trxsafe_protocol::codec::address::Address;
use trxsafe_protocol::codec::amount::{sun_to_trx, trx_to_sun};
use trxsafe_protocol::config::{Settings, DEFAULT_PAGE_SIZE, QR_PAYLOAD_VERSION};
use trxsafe_protocol::history::{StatusPoller, TransactionRecord, TransactionStatus};
use trxsafe_protocol::pipeline::Prepared;
use trxsafe_protocol::qr::{
    cold_sign, encode_frames, reassemble, SignedPayload, UnsignedPayload,
};
use trxsafe_protocol::resources::ResourceEstimator;
use trxsafe_protocol::risk::RiskLevel;
use trxsafe_protocol::vault::{KeyStore, Wallet};

use cli::{
    BalanceArgs, Commands, ConfigCommand, ConfigSetArgs, HistoryArgs, PollArgs, QrCommand,
    SendArgs, TrxsafeCli, WalletCommand,
};
use context::AppContext;
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TrxsafeCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, LogFormat::from_str_lossy(&cli.log_format));

    let ctx = AppContext::new(&cli.data_dir, cli.node_url.clone());
    tracing::debug!(data_dir = %ctx.data_dir().display(), "starting trxsafe");

    match cli.command {
        Commands::Wallet(cmd) => wallet(&ctx, cmd).await,
        Commands::Config(cmd) => config(&ctx, cmd),
        Commands::Balance(args) => balance(&ctx, args).await,
        Commands::Estimate => estimate(&ctx).await,
        Commands::Send(args) => send(&ctx, args).await,
        Commands::Qr(cmd) => qr(&ctx, cmd).await,
        Commands::History(args) => history(&ctx, args).await,
        Commands::Poll(args) => poll(&ctx, args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// wallet
// ---------------------------------------------------------------------------

async fn wallet(ctx: &AppContext, cmd: WalletCommand) -> Result<()> {
    let keystore = ctx.keystore().await?;
    match cmd {
        WalletCommand::Create { name } => {
            let w = keystore.create_private_key(&name).await?;
            print_wallet(&w, true);
        }
        WalletCommand::ImportKey { name, key } => {
            let w = keystore.import_private_key(&name, &key).await?;
            print_wallet(&w, false);
        }
        WalletCommand::ImportWatch { name, address } => {
            let w = keystore.import_watch_only(&name, &address).await?;
            print_wallet(&w, false);
        }
        WalletCommand::List => {
            let current = keystore.current().await?.map(|w| w.id);
            for w in keystore.list().await? {
                let mark = if current.as_deref() == Some(w.id.as_str()) { "*" } else { " " };
                println!("{mark} {}  {:<10}  {}  {}", w.id, w.kind, w.address, w.name);
            }
        }
        WalletCommand::Use { id } => {
            keystore.set_current(&id).await?;
            println!("current wallet: {id}");
        }
        WalletCommand::Rename { id, name } => {
            let w = keystore.update(&id, Some(&name), None).await?;
            print_wallet(&w, false);
        }
        WalletCommand::SetAddress { id, address } => {
            let w = keystore.update(&id, None, Some(&address)).await?;
            print_wallet(&w, false);
        }
        WalletCommand::Delete { id } => {
            keystore.delete(&id).await?;
            println!("deleted {id}");
        }
        WalletCommand::Export { id } => {
            let key = keystore.export_for_backup(&id).await?;
            eprintln!("WARNING: anyone holding this key controls the wallet's funds.");
            println!("{}", key.as_str());
        }
    }
    Ok(())
}

fn print_wallet(w: &Wallet, created: bool) {
    let verb = if created { "created" } else { "saved" };
    println!("{verb} {} wallet {}", w.kind, w.id);
    println!("  name    : {}", w.name);
    println!("  address : {}", w.address);
}

/// Addresses of every registered wallet. Recipients outside it escalate risk.
async fn address_book(keystore: &KeyStore) -> Result<HashSet<Address>> {
    Ok(keystore.list().await?.into_iter().map(|w| w.address).collect())
}

async fn current_or(keystore: &KeyStore, id: Option<&str>) -> Result<Wallet> {
    match id {
        Some(id) => Ok(keystore.get(id).await?),
        None => keystore
            .current()
            .await?
            .context("no current wallet; create or import one first"),
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn config(ctx: &AppContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => match ctx.try_load_settings()? {
            Some(settings) => println!("{}", serde_json::to_string_pretty(&settings)?),
            None => println!("no settings yet"),
        },
        ConfigCommand::Set(args) => {
            let settings = apply_config(ctx.try_load_settings()?, args)?;
            ctx.save_settings(&settings)?;
            let total = settings.total_sun()?;
            println!(
                "each payment: {} TRX to {}",
                sun_to_trx(total),
                settings.seller_address
            );
        }
    }
    Ok(())
}

fn apply_config(existing: Option<Settings>, args: ConfigSetArgs) -> Result<Settings> {
    let price = match (args.price, args.price_sun) {
        (Some(trx), _) => Some(trx_to_sun(&trx).context("invalid --price")?),
        (None, sun) => sun,
    };

    let mut settings = match existing {
        Some(s) => s,
        None => {
            let (Some(seller), Some(price)) = (args.seller.clone(), price) else {
                bail!("first configuration needs --seller and --price (or --price-sun)");
            };
            Settings::new(seller, price, args.multiplier.unwrap_or(1))
        }
    };

    if let Some(seller) = args.seller {
        settings.seller_address = seller;
    }
    if let Some(price) = price {
        settings.price_per_unit_sun = price;
    }
    if let Some(m) = args.multiplier {
        settings.multiplier = m;
    }
    if let Some(url) = args.stored_node_url {
        settings.node_url = url;
    }
    if let Some(locked) = args.price_locked {
        settings.price_locked = locked;
    }
    if let Some(bio) = args.biometric {
        settings.biometric_enabled = bio;
    }
    Ok(settings)
}

// ---------------------------------------------------------------------------
// balance / estimate
// ---------------------------------------------------------------------------

async fn balance(ctx: &AppContext, args: BalanceArgs) -> Result<()> {
    let keystore = ctx.keystore().await?;
    let w = current_or(&keystore, args.wallet.as_deref()).await?;
    let sun = ctx.client()?.get_account_balance(&w.address).await?;
    println!("{} TRX  ({})", sun_to_trx(sun), w.address);
    Ok(())
}

async fn estimate(ctx: &AppContext) -> Result<()> {
    let settings = ctx.load_settings()?;
    let keystore = ctx.keystore().await?;
    let w = current_or(&keystore, None).await?;
    let client = ctx.client()?;

    let a = ResourceEstimator::new(client)
        .affordability(&w.address, settings.total_sun()?)
        .await?;
    println!("bandwidth needed  : {} bytes", ResourceEstimator::estimated_bandwidth());
    println!("bandwidth free    : {} bytes", a.available_bandwidth);
    println!("burn              : {} TRX", sun_to_trx(a.burn_sun));
    println!("payment           : {} TRX", sun_to_trx(a.transfer_sun));
    println!("total needed      : {} TRX", sun_to_trx(a.total_needed_sun));
    println!("balance           : {} TRX", sun_to_trx(a.balance_sun));
    println!("can afford        : {}", if a.can_afford { "yes" } else { "no" });
    Ok(())
}

// ---------------------------------------------------------------------------
// send
// ---------------------------------------------------------------------------

fn describe(prepared: &Prepared) {
    eprintln!("from    : {} ({})", prepared.wallet.address, prepared.wallet.name);
    eprintln!("to      : {}", prepared.tx.to());
    eprintln!("amount  : {} TRX", sun_to_trx(prepared.tx.amount()));
    eprintln!("tx id   : {}", prepared.tx.tx_id_hex());
    if prepared.risk.level != RiskLevel::Pass {
        eprintln!("risk    : {} - {}", prepared.risk.level, prepared.risk.message);
    }
}

/// Asks a yes/no question on stderr; anything but `y`/`yes` is a no.
async fn confirm<R>(input: &mut R, question: &str) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    eprint!("{question} [y/N] ");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).await?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn send(ctx: &AppContext, args: SendArgs) -> Result<()> {
    let engine = ctx.engine().await?;
    let book = address_book(engine.keystore()).await?;
    let prepared = engine.prepare(|a| book.contains(a)).await?;
    describe(&prepared);

    let confirmed = if prepared.risk.requires_confirmation && !args.yes {
        confirm(&mut BufReader::new(tokio::io::stdin()), "Send anyway?").await?
    } else {
        true
    };
    if !confirmed {
        bail!("payment cancelled");
    }

    let record = engine
        .sign_and_broadcast(&prepared, confirmed, &args.memo)
        .await?;
    println!("{}", record.tx_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// qr
// ---------------------------------------------------------------------------

fn read_frames(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read frames from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

async fn qr(ctx: &AppContext, cmd: QrCommand) -> Result<()> {
    match cmd {
        QrCommand::Export { out, unsigned } => {
            let engine = ctx.engine().await?;
            let book = address_book(engine.keystore()).await?;
            let prepared = engine.prepare(|a| book.contains(a)).await?;
            describe(&prepared);

            let export = engine.export_unsigned(&prepared)?;
            let keep = unsigned.unwrap_or_else(|| out.with_extension("unsigned.json"));
            write_text(&keep, &export.payload.to_json()?)?;
            write_text(&out, &(export.frames.join("\n") + "\n"))?;
            println!("{} frame(s) written to {}", export.frames.len(), out.display());
            println!("keep {} for `trxsafe qr broadcast`", keep.display());
        }
        QrCommand::Sign { wallet, frames, out } => {
            let json = reassemble(read_frames(&frames)?)?;
            let payload = UnsignedPayload::from_json(&json)?;
            eprintln!(
                "signing {} TRX from {} to {}",
                sun_to_trx(i64::try_from(payload.amount).unwrap_or(i64::MAX)),
                payload.from,
                payload.to
            );

            let keystore = ctx.keystore().await?;
            let signed = cold_sign(&keystore, &wallet, &payload).await?;
            let frames = encode_frames(&signed.to_json()?)?;
            match out {
                Some(path) => {
                    write_text(&path, &(frames.join("\n") + "\n"))?;
                    println!("{} frame(s) written to {}", frames.len(), path.display());
                }
                None => frames.iter().for_each(|f| println!("{f}")),
            }
        }
        QrCommand::Broadcast {
            unsigned,
            frames,
            memo,
        } => {
            let retained = std::fs::read_to_string(&unsigned)
                .with_context(|| format!("failed to read {}", unsigned.display()))?;
            let retained = UnsignedPayload::from_json(&retained)?;
            let scanned = SignedPayload::from_json(&reassemble(read_frames(&frames)?)?)?;

            let engine = ctx.engine().await?;
            let record = engine.broadcast_scanned(&retained, &scanned, &memo).await?;
            println!("{}", record.tx_id);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// history / poll
// ---------------------------------------------------------------------------

fn print_record(r: &TransactionRecord) {
    let when = DateTime::from_timestamp_millis(r.timestamp_ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| r.timestamp_ms.to_string());
    println!(
        "{when}  {:<8} {:>14} TRX  {}  {}",
        r.status,
        sun_to_trx(r.amount_sun),
        r.to_address,
        r.tx_id
    );
}

async fn history(ctx: &AppContext, args: HistoryArgs) -> Result<()> {
    if args.remote {
        let keystore = ctx.keystore().await?;
        let w = current_or(&keystore, None).await?;
        let client = ctx.client()?;
        let page = if args.incoming {
            client.get_incoming_transactions(&w.address, DEFAULT_PAGE_SIZE, None).await?
        } else {
            client.get_outgoing_transactions(&w.address, DEFAULT_PAGE_SIZE, None).await?
        };
        for transfer in &page.transfers {
            print_record(&transfer.to_record());
        }
        if page.next.is_some() {
            eprintln!("(more on the node)");
        }
        return Ok(());
    }

    let status: Option<TransactionStatus> = args
        .status
        .as_deref()
        .map(str::parse::<TransactionStatus>)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let ledger = ctx.ledger().await?;
    let records = if args.today {
        ledger.today().await
    } else {
        ledger.all().await
    };
    for r in records.iter().filter(|r| status.map_or(true, |s| r.status == s)) {
        print_record(r);
    }
    Ok(())
}

async fn poll(ctx: &AppContext, args: PollArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    let client = ctx.client()?.with_cancellation(cancel.clone());
    let poller = StatusPoller::new(client, ctx.ledger().await?);

    if args.once {
        let s = poller.poll_once().await?;
        println!(
            "checked {}  confirmed {}  failed {}  pending {}  errors {}",
            s.checked, s.confirmed, s.failed, s.still_pending, s.errors
        );
        return Ok(());
    }

    let Some(handle) = poller.spawn(cancel.clone()) else {
        bail!("a status poller is already running");
    };
    eprintln!("polling; Ctrl+C to stop");
    signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
    cancel.cancel();
    handle.await.context("status poller panicked")?;
    tracing::info!("status poller stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("trxsafe {}", env!("CARGO_PKG_VERSION"));
    println!("qr payload v{QR_PAYLOAD_VERSION}");
    println!("rustc   {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn set_args() -> ConfigSetArgs {
        ConfigSetArgs {
            seller: None,
            price: None,
            price_sun: None,
            multiplier: None,
            stored_node_url: None,
            price_locked: None,
            biometric: None,
        }
    }

    #[tokio::test]
    async fn confirm_accepts_only_yes() {
        assert!(confirm(&mut &b"y\n"[..], "ok?").await.unwrap());
        assert!(confirm(&mut &b" YES \n"[..], "ok?").await.unwrap());
        assert!(!confirm(&mut &b"n\n"[..], "ok?").await.unwrap());
        assert!(!confirm(&mut &b""[..], "ok?").await.unwrap());
    }

    #[test]
    fn first_config_needs_seller_and_price() {
        assert!(apply_config(None, set_args()).is_err());

        let mut args = set_args();
        args.seller = Some(SELLER.into());
        args.price = Some("2.5".into());
        let settings = apply_config(None, args).unwrap();
        assert_eq!(settings.price_per_unit_sun, 2_500_000);
        assert_eq!(settings.multiplier, 1);
    }

    #[test]
    fn later_config_changes_only_named_fields() {
        let existing = Settings::new(SELLER, 1_000_000, 3);
        let mut args = set_args();
        args.multiplier = Some(5);
        args.price_locked = Some(true);
        let settings = apply_config(Some(existing.clone()), args).unwrap();
        assert_eq!(settings.multiplier, 5);
        assert!(settings.price_locked);
        assert_eq!(settings.price_per_unit_sun, existing.price_per_unit_sun);
        assert_eq!(settings.seller_address, existing.seller_address);
    }

    #[test]
    fn frames_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("frames.txt");
        std::fs::write(&path, "a\n\n  b  \n").unwrap();
        assert_eq!(read_frames(&path).unwrap(), vec!["a", "b"]);
    }
}
