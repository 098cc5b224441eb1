//! # CLI Interface
//!
//! Defines the command-line argument structure for `trxsafe` using `clap`
//! derive. Global flags select the data directory, the node and the log
//! format; everything else is a subcommand.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Constrained TRX payments from the command line.
///
/// Every payment goes from the current wallet to the configured seller for
/// exactly `price x multiplier`. Nothing else can be signed.
#[derive(Parser, Debug)]
#[command(
    name = "trxsafe",
    about = "Constrained TRON TRX payment engine",
    version,
    propagate_version = true
)]
pub struct TrxsafeCli {
    /// Directory holding settings, the encrypted wallet registry and history.
    #[arg(long, short = 'd', global = true, env = "TRXSAFE_DATA_DIR", default_value = "~/.trxsafe")]
    pub data_dir: PathBuf,

    /// Full-node HTTP endpoint. Overrides `nodeUrl` from settings.json.
    #[arg(long, global = true, env = "TRXSAFE_NODE_URL")]
    pub node_url: Option<String>,

    /// Log output on stderr: `pretty` or `json`.
    #[arg(long, global = true, env = "TRXSAFE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage wallets.
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Show or change merchant settings.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Balance of a wallet, in TRX.
    Balance(BalanceArgs),
    /// Bandwidth, burn and affordability of the next payment.
    Estimate,
    /// Build, check, sign and broadcast one payment.
    Send(SendArgs),
    /// Air-gapped signing over QR frames.
    #[command(subcommand)]
    Qr(QrCommand),
    /// Local transaction history.
    History(HistoryArgs),
    /// Refresh the status of pending transactions.
    Poll(PollArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Generate a new key.
    Create {
        #[arg(long, default_value = "Wallet")]
        name: String,
    },
    /// Import a hex private key.
    ImportKey {
        #[arg(long, default_value = "Wallet")]
        name: String,
        /// 64 hex characters, optional `0x` prefix.
        #[arg(long, env = "TRXSAFE_IMPORT_KEY", hide_env_values = true)]
        key: String,
    },
    /// Add an address that can be watched but not signed for.
    ImportWatch {
        #[arg(long, default_value = "Watch")]
        name: String,
        #[arg(long)]
        address: String,
    },
    /// List wallets; the current one is marked with `*`.
    List,
    /// Make a wallet current.
    Use { id: String },
    /// Rename a wallet.
    Rename { id: String, name: String },
    /// Re-point a watch-only wallet at another address.
    SetAddress { id: String, address: String },
    /// Remove a wallet and its key.
    Delete { id: String },
    /// Print a wallet's private key in hex, for backup.
    Export { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print settings.json.
    Show,
    /// Change settings. The first `set` must name the seller and a price.
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Address that receives every payment.
    #[arg(long)]
    pub seller: Option<String>,
    /// Price of one unit in TRX, up to 6 decimals.
    #[arg(long, conflicts_with = "price_sun")]
    pub price: Option<String>,
    /// Price of one unit in sun.
    #[arg(long)]
    pub price_sun: Option<i64>,
    /// Units per payment, 1 to 10.
    #[arg(long)]
    pub multiplier: Option<u8>,
    /// Node endpoint stored in settings.json.
    #[arg(long = "set-node-url")]
    pub stored_node_url: Option<String>,
    #[arg(long)]
    pub price_locked: Option<bool>,
    #[arg(long)]
    pub biometric: Option<bool>,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    /// Wallet id; defaults to the current wallet.
    #[arg(long)]
    pub wallet: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Confirm warnings without prompting.
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Kept in local history only; never sent on chain.
    #[arg(long, default_value = "")]
    pub memo: String,
}

#[derive(Subcommand, Debug)]
pub enum QrCommand {
    /// Build the next payment and write its unsigned frames.
    Export {
        /// Frames file, one frame per line.
        #[arg(long)]
        out: PathBuf,
        /// Where to keep the unsigned payload for `qr broadcast`.
        /// Defaults to `<out>.unsigned.json`.
        #[arg(long)]
        unsigned: Option<PathBuf>,
    },
    /// Sign scanned unsigned frames with a wallet on this device.
    Sign {
        #[arg(long)]
        wallet: String,
        /// Scanned frames, one per line.
        #[arg(long)]
        frames: PathBuf,
        /// Signed frames file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify scanned signed frames against the kept payload and broadcast.
    Broadcast {
        #[arg(long)]
        unsigned: PathBuf,
        #[arg(long)]
        frames: PathBuf,
        #[arg(long, default_value = "")]
        memo: String,
    },
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only records with this status: pending, success or failure.
    #[arg(long)]
    pub status: Option<String>,
    /// Only records from the local calendar day.
    #[arg(long)]
    pub today: bool,
    /// Ask the node for on-chain transfers of the current wallet instead.
    #[arg(long, conflicts_with_all = ["status", "today"])]
    pub remote: bool,
    /// With `--remote`, list incoming instead of outgoing transfers.
    #[arg(long, requires = "remote")]
    pub incoming: bool,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Run one pass and exit instead of polling until Ctrl+C.
    #[arg(long)]
    pub once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TrxsafeCli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = TrxsafeCli::try_parse_from([
            "trxsafe", "send", "--yes", "--data-dir", "/tmp/t", "--node-url", "http://n",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/t"));
        assert_eq!(cli.node_url.as_deref(), Some("http://n"));
        match cli.command {
            Commands::Send(args) => assert!(args.yes),
            other => panic!("expected send, got {:?}", other),
        }
    }

    #[test]
    fn price_forms_conflict() {
        assert!(TrxsafeCli::try_parse_from([
            "trxsafe", "config", "set", "--price", "1.5", "--price-sun", "1500000",
        ])
        .is_err());
    }
}
