//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use trove_history::ScanMode;

/// Trove History: lifecycles and redemptions from the block explorer
#[derive(Parser, Debug)]
#[command(name = "trove-history")]
#[command(about = "Reconstruct Trove lifecycles and redemption history")]
pub struct Cli {
    /// Explorer API key (overrides TROVE_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Directory holding the scan checkpoint
    #[arg(long, global = true, default_value = ".trove-session")]
    pub session_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lifecycle and redemptions of one account
    Account {
        /// Borrower address (0x-prefixed)
        address: String,
    },
    /// Most recent redemptions across all Troves
    Scan(ScanArgs),
}

/// Options of the `scan` subcommand.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Continue from the saved checkpoint
    #[arg(long, conflicts_with_all = ["restart", "clear"])]
    pub resume: bool,

    /// Discard the checkpoint and scan from the newest redemption
    #[arg(long, conflicts_with = "clear")]
    pub restart: bool,

    /// Discard the checkpoint and exit
    #[arg(long)]
    pub clear: bool,

    /// Maximum number of redemptions to collect
    #[arg(long)]
    pub limit: Option<usize>,
}

impl ScanArgs {
    /// Launch mode selected by the flags.
    pub fn mode(&self) -> ScanMode {
        if self.resume {
            ScanMode::Resume
        } else if self.restart {
            ScanMode::Restart
        } else {
            ScanMode::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account() {
        let cli = Cli::try_parse_from([
            "trove-history",
            "account",
            "0x1111111111111111111111111111111111111111",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Account { .. }));
        assert_eq!(cli.session_dir, PathBuf::from(".trove-session"));
    }

    #[test]
    fn test_parse_scan_modes() {
        let cli = Cli::try_parse_from(["trove-history", "scan", "--resume", "--limit", "10"]).unwrap();
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.mode(), ScanMode::Resume);
        assert_eq!(args.limit, Some(10));

        let cli = Cli::try_parse_from(["trove-history", "scan"]).unwrap();
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.mode(), ScanMode::Fresh);
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(Cli::try_parse_from(["trove-history", "scan", "--resume", "--restart"]).is_err());
        assert!(Cli::try_parse_from(["trove-history", "scan", "--restart", "--clear"]).is_err());
    }
}
