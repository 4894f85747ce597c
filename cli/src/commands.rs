pub mod interfaces;
pub mod p2pstat;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "e7mon")]
#[command(about = "Ethereum node monitor.")]
pub struct CommandLine {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure TCP handshake latency to connected peers
    #[command(alias = "p")]
    P2pstat(P2pstatArgs),
    /// List network interfaces usable for scanning
    #[command(alias = "i")]
    Interfaces,
}

#[derive(Args, Debug)]
pub struct P2pstatArgs {
    /// Interface to scan from, auto-selected when omitted
    #[arg(short, long)]
    pub interface: Option<String>,
    /// How long to wait for replies, for the whole batch
    #[arg(long, default_value_t = 2000)]
    pub deadline_ms: u64,
    /// How long to wait for the gateway's ARP reply
    #[arg(long, default_value_t = 2000)]
    pub arp_timeout_ms: u64,
    /// Repeat every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
    /// Peers as /ip4/<addr>/tcp/<port> multiaddresses or ip:port
    #[arg(required = true)]
    pub peers: Vec<String>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
