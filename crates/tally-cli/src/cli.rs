use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tally_types::{
    AlertId, Currency, EntryId, EntryType, OrderId, PaymentMethod, Severity, ShiftId, StaffId,
    VenueId,
};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Tally: append-only, hash-chained payment ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Journal file holding the ledger.
    #[arg(long, global = true, default_value = "tally.journal")]
    pub journal: PathBuf,

    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record a financial event
    Append(AppendArgs),
    /// List ledger entries of a venue
    Log(LogArgs),
    /// Verify venue hash chains
    Verify(VerifyArgs),
    /// Evaluate a closing drawer count
    Count(CountArgs),
    /// Show the cash variance alert feed
    Alerts(AlertsArgs),
    /// Resolve a cash variance alert
    Resolve(ResolveArgs),
    /// Purge expired idempotency records
    Sweep,
    /// Print the effective configuration
    Config,
}

/// Who is acting. Defaults to the system actor.
#[derive(Args, Clone, Debug, Default)]
pub struct ActorArgs {
    /// Acting staff member.
    #[arg(long = "as")]
    pub acting: Option<StaffId>,
    /// The acting staff member is a manager.
    #[arg(long)]
    pub manager: bool,
    #[arg(long)]
    pub terminal: Option<String>,
}

#[derive(Args)]
pub struct AppendArgs {
    #[arg(long)]
    pub venue: VenueId,
    /// Idempotency key; retries must reuse it.
    #[arg(long)]
    pub key: String,
    #[arg(long = "type", default_value = "payment_received")]
    pub entry_type: EntryType,
    /// Amount in minor units.
    #[arg(long, allow_hyphen_values = true)]
    pub amount: i64,
    #[arg(long, default_value = "BGN")]
    pub currency: Currency,
    #[arg(long)]
    pub method: Option<PaymentMethod>,
    #[arg(long)]
    pub order: Option<OrderId>,
    #[arg(long)]
    pub staff: Option<StaffId>,
    #[arg(long)]
    pub shift: Option<ShiftId>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub reference: Option<String>,
    /// Entry corrected by this adjustment.
    #[arg(long)]
    pub corrects: Option<EntryId>,
    #[command(flatten)]
    pub actor: ActorArgs,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(long)]
    pub venue: VenueId,
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
    #[arg(long = "type")]
    pub types: Vec<EntryType>,
    /// Only entries after this entry number.
    #[arg(long)]
    pub after: Option<u64>,
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Venue to verify; all venues when omitted.
    #[arg(long)]
    pub venue: Option<VenueId>,
}

#[derive(Args)]
pub struct CountArgs {
    #[arg(long)]
    pub venue: VenueId,
    /// Count key; retries must reuse it.
    #[arg(long)]
    pub key: String,
    /// Counted cash in minor units.
    #[arg(long)]
    pub actual: i64,
    /// Expected cash; computed from the ledger when omitted.
    #[arg(long)]
    pub expected: Option<i64>,
    #[arg(long, default_value = "BGN")]
    pub currency: Currency,
    #[arg(long)]
    pub shift: Option<ShiftId>,
    #[arg(long)]
    pub drawer: Option<String>,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[command(flatten)]
    pub actor: ActorArgs,
}

#[derive(Args)]
pub struct AlertsArgs {
    /// Only alerts with a larger feed sequence.
    #[arg(long, default_value = "0")]
    pub after: u64,
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
    #[arg(long)]
    pub min_severity: Option<Severity>,
    /// List one venue's alerts by business date instead of the feed.
    #[arg(long)]
    pub venue: Option<VenueId>,
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub alert: AlertId,
    #[arg(long)]
    pub notes: String,
    #[command(flatten)]
    pub actor: ActorArgs,
}
