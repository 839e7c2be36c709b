use clap::{Args, Parser, Subcommand, ValueEnum};
use ledgerpay::application::batch::FailurePolicy;
use ledgerpay::application::orchestrator::{
    PAYMENT_CONCURRENCY, PaymentOrchestrator, SettlementConfig,
};
use ledgerpay::domain::charge::{BuildingId, UnixSeconds, UserId};
use ledgerpay::domain::ledger::{LedgerScope, ScopeQuery};
use ledgerpay::infrastructure::in_memory::InMemoryChargeSource;
use ledgerpay::infrastructure::simulated_gateway::{GATEWAY_CONCURRENCY_LIMIT, SimulatedGateway};
use ledgerpay::interfaces::csv::charge_reader::ChargeReader;
use ledgerpay::interfaces::csv::ledger_writer::LedgerWriter;
use ledgerpay::telemetry;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr. `RUST_LOG` overrides this.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ledger items of one building or one user, most recent first.
    Ledger(LedgerArgs),
    /// Pay every ledger item that is due, through the simulated gateway.
    Settle(SettleArgs),
}

#[derive(Args)]
struct LedgerArgs {
    /// Input charges CSV file
    input: PathBuf,

    /// Only list charges of this building
    #[arg(long)]
    building_id: Option<String>,

    /// Only list charges of this user
    #[arg(long)]
    user_id: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Args)]
struct SettleArgs {
    /// Input charges CSV file
    input: PathBuf,

    /// Current time as a unix timestamp in seconds
    #[arg(long, allow_negative_numbers = true)]
    now: UnixSeconds,

    /// Maximum number of payments in flight at once
    #[arg(long, default_value_t = PAYMENT_CONCURRENCY)]
    concurrency: usize,

    #[arg(long, value_enum, default_value_t = PolicyArg::FailFast)]
    policy: PolicyArg,

    /// Make the simulated gateway decline this user (repeatable)
    #[arg(long = "decline-user")]
    decline_users: Vec<String>,

    /// Simulated gateway latency per payment, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    FailFast,
    CollectAll,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::FailFast => FailurePolicy::FailFast,
            PolicyArg::CollectAll => FailurePolicy::CollectAll,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(if cli.verbose { "info" } else { "warn" });

    match cli.command {
        Commands::Ledger(args) => run_ledger(args).await,
        Commands::Settle(args) => run_settle(args).await,
    }
}

async fn run_ledger(args: LedgerArgs) -> Result<()> {
    let query = ScopeQuery {
        building_id: args.building_id.map(BuildingId::new),
        user_id: args.user_id.map(UserId::new),
    };
    // A bad selector is reported before the input is touched.
    LedgerScope::try_from(query.clone()).into_diagnostic()?;

    let source = load_charges(&args.input)?;
    let orchestrator = PaymentOrchestrator::new(
        Box::new(source),
        Arc::new(SimulatedGateway::default()),
    );
    let items = orchestrator.list_ledger_items(query).await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    let written = match args.format {
        OutputFormat::Csv => writer.write_ledger_csv(&items),
        OutputFormat::Json => writer.write_ledger_json(&items),
    };
    written.into_diagnostic()?;

    Ok(())
}

async fn run_settle(args: SettleArgs) -> Result<()> {
    let source = load_charges(&args.input)?;
    let gateway = SimulatedGateway::new(GATEWAY_CONCURRENCY_LIMIT)
        .with_latency(Duration::from_millis(args.latency_ms))
        .with_declined_users(args.decline_users.into_iter().map(UserId::new));

    let orchestrator = PaymentOrchestrator::new(Box::new(source), Arc::new(gateway.clone()))
        .with_config(SettlementConfig {
            concurrency: args.concurrency,
            policy: args.policy.into(),
        });
    let settled = orchestrator.settle_due_payments(args.now).await;
    // Payments still running after a failure finish before the runtime exits.
    orchestrator.wait_for_in_flight().await;
    settled.into_diagnostic()?;

    let receipts = gateway.receipts().await;
    let stdout = io::stdout();
    LedgerWriter::new(stdout.lock())
        .write_receipts_csv(&receipts)
        .into_diagnostic()?;

    Ok(())
}

/// Reads every well-formed charge of the file; malformed rows are skipped.
fn load_charges(path: &Path) -> Result<InMemoryChargeSource> {
    let file = File::open(path).into_diagnostic()?;
    let mut charges = Vec::new();
    for charge in ChargeReader::new(file).charges() {
        match charge {
            Ok(charge) => charges.push(charge),
            Err(error) => warn!(%error, "Skipping malformed charge"),
        }
    }
    Ok(InMemoryChargeSource::from(charges))
}
