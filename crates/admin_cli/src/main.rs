use std::error::Error;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    ContraStatus, CreateContraCmd, Engine, EngineError, EntryType, LedgerEntry, MoneyCents,
    PostEntryCmd, StartClosingCmd, YearEndClosingSnapshot,
};
use migration::MigratorTrait;

#[derive(Parser, Debug)]
#[command(name = "farebook_admin")]
#[command(about = "Back-office utilities for the farebook ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./farebook.db?mode=rwc"
    )]
    database_url: String,

    /// Log level for the engine and this tool.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append one ledger entry.
    Post(PostArgs),
    /// Show a scope's current balance for a financial year.
    Balance(StreamArgs),
    /// List a scope's entries for a financial year.
    Entries(StreamArgs),
    Contra(Contra),
    Closing(Closing),
}

#[derive(Args, Debug)]
struct PostArgs {
    #[arg(long)]
    scope: String,
    #[arg(long)]
    year: String,
    /// "debit" or "credit".
    #[arg(long, value_parser = parse_entry_type)]
    entry_type: EntryType,
    /// Decimal amount, e.g. "1000.00".
    #[arg(long, value_parser = parse_amount)]
    amount: MoneyCents,
    #[arg(long)]
    entry_ref: String,
    #[arg(long)]
    remarks: Option<String>,
    #[arg(long)]
    pnr: Option<String>,
    #[arg(long)]
    payment: Option<String>,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    created_by: String,
}

#[derive(Args, Debug)]
struct StreamArgs {
    #[arg(long)]
    scope: String,
    #[arg(long)]
    year: String,
}

#[derive(Args, Debug)]
struct Contra {
    #[command(subcommand)]
    command: ContraCommand,
}

#[derive(Subcommand, Debug)]
enum ContraCommand {
    /// Transfer a balance between two accounts.
    Create(ContraCreateArgs),
    /// Soft status change (active, inactive, deleted).
    SetStatus(ContraStatusArgs),
    /// Post the compensating pair and deactivate the contra.
    Reverse(ContraReverseArgs),
    List(ContraListArgs),
    Show(ContraShowArgs),
}

#[derive(Args, Debug)]
struct ContraCreateArgs {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    year: String,
    /// Transfer date, e.g. "2024-07-01".
    #[arg(long, value_parser = parse_date)]
    date: NaiveDate,
    #[arg(long, value_parser = parse_amount)]
    amount: MoneyCents,
    #[arg(long)]
    narration: String,
    #[arg(long)]
    ref_number: Option<String>,
    #[arg(long)]
    created_by: String,
}

#[derive(Args, Debug)]
struct ContraStatusArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, value_parser = parse_contra_status)]
    status: ContraStatus,
}

#[derive(Args, Debug)]
struct ContraReverseArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    reversed_by: String,
}

#[derive(Args, Debug)]
struct ContraListArgs {
    #[arg(long)]
    include_deleted: bool,
}

#[derive(Args, Debug)]
struct ContraShowArgs {
    #[arg(long)]
    entry_no: String,
}

#[derive(Args, Debug)]
struct Closing {
    #[command(subcommand)]
    command: ClosingCommand,
}

#[derive(Subcommand, Debug)]
enum ClosingCommand {
    /// Open the year-end closing as a draft snapshot.
    Start(ClosingStartArgs),
    /// Freeze a draft snapshot.
    Finalize(ClosingYearArgs),
    /// Seed next year's opening balances from a finalized snapshot.
    CarryForward(ClosingCarryArgs),
    Show(ClosingYearArgs),
    List,
}

#[derive(Args, Debug)]
struct ClosingStartArgs {
    #[arg(long)]
    year: String,
    #[arg(long, value_parser = parse_date)]
    closing_date: NaiveDate,
    #[arg(long)]
    remarks: Option<String>,
    #[arg(long)]
    created_by: String,
}

#[derive(Args, Debug)]
struct ClosingYearArgs {
    #[arg(long)]
    year: String,
}

#[derive(Args, Debug)]
struct ClosingCarryArgs {
    #[arg(long)]
    year: String,
    #[arg(long)]
    carried_by: String,
}

fn parse_entry_type(raw: &str) -> Result<EntryType, String> {
    EntryType::try_from(raw.to_uppercase().as_str()).map_err(|err| err.to_string())
}

fn parse_contra_status(raw: &str) -> Result<ContraStatus, String> {
    ContraStatus::try_from(raw.to_lowercase().as_str()).map_err(|err| err.to_string())
}

fn parse_amount(raw: &str) -> Result<MoneyCents, String> {
    raw.parse().map_err(|err: EngineError| err.to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| err.to_string())
}

fn print_entry(entry: &LedgerEntry) {
    println!(
        "#{} {} {} {} {} opening={} closing={} by {}",
        entry.id,
        entry.scope_ref,
        entry.entry_type.as_str(),
        entry.amount,
        entry.entry_ref,
        entry.opening_balance,
        entry.closing_balance,
        entry.created_by,
    );
}

fn print_snapshot(snapshot: &YearEndClosingSnapshot) {
    println!(
        "{} [{}] closing_date={} receivables={} advances={} customers={} pending_items={}",
        snapshot.financial_year,
        snapshot.status.as_str(),
        snapshot.closing_date,
        snapshot.total_pending_receivables,
        snapshot.total_advance_balance,
        snapshot.total_customers_with_outstanding,
        snapshot.total_pending_items,
    );
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run(engine: &Engine, command: Command) -> Result<(), EngineError> {
    match command {
        Command::Post(args) => {
            let mut cmd = PostEntryCmd::new(
                args.scope,
                args.year,
                args.entry_type,
                args.amount,
                args.entry_ref,
                args.created_by,
            );
            if let Some(remarks) = args.remarks {
                cmd = cmd.remarks(remarks);
            }
            if let Some(pnr) = args.pnr {
                cmd = cmd.pnr_id(pnr);
            }
            if let Some(payment) = args.payment {
                cmd = cmd.payment_id(payment);
            }
            if let Some(account) = args.account {
                cmd = cmd.account_id(account);
            }
            let entry = engine.post_entry(cmd).await?;
            print_entry(&entry);
        }
        Command::Balance(args) => {
            let balance = engine.scope_balance(&args.scope, &args.year).await?;
            println!("{} {} {balance}", args.scope, args.year);
        }
        Command::Entries(args) => {
            for entry in engine.entries_for_scope(&args.scope, &args.year).await? {
                print_entry(&entry);
            }
        }
        Command::Contra(Contra { command }) => match command {
            ContraCommand::Create(args) => {
                let mut cmd = CreateContraCmd::new(
                    args.from,
                    args.to,
                    args.year,
                    args.date,
                    args.amount,
                    args.narration,
                    args.created_by,
                );
                if let Some(ref_number) = args.ref_number {
                    cmd = cmd.ref_number(ref_number);
                }
                let contra = engine.create_contra(cmd).await?;
                println!(
                    "created contra {} ({} -> {}, {})",
                    contra.entry_no, contra.from_account, contra.to_account, contra.amount
                );
            }
            ContraCommand::SetStatus(args) => {
                let contra = engine.set_contra_status(args.id, args.status).await?;
                println!("contra {} is now {}", contra.entry_no, contra.status.as_str());
            }
            ContraCommand::Reverse(args) => {
                let contra = engine.reverse_contra(args.id, &args.reversed_by).await?;
                println!("reversed contra {}", contra.entry_no);
            }
            ContraCommand::List(args) => {
                for contra in engine.list_contras(args.include_deleted).await? {
                    println!(
                        "#{} {} [{}] {} -> {} {} ({})",
                        contra.id,
                        contra.entry_no,
                        contra.status.as_str(),
                        contra.from_account,
                        contra.to_account,
                        contra.amount,
                        contra.narration,
                    );
                }
            }
            ContraCommand::Show(args) => {
                let contra = engine.contra_by_entry_no(&args.entry_no).await?;
                println!(
                    "#{} {} [{}] {} -> {} {} on {} by {}",
                    contra.id,
                    contra.entry_no,
                    contra.status.as_str(),
                    contra.from_account,
                    contra.to_account,
                    contra.amount,
                    contra.date,
                    contra.created_by,
                );
            }
        },
        Command::Closing(Closing { command }) => match command {
            ClosingCommand::Start(args) => {
                let mut cmd = StartClosingCmd::new(args.year, args.closing_date, args.created_by);
                if let Some(remarks) = args.remarks {
                    cmd = cmd.remarks(remarks);
                }
                print_snapshot(&engine.start_closing(cmd).await?);
            }
            ClosingCommand::Finalize(args) => {
                print_snapshot(&engine.finalize(&args.year).await?);
            }
            ClosingCommand::CarryForward(args) => {
                print_snapshot(&engine.carry_forward(&args.year, &args.carried_by).await?);
            }
            ClosingCommand::Show(args) => {
                print_snapshot(&engine.snapshot(&args.year).await?);
            }
            ClosingCommand::List => {
                for snapshot in engine.list_snapshots().await? {
                    print_snapshot(&snapshot);
                }
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "farebook_admin={level},engine={level}",
            level = cli.log_level
        ))
        .init();

    let db = connect_db(&cli.database_url).await?;
    tracing::debug!(database_url = %cli.database_url, "database connected and migrated");
    let engine = Engine::builder().database(db).build().await?;

    if let Err(err) = run(&engine, cli.command).await {
        eprintln!("{err}");
        // Retryable conflicts get their own exit code so wrappers can back
        // off and try again.
        std::process::exit(if err.is_retryable() { 3 } else { 1 });
    }

    Ok(())
}
