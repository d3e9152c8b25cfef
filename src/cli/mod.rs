use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{CreditLedger, HistoryFilter, LedgerError};
use crate::domain::{Credits, HistoryOrder, TransactionKind};

/// Creditum - Credit Ledger
#[derive(Parser)]
#[command(name = "creditum")]
#[command(about = "A local-first credit ledger with atomic balance adjustment")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "creditum.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Apply a signed credit adjustment to an account
    Apply {
        /// Account label or ID
        account: String,

        /// Signed amount in credits (positive adds, negative removes)
        #[arg(allow_negative_numbers = true)]
        amount: Credits,

        /// Transaction kind: purchase, spend, adjustment, refund
        #[arg(short, long)]
        kind: String,

        /// Description of the adjustment
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// Show the current balance for an account
    Balance {
        /// Account label or ID
        account: String,
    },

    /// List transaction history for an account
    History {
        /// Account label or ID
        account: String,

        /// Filter by kind: purchase, spend, adjustment, refund
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of transactions to skip
        #[arg(long)]
        offset: Option<i64>,

        /// Show newest transactions first
        #[arg(long)]
        newest_first: bool,
    },

    /// Verify that stored balances match the transaction ledger
    Verify {
        /// Limit the check to one account (label or ID)
        account: Option<String>,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: history, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Limit history export to one account
        #[arg(short, long)]
        account: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account label (must be unique)
        label: String,
    },

    /// List all accounts
    List {
        /// Include closed accounts
        #[arg(long)]
        all: bool,
    },

    /// Show detailed account information
    Show {
        /// Account label or ID
        account: String,
    },

    /// Close an account (hidden from listings, history kept)
    Close {
        /// Account label or ID
        account: String,
    },

    /// Reopen a closed account
    Reopen {
        /// Account label or ID
        account: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                CreditLedger::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let ledger = CreditLedger::connect(&self.database).await?;
                run_account_command(&ledger, account_cmd).await?;
            }

            Commands::Apply {
                account,
                amount,
                kind,
                description,
            } => {
                let ledger = CreditLedger::connect(&self.database).await?;
                run_apply_command(&ledger, &account, amount, &kind, description).await?;
            }

            Commands::Balance { account } => {
                let ledger = CreditLedger::connect(&self.database).await?;
                let acct = ledger.find_account(&account).await?;
                let balance = ledger.current_balance(acct.id).await?;
                println!("{}: {} credits", acct.label, balance);
            }

            Commands::History {
                account,
                kind,
                from_date,
                to_date,
                limit,
                offset,
                newest_first,
            } => {
                let ledger = CreditLedger::connect(&self.database).await?;
                run_history_command(
                    &ledger,
                    &account,
                    kind.as_deref(),
                    from_date,
                    to_date,
                    limit,
                    offset,
                    newest_first,
                )
                .await?;
            }

            Commands::Verify { account } => {
                let ledger = CreditLedger::connect(&self.database).await?;
                run_verify_command(&ledger, account.as_deref()).await?;
            }

            Commands::Export {
                export_type,
                output,
                account,
            } => {
                let ledger = CreditLedger::connect(&self.database).await?;
                run_export_command(&ledger, &export_type, output.as_deref(), account.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(ledger: &CreditLedger, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create { label } => {
            let account = ledger.create_account(label).await?;
            println!("Created account: {} ({})", account.label, account.id);
        }

        AccountCommands::List { all } => {
            let accounts = ledger.list_accounts(all).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<20} {:>12} {:<8}", "LABEL", "BALANCE", "STATUS");
                println!("{}", "-".repeat(44));
                for account in accounts {
                    println!(
                        "{:<20} {:>12} {:<8}",
                        truncate(&account.label, 20),
                        account.balance,
                        if account.is_closed() { "closed" } else { "open" }
                    );
                }
            }
        }

        AccountCommands::Show { account } => {
            let info = ledger.account_info(&account).await?;
            let acct = &info.account;

            println!("Account: {}", acct.label);
            println!("  ID:            {}", acct.id);
            println!(
                "  Created:       {}",
                acct.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(closed) = acct.closed_at {
                println!("  Closed:        {}", closed.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            println!("  Balance:       {} credits", acct.balance);
            println!("  Transactions:  {}", info.transaction_count);
            if let Some(last) = info.last_activity {
                println!("  Last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        AccountCommands::Close { account } => {
            let account = ledger.close_account(&account).await?;
            println!("Closed account: {}", account.label);
        }

        AccountCommands::Reopen { account } => {
            let account = ledger.reopen_account(&account).await?;
            println!("Reopened account: {}", account.label);
        }
    }
    Ok(())
}

async fn run_apply_command(
    ledger: &CreditLedger,
    account: &str,
    amount: Credits,
    kind: &str,
    description: Option<String>,
) -> Result<()> {
    let kind =
        TransactionKind::from_str(kind).ok_or_else(|| LedgerError::InvalidKind(kind.to_string()))?;

    let acct = ledger.find_account(account).await?;
    let applied = ledger.apply(acct.id, amount, kind, description).await?;

    println!(
        "Applied {} ({}) to {} (transaction {})",
        applied.transaction.amount, applied.transaction.kind, acct.label, applied.transaction.id
    );
    println!("New balance: {} credits", applied.balance);

    Ok(())
}

async fn run_history_command(
    ledger: &CreditLedger,
    account: &str,
    kind: Option<&str>,
    from_date: Option<String>,
    to_date: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    newest_first: bool,
) -> Result<()> {
    let kind = kind
        .map(|raw| {
            TransactionKind::from_str(raw).ok_or_else(|| LedgerError::InvalidKind(raw.to_string()))
        })
        .transpose()?;

    // Parse dates
    let from_date_parsed = from_date
        .map(|s| parse_date(&s))
        .transpose()
        .context("Invalid from-date")?;
    let to_date_parsed = to_date
        .map(|s| parse_date(&s))
        .transpose()
        .context("Invalid to-date")?;

    let order = if newest_first {
        HistoryOrder::NewestFirst
    } else {
        HistoryOrder::OldestFirst
    };

    let acct = ledger.find_account(account).await?;

    let filter = HistoryFilter {
        kind,
        from_date: from_date_parsed,
        to_date: to_date_parsed,
        order,
        limit,
        offset,
    };

    let transactions = ledger.list_transactions_filtered(acct.id, filter).await?;

    if transactions.is_empty() {
        println!("No transactions found.");
    } else {
        println!(
            "{:<6} {:<12} {:>10} {:<12} DESCRIPTION",
            "ID", "DATE", "AMOUNT", "KIND"
        );
        println!("{}", "-".repeat(70));

        for tx in &transactions {
            let date = tx.created_at.format("%Y-%m-%d").to_string();
            let desc = tx.description.as_deref().unwrap_or("");

            println!(
                "{:<6} {:<12} {:>10} {:<12} {}",
                tx.id,
                date,
                tx.amount,
                tx.kind.as_str(),
                truncate(desc, 30)
            );
        }
    }

    Ok(())
}

async fn run_verify_command(ledger: &CreditLedger, account: Option<&str>) -> Result<()> {
    if let Some(handle) = account {
        return match ledger.verify_account(handle).await? {
            None => {
                println!("Account balance matches its transaction history.");
                Ok(())
            }
            Some(drift) => {
                println!(
                    "Balance drift on {}: stored balance {} but ledger sums to {}",
                    drift.label, drift.balance, drift.ledger_sum
                );
                anyhow::bail!("Ledger verification failed");
            }
        };
    }

    println!("Verifying ledger consistency...\n");

    let report = ledger.verify().await?;

    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_clean() {
        println!("Ledger is consistent: every balance matches its transaction history.");
        return Ok(());
    }

    if !report.drifts.is_empty() {
        println!("Balance drift detected:");
        for drift in &report.drifts {
            println!(
                "  - {}: stored balance {} but ledger sums to {}",
                drift.label, drift.balance, drift.ledger_sum
            );
        }
    }
    if report.zero_amount_rows > 0 {
        println!("Zero-amount ledger rows: {}", report.zero_amount_rows);
    }
    if report.orphaned_rows > 0 {
        println!("Ledger rows without an account: {}", report.orphaned_rows);
    }

    anyhow::bail!("Ledger verification failed");
}

async fn run_export_command(
    ledger: &CreditLedger,
    export_type: &str,
    output: Option<&str>,
    account: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(ledger);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "history" => {
            let count = exporter.export_history_csv(writer, account).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} accounts, {} transactions",
                    snapshot.accounts.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: history, balances, full",
                export_type
            );
        }
    }

    Ok(())
}

/// Truncate to at most `max_len` characters, counting in chars rather than
/// bytes so multi-byte labels and descriptions never split mid-character.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_date(date_str: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    use chrono::NaiveDate;

    // Parse YYYY-MM-DD format
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    // Convert to UTC datetime at midnight
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(chrono::DateTime::from_naive_utc_and_offset(
        naive_datetime,
        chrono::Utc,
    ))
}
