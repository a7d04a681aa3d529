use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use crate::application::reporting::{current_month, month_name};
use crate::application::{
    ChannelNotifier, LedgerService, NotificationWorker, PAYMENT_SUCCEEDED, PaymentConfirmation,
    RecipientLookup,
};
use crate::config::{RatesArgs, RatesConfig};
use crate::domain::{BASE_CURRENCY, User, format_cents, parse_cents};
use crate::rates::ExchangeRateProvider;

/// Valuta - Multi-currency wallet ledger
#[derive(Parser)]
#[command(name = "valuta")]
#[command(about = "Multi-currency wallets with transfers, conversions and deposits")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "VALUTA_DATABASE", default_value = "valuta.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub rates: RatesArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Wallet management commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Send money to another user's default wallet
    Transfer {
        /// Amount in the sender wallet's currency (e.g., "50.00" or "50")
        amount: String,

        /// Sender wallet ID
        #[arg(long)]
        from: String,

        /// Recipient email
        #[arg(long)]
        to: String,

        /// Note appended to the sender's record
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Preview who would receive a transfer
    Lookup {
        /// Recipient email
        email: String,

        /// Currency the sender pays in
        #[arg(long, default_value = BASE_CURRENCY)]
        currency: String,
    },

    /// Convert money between two of your own wallets
    Convert {
        /// Amount in the source wallet's currency
        amount: String,

        /// Source wallet ID
        #[arg(long)]
        from: String,

        /// Destination wallet ID
        #[arg(long)]
        to: String,
    },

    /// Credit a deposit to a wallet
    Deposit {
        /// Amount in the wallet's currency
        amount: String,

        /// Wallet ID
        #[arg(long)]
        wallet: String,

        /// Card payment reference; credits the payment at most once
        #[arg(long)]
        payment_ref: Option<String>,

        /// Status reported by the payment gateway
        #[arg(long, default_value = PAYMENT_SUCCEEDED, requires = "payment_ref")]
        status: String,

        /// Description of the deposit
        #[arg(short, long, default_value = "Deposit")]
        description: String,
    },

    /// Show exchange rates
    Rates {
        /// Show a single rate from this currency
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Show a single rate to this currency
        #[arg(long, requires = "from")]
        to: Option<String>,
    },

    /// List transactions, newest first
    Transactions {
        /// All wallets of the user with this email
        #[arg(long, conflicts_with = "wallet")]
        user: Option<String>,

        /// A single wallet ID
        #[arg(long)]
        wallet: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Notification inbox
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, wallets, full
        #[arg(default_value = "transactions")]
        export_type: String,

        /// User email (required for transactions and wallets)
        #[arg(long)]
        user: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Only transactions on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Only transactions on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user with USD and EUR wallets
    Register {
        /// Display name
        name: String,

        /// Email address (unique)
        email: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },

    /// Show a user and their wallets
    Show {
        /// Email address
        email: String,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Open a wallet in another currency
    Create {
        /// Currency code (e.g., GBP)
        currency: String,

        /// Owner email
        #[arg(long)]
        user: String,

        /// Initial deposit
        #[arg(long)]
        deposit: Option<String>,
    },

    /// List a user's wallets
    List {
        /// Owner email
        #[arg(long)]
        user: String,
    },

    /// Show wallet details and statistics
    Show {
        /// Wallet ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balances and totals across all wallets of a user
    Summary {
        /// User email
        #[arg(long)]
        user: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Activity of one month
    Monthly {
        /// User email
        #[arg(long)]
        user: String,

        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications, newest first
    List {
        /// User email
        #[arg(long)]
        user: String,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark notifications as read
    Read {
        /// Notification ID
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// Mark every notification of --user as read
        #[arg(long, requires = "user")]
        all: bool,

        /// User email
        #[arg(long)]
        user: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = RatesConfig::from(&self.rates);
        let rates = Arc::new(ExchangeRateProvider::from_config(&config)?);

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&self.database, rates).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let (notifier, events) = ChannelNotifier::channel();
        let service = LedgerService::connect(&self.database, rates)
            .await?
            .with_notifier(Arc::new(notifier));
        let worker = NotificationWorker::spawn(service.repository(), events);

        let result = run_command(&service, self.command).await;

        // Closing the last sender lets the worker drain and exit.
        drop(service);
        if let Err(err) = worker.await {
            warn!(error = %err, "notification worker stopped abnormally");
        }

        result
    }
}

async fn run_command(service: &LedgerService, command: Commands) -> Result<()> {
    match command {
        Commands::Init => anyhow::bail!("init runs before connecting to the database"),

        Commands::User(cmd) => run_user_command(service, cmd).await?,

        Commands::Wallet(cmd) => run_wallet_command(service, cmd).await?,

        Commands::Transfer {
            amount,
            from,
            to,
            note,
        } => {
            let amount_cents = parse_amount(&amount)?;
            let receipt = service
                .transfer(parse_id(&from)?, &to, amount_cents, note.as_deref())
                .await?;

            println!(
                "Sent {} {} to {} ({} {} received)",
                format_cents(receipt.amount_sent),
                receipt.from_currency,
                receipt.recipient_name,
                format_cents(receipt.amount_received),
                receipt.to_currency
            );
            println!(
                "  New balance: {} {}",
                format_cents(receipt.sender_balance),
                receipt.from_currency
            );
            println!("  Transaction: {}", receipt.transaction_id);
        }

        Commands::Lookup { email, currency } => {
            match service.lookup_recipient(&email, &currency).await? {
                RecipientLookup::Found {
                    name,
                    wallet_id,
                    currency: to_currency,
                    symbol,
                    exchange_rate,
                } => {
                    println!("Recipient: {}", name);
                    println!("  Wallet:   {} ({} {})", wallet_id, symbol, to_currency);
                    println!(
                        "  Rate:     1 {} = {} {}",
                        currency.trim().to_uppercase(),
                        exchange_rate,
                        to_currency
                    );
                }
                RecipientLookup::NotFound { reason } => println!("{}", reason),
            }
        }

        Commands::Convert { amount, from, to } => {
            let amount_cents = parse_amount(&amount)?;
            let receipt = service
                .convert(parse_id(&from)?, parse_id(&to)?, amount_cents)
                .await?;

            println!(
                "Converted {} {} to {} {} (rate {})",
                format_cents(receipt.debited),
                receipt.from_currency,
                format_cents(receipt.credited),
                receipt.to_currency,
                receipt.rate
            );
            println!(
                "  Balances: {} {}, {} {}",
                format_cents(receipt.from_balance),
                receipt.from_currency,
                format_cents(receipt.to_balance),
                receipt.to_currency
            );
        }

        Commands::Deposit {
            amount,
            wallet,
            payment_ref,
            status,
            description,
        } => {
            let amount_cents = parse_amount(&amount)?;
            let wallet_id = parse_id(&wallet)?;
            let receipt = match payment_ref {
                Some(reference) => {
                    let payment = PaymentConfirmation {
                        status,
                        amount: amount_cents,
                        payment_reference: reference,
                    };
                    service.confirm_payment(wallet_id, &payment).await?
                }
                None => {
                    service
                        .credit_deposit(wallet_id, amount_cents, &description, None)
                        .await?
                }
            };

            println!(
                "Deposited {} {}. New balance: {} {}",
                format_cents(receipt.amount),
                receipt.currency,
                format_cents(receipt.new_balance),
                receipt.currency
            );
        }

        Commands::Rates { from, to } => match (from, to) {
            (Some(from), Some(to)) => {
                let rate = service
                    .rate_provider()
                    .exchange_rate(&from, &to)
                    .await
                    .context("Exchange rate overflowed")?;
                println!(
                    "1 {} = {} {}",
                    from.trim().to_uppercase(),
                    rate,
                    to.trim().to_uppercase()
                );
            }
            _ => {
                let rates = service.rates().await;
                let mut codes: Vec<_> = rates.keys().collect();
                codes.sort();

                println!("{:<10} {:>14}", "CURRENCY", format!("PER 1 {}", BASE_CURRENCY));
                println!("{}", "-".repeat(25));
                for code in codes {
                    println!("{:<10} {:>14}", code, rates[code]);
                }
            }
        },

        Commands::Transactions {
            user,
            wallet,
            limit,
        } => {
            let transactions = match (user, wallet) {
                (_, Some(wallet)) => service.wallet_transactions(parse_id(&wallet)?, limit).await?,
                (Some(email), None) => {
                    let user = service.get_user_by_email(&email).await?;
                    service.user_transactions(user.id, limit).await?
                }
                (None, None) => anyhow::bail!("Specify --user or --wallet"),
            };

            if transactions.is_empty() {
                println!("No transactions found.");
            } else {
                println!(
                    "{:<20} {:<11} {:>12} {:<8} {:<30}",
                    "DATE", "TYPE", "AMOUNT", "STATUS", "DESCRIPTION"
                );
                println!("{}", "-".repeat(85));
                for tx in transactions {
                    println!(
                        "{:<20} {:<11} {:>12} {:<8} {:<30}",
                        tx.created_at.format("%Y-%m-%d %H:%M:%S"),
                        tx.kind,
                        format_cents(tx.amount_cents),
                        tx.status,
                        truncate(&tx.description, 30)
                    );
                }
            }
        }

        Commands::Report(cmd) => run_report_command(service, cmd).await?,

        Commands::Notifications(cmd) => run_notification_command(service, cmd).await?,

        Commands::Export {
            export_type,
            user,
            output,
            from_date,
            to_date,
        } => {
            run_export_command(
                service,
                &export_type,
                user.as_deref(),
                output.as_deref(),
                from_date.as_deref(),
                to_date.as_deref(),
            )
            .await?
        }
    }
    Ok(())
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Register {
            name,
            email,
            phone,
            country,
        } => {
            let registration = service
                .register_user(&name, &email, phone, country)
                .await?;
            println!(
                "Registered {} <{}>",
                registration.user.name, registration.user.email
            );
            for wallet in &registration.wallets {
                println!("  {} wallet: {}", wallet.currency, wallet.id);
            }
        }

        UserCommands::Show { email } => {
            let user = service.get_user_by_email(&email).await?;
            print_user(&user);

            let unread = service.unread_count(user.id).await?;
            println!("  Unread:     {}", unread);
            println!();
            print_wallets(service, &user).await?;
        }
    }
    Ok(())
}

async fn run_wallet_command(service: &LedgerService, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Create {
            currency,
            user,
            deposit,
        } => {
            let owner = service.get_user_by_email(&user).await?;
            let initial = deposit.map(|d| parse_amount(&d)).transpose()?.unwrap_or(0);
            let wallet = service.create_wallet(owner.id, &currency, initial).await?;
            println!(
                "Created {} wallet: {} (balance {} {})",
                wallet.currency,
                wallet.id,
                format_cents(wallet.balance_cents),
                wallet.currency
            );
        }

        WalletCommands::List { user } => {
            let owner = service.get_user_by_email(&user).await?;
            print_wallets(service, &owner).await?;
        }

        WalletCommands::Show { id } => {
            let wallet = service.get_wallet(parse_id(&id)?).await?;
            let stats = service.wallet_stats(wallet.id).await?;

            println!("Wallet: {} {}", wallet.flag, wallet.name);
            println!("  ID:           {}", wallet.id);
            println!("  Owner:        {}", wallet.user_id);
            println!("  Currency:     {} ({})", wallet.currency, wallet.symbol);
            println!(
                "  Created:      {}",
                wallet.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!(
                "  Balance:      {} {}",
                format_cents(wallet.balance_cents),
                wallet.currency
            );
            println!("  Received:     {}", format_cents(stats.total_received));
            println!("  Sent:         {}", format_cents(stats.total_sent));
            println!("  Transactions: {}", stats.transaction_count);
        }
    }
    Ok(())
}

async fn run_report_command(service: &LedgerService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Summary { user, format } => {
            let owner = service.get_user_by_email(&user).await?;
            let summary = service.user_summary(owner.id).await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("Summary for {} (totals in {})", owner.name, summary.currency);
            println!("  Total balance:   {}", format_cents(summary.total_balance));
            println!("  Total received:  {}", format_cents(summary.total_received));
            println!("  Total sent:      {}", format_cents(summary.total_sent));
            println!("  Total converted: {}", format_cents(summary.total_converted));
            println!("  Transactions:    {}", summary.transaction_count);
            println!("  Wallets:         {}", summary.wallet_count);
            println!();
            println!(
                "{:<8} {:>14} {:>14} {:>14} {:>6}",
                "WALLET", "BALANCE", "RECEIVED", "SENT", "TXS"
            );
            println!("{}", "-".repeat(60));
            for wallet in &summary.wallets {
                println!(
                    "{:<8} {:>14} {:>14} {:>14} {:>6}",
                    wallet.currency,
                    format_cents(wallet.balance),
                    format_cents(wallet.total_received),
                    format_cents(wallet.total_sent),
                    wallet.transaction_count
                );
            }
        }

        ReportCommands::Monthly {
            user,
            year,
            month,
            format,
        } => {
            let owner = service.get_user_by_email(&user).await?;
            let (this_year, this_month) = current_month();
            let report = service
                .monthly_report(
                    owner.id,
                    year.unwrap_or(this_year),
                    month.unwrap_or(this_month),
                )
                .await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!(
                "{} {} for {} (in {})",
                month_name(report.month),
                report.year,
                owner.name,
                report.currency
            );
            println!("  Received:     {}", format_cents(report.total_received));
            println!("  Sent:         {}", format_cents(report.total_sent));
            println!("  Net flow:     {}", format_cents(report.net_flow));
            println!("  Transactions: {}", report.transaction_count);
            for (kind, count) in &report.type_breakdown {
                println!("    {:<11} {}", kind, count);
            }

            if !report.daily.is_empty() {
                println!();
                println!("{:<12} {:>14} {:>14}", "DATE", "INFLOW", "OUTFLOW");
                println!("{}", "-".repeat(42));
                for day in &report.daily {
                    println!(
                        "{:<12} {:>14} {:>14}",
                        day.date,
                        format_cents(day.inflow),
                        format_cents(day.outflow)
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_notification_command(
    service: &LedgerService,
    cmd: NotificationCommands,
) -> Result<()> {
    match cmd {
        NotificationCommands::List { user, unread } => {
            let owner = service.get_user_by_email(&user).await?;
            let notifications = service.notifications(owner.id, unread).await?;

            if notifications.is_empty() {
                println!("No notifications.");
            }
            for note in notifications {
                println!(
                    "{} {} [{}] {}",
                    if note.is_read { " " } else { "*" },
                    note.created_at.format("%Y-%m-%d %H:%M"),
                    note.id,
                    note.title
                );
                println!("    {}", note.message);
            }
        }

        NotificationCommands::Read { id, all, user } => {
            if all {
                let email = user.context("--all requires --user")?;
                let owner = service.get_user_by_email(&email).await?;
                let count = service.mark_all_notifications_read(owner.id).await?;
                println!("Marked {} notification(s) as read", count);
            } else {
                let id = id.context("Notification ID required")?;
                service.mark_notification_read(parse_id(&id)?).await?;
                println!("Marked notification {} as read", id);
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    user: Option<&str>,
    output: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
) -> Result<()> {
    use crate::io::{DateRange, Exporter};
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let owner = match user {
        Some(email) => Some(service.get_user_by_email(email).await?),
        None => None,
    };

    match export_type {
        "transactions" => {
            let owner = owner.context("--user is required for a transactions export")?;
            let range = DateRange {
                from: from_date.map(parse_date).transpose()?,
                to: to_date.map(end_of_day).transpose()?,
            };
            let count = exporter
                .export_transactions_csv(owner.id, range, writer)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "wallets" => {
            let owner = owner.context("--user is required for a wallets export")?;
            let count = exporter.export_wallets_csv(owner.id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} wallets", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} users, {} wallets, {} transactions",
                    snapshot.users.len(),
                    snapshot.wallets.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, wallets, full",
                export_type
            );
        }
    }

    Ok(())
}

fn print_user(user: &User) {
    println!("User: {}", user.name);
    println!("  ID:         {}", user.id);
    println!("  Email:      {}", user.email);
    if let Some(phone) = &user.phone {
        println!("  Phone:      {}", phone);
    }
    if let Some(country) = &user.country {
        println!("  Country:    {}", country);
    }
    println!(
        "  Registered: {}",
        user.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

async fn print_wallets(service: &LedgerService, user: &User) -> Result<()> {
    let wallets = service.list_wallets(user.id).await?;
    if wallets.is_empty() {
        println!("No wallets found.");
        return Ok(());
    }

    println!("{:<38} {:<8} {:>14}", "ID", "CURRENCY", "BALANCE");
    println!("{}", "-".repeat(62));
    for wallet in wallets {
        println!(
            "{:<38} {:<8} {:>14}",
            wallet.id,
            wallet.currency,
            format_cents(wallet.balance_cents)
        );
    }
    Ok(())
}

fn parse_amount(input: &str) -> Result<i64> {
    parse_cents(input).with_context(|| format!("Invalid amount: {}", input))
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("Invalid ID: {}", input))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}

/// Last instant of the given day, for inclusive upper bounds.
fn end_of_day(date_str: &str) -> Result<DateTime<Utc>> {
    Ok(parse_date(date_str)? + chrono::Duration::days(1) - chrono::Duration::nanoseconds(1))
}
