use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BASE_CURRENCY, Cents, Transaction, TransactionType, UserId, Wallet, WalletId, summarize,
};
use crate::rates::{RateTable, convert_with};

/// Per-wallet flow totals, in the wallet's own currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStats {
    pub wallet_id: WalletId,
    pub currency: String,
    pub symbol: String,
    pub flag: String,
    pub balance: Cents,
    pub total_received: Cents,
    pub total_sent: Cents,
    pub transaction_count: usize,
}

/// Overview of every wallet a user holds. Cross-wallet totals are expressed
/// in the base currency at the rates current when the report was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub currency: String,
    pub total_balance: Cents,
    pub total_received: Cents,
    pub total_sent: Cents,
    pub total_converted: Cents,
    pub transaction_count: usize,
    pub wallet_count: usize,
    pub wallets: Vec<WalletStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFlow {
    pub date: NaiveDate,
    pub inflow: Cents,
    pub outflow: Cents,
}

/// Activity of one calendar month (UTC), in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub currency: String,
    pub total_received: Cents,
    pub total_sent: Cents,
    pub net_flow: Cents,
    pub transaction_count: usize,
    /// Only days with activity, in date order
    pub daily: Vec<DailyFlow>,
    pub type_breakdown: BTreeMap<String, usize>,
}

/// Half-open UTC range covering `year`-`month`, or `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(Months::new(1))?;
    Some((
        Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?),
        Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0)?),
    ))
}

pub fn wallet_stats(wallet: &Wallet, transactions: &[Transaction]) -> WalletStats {
    let totals = summarize(transactions);
    WalletStats {
        wallet_id: wallet.id,
        currency: wallet.currency.clone(),
        symbol: wallet.symbol.clone(),
        flag: wallet.flag.clone(),
        balance: wallet.balance_cents,
        total_received: totals.received,
        total_sent: totals.sent,
        transaction_count: totals.count,
    }
}

/// Build a user summary from each wallet and its full history.
pub fn user_summary(
    user_id: UserId,
    wallets: &[(Wallet, Vec<Transaction>)],
    rates: &RateTable,
) -> UserSummary {
    let to_base = |amount: Cents, currency: &str| {
        convert_with(rates, amount, currency, BASE_CURRENCY).unwrap_or(0)
    };

    let mut summary = UserSummary {
        user_id,
        currency: BASE_CURRENCY.to_string(),
        total_balance: 0,
        total_received: 0,
        total_sent: 0,
        total_converted: 0,
        transaction_count: 0,
        wallet_count: wallets.len(),
        wallets: Vec::with_capacity(wallets.len()),
    };

    for (wallet, transactions) in wallets {
        let totals = summarize(transactions);
        let add = |total: Cents, amount: Cents| {
            total.saturating_add(to_base(amount, &wallet.currency))
        };
        summary.total_balance = add(summary.total_balance, wallet.balance_cents);
        summary.total_received = add(summary.total_received, totals.received);
        summary.total_sent = add(summary.total_sent, totals.sent);
        summary.total_converted = add(summary.total_converted, totals.converted);
        summary.transaction_count += totals.count;
        summary.wallets.push(wallet_stats(wallet, transactions));
    }

    summary
}

/// Build a monthly report. `currencies` maps each wallet id to its currency;
/// transactions outside the month are ignored.
pub fn monthly_report(
    year: i32,
    month: u32,
    transactions: &[Transaction],
    currencies: &HashMap<WalletId, String>,
    rates: &RateTable,
) -> Option<MonthlyReport> {
    let (start, end) = month_bounds(year, month)?;

    let mut report = MonthlyReport {
        year,
        month,
        currency: BASE_CURRENCY.to_string(),
        total_received: 0,
        total_sent: 0,
        net_flow: 0,
        transaction_count: 0,
        daily: Vec::new(),
        type_breakdown: BTreeMap::new(),
    };
    let mut days: BTreeMap<NaiveDate, DailyFlow> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|t| t.created_at >= start && t.created_at < end)
    {
        let currency = currencies
            .get(&tx.wallet_id)
            .map(String::as_str)
            .unwrap_or(BASE_CURRENCY);
        let amount = convert_with(rates, tx.amount_cents, currency, BASE_CURRENCY).unwrap_or(0);
        let date = tx.created_at.date_naive();

        match tx.kind {
            TransactionType::Deposit => {
                report.total_received = report.total_received.saturating_add(amount);
                let day = day_entry(&mut days, date);
                day.inflow = day.inflow.saturating_add(amount);
            }
            TransactionType::Transfer | TransactionType::Withdrawal => {
                report.total_sent = report.total_sent.saturating_add(amount);
                let day = day_entry(&mut days, date);
                day.outflow = day.outflow.saturating_add(amount);
            }
            TransactionType::Conversion => {}
        }

        report.transaction_count += 1;
        *report
            .type_breakdown
            .entry(tx.kind.as_str().to_string())
            .or_default() += 1;
    }

    report.net_flow = report.total_received - report.total_sent;
    report.daily = days.into_values().collect();
    Some(report)
}

fn day_entry(days: &mut BTreeMap<NaiveDate, DailyFlow>, date: NaiveDate) -> &mut DailyFlow {
    days.entry(date).or_insert(DailyFlow {
        date,
        inflow: 0,
        outflow: 0,
    })
}

/// Name of a month for display, e.g. "March".
pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

/// Current (year, month) in UTC.
pub fn current_month() -> (i32, u32) {
    let now = Utc::now();
    (now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::domain::currency;

    fn rates() -> RateTable {
        let mut rates = RateTable::new();
        rates.insert("USD".into(), Decimal::ONE);
        rates.insert("EUR".into(), Decimal::new(50, 2));
        rates
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn test_user_summary_totals_in_base_currency() {
        let user = Uuid::new_v4();
        let mut usd = Wallet::new(user, currency::lookup("USD").unwrap());
        usd.balance_cents = 5000;
        let mut eur = Wallet::new(user, currency::lookup("EUR").unwrap());
        eur.balance_cents = 1000;

        let usd_txs = vec![
            Transaction::new(usd.id, TransactionType::Deposit, 10000, "in", Utc::now()),
            Transaction::new(usd.id, TransactionType::Transfer, 5000, "out", Utc::now()),
        ];
        let eur_txs = vec![Transaction::new(
            eur.id,
            TransactionType::Deposit,
            1000,
            "in",
            Utc::now(),
        )];

        let summary = user_summary(user, &[(usd, usd_txs), (eur, eur_txs)], &rates());

        // 10.00 EUR at 0.50 per USD is 20.00 USD
        assert_eq!(summary.total_balance, 7000);
        assert_eq!(summary.total_received, 12000);
        assert_eq!(summary.total_sent, 5000);
        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.wallet_count, 2);
        assert_eq!(summary.wallets[1].total_received, 1000);
    }

    #[test]
    fn test_monthly_report_groups_by_day() {
        let wallet = Uuid::new_v4();
        let currencies = HashMap::from([(wallet, "USD".to_string())]);
        let txs = vec![
            Transaction::new(wallet, TransactionType::Deposit, 3000, "a", at(2024, 3, 2)),
            Transaction::new(wallet, TransactionType::Deposit, 2000, "b", at(2024, 3, 2)),
            Transaction::new(wallet, TransactionType::Transfer, 1500, "c", at(2024, 3, 9)),
            Transaction::new(wallet, TransactionType::Conversion, 700, "d", at(2024, 3, 9)),
            Transaction::new(wallet, TransactionType::Deposit, 9999, "e", at(2024, 4, 1)),
        ];

        let report = monthly_report(2024, 3, &txs, &currencies, &rates()).unwrap();

        assert_eq!(report.total_received, 5000);
        assert_eq!(report.total_sent, 1500);
        assert_eq!(report.net_flow, 3500);
        assert_eq!(report.transaction_count, 4);
        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.daily[0].inflow, 5000);
        assert_eq!(report.daily[1].outflow, 1500);
        assert_eq!(report.type_breakdown["CONVERSION"], 1);
        assert_eq!(report.type_breakdown["DEPOSIT"], 2);
    }
}
