use chrono::{DateTime, Utc};

use super::{Cents, Transaction, TransactionId, TransactionType, Wallet, WalletId};

/// A signed change to one wallet's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub wallet_id: WalletId,
    /// Negative for a debit, positive for a credit
    pub delta_cents: Cents,
}

/// Everything one ledger operation writes: balance changes plus exactly one
/// transaction record per changed wallet. The repository applies a movement
/// as a single atomic unit.
#[derive(Debug, Clone)]
pub struct Movement {
    pub changes: Vec<BalanceChange>,
    pub transactions: Vec<Transaction>,
}

impl Movement {
    /// Cross-user transfer: debit the sender, credit the recipient.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        sender: &Wallet,
        sender_name: &str,
        recipient: &Wallet,
        recipient_name: &str,
        amount_sent: Cents,
        amount_received: Cents,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            changes: vec![
                BalanceChange {
                    wallet_id: sender.id,
                    delta_cents: -amount_sent,
                },
                BalanceChange {
                    wallet_id: recipient.id,
                    delta_cents: amount_received,
                },
            ],
            transactions: vec![
                Transaction::new(
                    sender.id,
                    TransactionType::Transfer,
                    amount_sent,
                    transfer_description(recipient_name, note),
                    at,
                ),
                Transaction::new(
                    recipient.id,
                    TransactionType::Deposit,
                    amount_received,
                    format!("Received from {}", sender_name),
                    at,
                ),
            ],
        }
    }

    /// Conversion between two wallets of the same owner.
    pub fn conversion(
        from: &Wallet,
        to: &Wallet,
        debited: Cents,
        credited: Cents,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            changes: vec![
                BalanceChange {
                    wallet_id: from.id,
                    delta_cents: -debited,
                },
                BalanceChange {
                    wallet_id: to.id,
                    delta_cents: credited,
                },
            ],
            transactions: vec![
                Transaction::new(
                    from.id,
                    TransactionType::Conversion,
                    debited,
                    format!("Converted to {}", to.currency),
                    at,
                ),
                Transaction::new(
                    to.id,
                    TransactionType::Deposit,
                    credited,
                    format!("Converted from {}", from.currency),
                    at,
                ),
            ],
        }
    }

    /// Single-wallet credit from an external source.
    pub fn deposit(
        wallet: &Wallet,
        amount: Cents,
        description: impl Into<String>,
        payment_ref: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut tx = Transaction::new(wallet.id, TransactionType::Deposit, amount, description, at);
        tx.payment_ref = payment_ref;
        Self {
            changes: vec![BalanceChange {
                wallet_id: wallet.id,
                delta_cents: amount,
            }],
            transactions: vec![tx],
        }
    }

    /// Id of the first record, the outflow leg for transfers and conversions.
    pub fn primary_transaction_id(&self) -> Option<TransactionId> {
        self.transactions.first().map(|t| t.id)
    }

    /// Wallet ids touched by this movement.
    #[cfg(test)]
    pub fn wallet_ids(&self) -> Vec<WalletId> {
        self.changes.iter().map(|c| c.wallet_id).collect()
    }

    /// Every change has exactly one record for the same wallet whose amount
    /// is the magnitude of the change.
    pub fn is_paired(&self) -> bool {
        self.changes.len() == self.transactions.len()
            && self.changes.iter().zip(&self.transactions).all(|(c, t)| {
                c.wallet_id == t.wallet_id && c.delta_cents.abs() == t.amount_cents
            })
    }
}

/// Description of the sender's outflow record.
pub fn transfer_description(recipient_name: &str, note: Option<&str>) -> String {
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("Transfer to {} - {}", recipient_name, note),
        None => format!("Transfer to {}", recipient_name),
    }
}

/// Totals over a set of transaction records. Sums saturate at
/// [`Cents::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    pub received: Cents,
    pub sent: Cents,
    pub converted: Cents,
    pub count: usize,
}

pub fn summarize(transactions: &[Transaction]) -> FlowTotals {
    transactions
        .iter()
        .fold(FlowTotals::default(), |mut totals, tx| {
            match tx.kind {
                TransactionType::Deposit => {
                    totals.received = totals.received.saturating_add(tx.amount_cents)
                }
                TransactionType::Transfer | TransactionType::Withdrawal => {
                    totals.sent = totals.sent.saturating_add(tx.amount_cents)
                }
                TransactionType::Conversion => {
                    totals.converted = totals.converted.saturating_add(tx.amount_cents)
                }
            }
            totals.count += 1;
            totals
        })
}
