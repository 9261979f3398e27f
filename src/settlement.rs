use crate::schemas::{Balances, SettlementTransaction, UserId};

/// Amounts within this distance of zero are treated as settled.
pub const SETTLEMENT_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: UserId,
    amount: f64,
}

/// Pairs off one user's creditors against their debtors.
///
/// Creditors (positive balances) and debtors (negative balances, kept as
/// absolute values) are collected in the order the counterparties first
/// appeared in the ledger and then consumed from the back of each list: the
/// last creditor is matched with the last debtor, the smaller side is paid in
/// full and the remainder of the larger side goes back on its stack. Matching
/// stops as soon as either side runs out, so balances with no opposite
/// counterpart are left untouched.
pub fn settle_balances(balances: &Balances) -> Vec<SettlementTransaction> {
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();

    for (id, amount) in balances {
        if *amount > SETTLEMENT_EPSILON {
            creditors.push(PersonalBalance {
                id: id.clone(),
                amount: *amount,
            });
        } else if *amount < -SETTLEMENT_EPSILON {
            debtors.push(PersonalBalance {
                id: id.clone(),
                amount: -amount,
            });
        }
    }

    let mut transactions = Vec::new();
    while let (Some(creditor), Some(debtor)) = (creditors.pop(), debtors.pop()) {
        let settled = creditor.amount.min(debtor.amount);
        transactions.push(SettlementTransaction {
            from: debtor.id.clone(),
            to: creditor.id.clone(),
            amount: settled,
        });

        let difference = creditor.amount - debtor.amount;
        if difference > SETTLEMENT_EPSILON {
            creditors.push(PersonalBalance {
                id: creditor.id,
                amount: creditor.amount - settled,
            });
        } else if difference < -SETTLEMENT_EPSILON {
            debtors.push(PersonalBalance {
                id: debtor.id,
                amount: debtor.amount - settled,
            });
        }
    }
    transactions
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn balances(entries: &[(&str, f64)]) -> Balances {
        entries
            .iter()
            .map(|(id, amount)| (id.to_string(), *amount))
            .collect()
    }

    fn tx(from: &str, to: &str, amount: f64) -> SettlementTransaction {
        SettlementTransaction {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    #[test]
    fn matches_last_creditor_with_last_debtor_first() {
        let transactions = settle_balances(&balances(&[("X", 50.0), ("Y", -30.0), ("Z", 20.0)]));
        assert_eq!(transactions, vec![tx("Y", "Z", 20.0), tx("Y", "X", 10.0)]);
    }

    #[test]
    fn walks_counterparties_in_ledger_order_not_by_name() {
        // Z became a creditor before X, so X is on top of the stack.
        let transactions = settle_balances(&balances(&[("Z", 20.0), ("X", 50.0), ("Y", -30.0)]));
        assert_eq!(transactions, vec![tx("Y", "X", 30.0)]);

        let transactions = settle_balances(&balances(&[("X", 50.0), ("Z", 20.0), ("Y", -30.0)]));
        assert_eq!(transactions, vec![tx("Y", "Z", 20.0), tx("Y", "X", 10.0)]);
    }

    #[test]
    fn one_sided_balances_produce_nothing() {
        assert!(settle_balances(&balances(&[("A", 10.0)])).is_empty());
        assert!(settle_balances(&balances(&[("A", -10.0), ("B", -5.0)])).is_empty());
        assert!(settle_balances(&Balances::new()).is_empty());
    }

    #[test]
    fn equal_amounts_consume_both_sides() {
        let transactions = settle_balances(&balances(&[("A", 15.0), ("B", -15.0), ("C", 0.0)]));
        assert_eq!(transactions, vec![tx("B", "A", 15.0)]);
    }

    #[test]
    fn larger_debt_is_spread_over_creditors() {
        let transactions = settle_balances(&balances(&[
            ("A", 10.0),
            ("B", 20.0),
            ("C", -25.0),
            ("D", -5.0),
        ]));
        assert_eq!(
            transactions,
            vec![tx("D", "B", 5.0), tx("C", "B", 15.0), tx("C", "A", 10.0)]
        );
    }

    #[test]
    fn floating_point_residue_does_not_leave_dust() {
        let third = 10.0 / 3.0;
        let transactions = settle_balances(&balances(&[
            ("A", third + third + third),
            ("B", -10.0),
        ]));
        assert_eq!(transactions.len(), 1);

        let transactions = settle_balances(&balances(&[("A", 1e-12), ("B", -1e-12)]));
        assert!(transactions.is_empty());
    }

    #[test]
    fn settlement_never_overpays_and_zeroes_matched_entries() {
        let original = balances(&[
            ("A", 12.5),
            ("B", -7.25),
            ("C", 3.0),
            ("D", -20.0),
            ("E", 11.75),
        ]);
        let transactions = settle_balances(&original);

        let mut paid: HashMap<&str, f64> = HashMap::new();
        for t in &transactions {
            assert!(t.amount > 0.0);
            *paid.entry(t.from.as_str()).or_default() += t.amount;
            *paid.entry(t.to.as_str()).or_default() += t.amount;
        }
        for (id, amount) in &paid {
            assert!(*amount <= original[*id].abs() + SETTLEMENT_EPSILON);
        }

        // Total credit 27.25 equals total debt 27.25, so every entry nets out.
        for (id, amount) in &original {
            let moved = paid.get(id.as_str()).copied().unwrap_or_default();
            assert!((amount.abs() - moved).abs() <= SETTLEMENT_EPSILON, "{id} left unsettled");
        }
    }
}
