use std::collections::HashMap;

use crate::schemas::{BalanceDelta, Balances, UserId};

/// Pairwise balance updates produced by one expense.
///
/// Every participant other than the payer owes the payer an equal split, so
/// each pair yields two mirrored deltas. An expense whose only participant is
/// the payer produces nothing.
pub fn compute_expense_deltas(
    payer_id: &str,
    amount: f64,
    participants: &[UserId],
) -> Vec<BalanceDelta> {
    if participants.is_empty() {
        return Vec::new();
    }
    let split = amount / participants.len() as f64;

    let mut deltas = Vec::new();
    for participant in participants {
        if participant == payer_id {
            continue;
        }
        deltas.push(BalanceDelta {
            user_id: payer_id.to_string(),
            counterparty: participant.clone(),
            amount: split,
        });
        deltas.push(BalanceDelta {
            user_id: participant.clone(),
            counterparty: payer_id.to_string(),
            amount: -split,
        });
    }
    deltas
}

// New counterparties are appended, so each record keeps first-interaction order.
pub fn apply_deltas_to(ledger: &mut HashMap<UserId, Balances>, deltas: &[BalanceDelta]) {
    for delta in deltas {
        ledger
            .entry(delta.user_id.clone())
            .or_default()
            .entry(delta.counterparty.clone())
            .and_modify(|v| *v += delta.amount)
            .or_insert(delta.amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn splits_evenly_between_payer_and_participants() {
        let mut ledger = HashMap::new();
        let deltas = compute_expense_deltas("P", 90.0, &users(&["P", "X", "Y", "Z"]));
        assert_eq!(deltas.len(), 6);
        apply_deltas_to(&mut ledger, &deltas);

        for other in ["X", "Y", "Z"] {
            assert_eq!(ledger["P"][other], 30.0);
            assert_eq!(ledger[other]["P"], -30.0);
        }
        assert!(!ledger["P"].contains_key("P"));
    }

    #[test]
    fn payer_outside_participants_is_never_charged() {
        let deltas = compute_expense_deltas("P", 100.0, &users(&["A", "B"]));
        assert_eq!(
            deltas,
            vec![
                BalanceDelta { user_id: "P".into(), counterparty: "A".into(), amount: 50.0 },
                BalanceDelta { user_id: "A".into(), counterparty: "P".into(), amount: -50.0 },
                BalanceDelta { user_id: "P".into(), counterparty: "B".into(), amount: 50.0 },
                BalanceDelta { user_id: "B".into(), counterparty: "P".into(), amount: -50.0 },
            ]
        );
    }

    #[test]
    fn self_only_expense_is_a_noop() {
        assert!(compute_expense_deltas("P", 50.0, &users(&["P"])).is_empty());
    }

    #[test]
    fn counterparties_keep_first_interaction_order() {
        let mut ledger = HashMap::new();
        apply_deltas_to(&mut ledger, &compute_expense_deltas("U", 40.0, &users(&["U", "Z"])));
        apply_deltas_to(&mut ledger, &compute_expense_deltas("U", 100.0, &users(&["U", "X"])));
        apply_deltas_to(&mut ledger, &compute_expense_deltas("Y", 60.0, &users(&["Y", "U"])));
        apply_deltas_to(&mut ledger, &compute_expense_deltas("U", 10.0, &users(&["U", "Z"])));

        let order: Vec<&str> = ledger["U"].keys().map(String::as_str).collect();
        assert_eq!(order, vec!["Z", "X", "Y"]);
        assert_eq!(ledger["U"]["Z"], 25.0);
    }

    #[test]
    fn repeated_expenses_stay_antisymmetric() {
        let mut ledger = HashMap::new();
        apply_deltas_to(&mut ledger, &compute_expense_deltas("A", 10.0, &users(&["A", "B", "C"])));
        apply_deltas_to(&mut ledger, &compute_expense_deltas("B", 25.0, &users(&["A", "B"])));
        apply_deltas_to(&mut ledger, &compute_expense_deltas("C", 7.5, &users(&["A"])));

        for (user, balances) in &ledger {
            for (counterparty, amount) in balances {
                assert_eq!(*amount, -ledger[counterparty][user]);
            }
        }
    }
}
