//! Pure accessibility evaluation for the choices on a page.

use ink_core::{Choice, Progress};
use serde::Serialize;

/// Why a choice is (or is not) currently accessible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// The choice carries no cost.
    Free,
    /// The reader has already paid for this choice; never charge twice.
    AlreadyOwned,
    /// Premium and unowned, but the reader's balance covers the cost.
    Affordable,
    /// Premium and unowned, and the reader cannot afford it.
    InsufficientBalance {
        /// Price of the unlock.
        cost: u32,
        /// Balance at evaluation time.
        balance: u64,
    },
}

/// One choice annotated with its current accessibility.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedChoice {
    /// The underlying choice.
    pub choice: Choice,
    /// Whether the reader can take this choice right now.
    pub accessible: bool,
    /// Whether taking it would require a currency debit.
    pub requires_purchase: bool,
    /// Why it is accessible or locked.
    pub reason: AccessReason,
}

/// Annotate a page's outgoing choices with accessibility.
///
/// Pure and side-effect-free: the balance check is informational only — the
/// ledger re-verifies sufficiency inside the commit critical section, which
/// is the authoritative check. An empty input (a terminal page) yields an
/// empty output, which the navigation engine interprets as an ending.
pub fn evaluate(choices: &[&Choice], progress: &Progress, balance: u64) -> Vec<EvaluatedChoice> {
    choices
        .iter()
        .map(|choice| {
            let (accessible, requires_purchase, reason) = if !choice.is_premium() {
                (true, false, AccessReason::Free)
            } else if progress.has_purchased(choice.id) {
                (true, false, AccessReason::AlreadyOwned)
            } else {
                let cost = choice.cost();
                if balance >= u64::from(cost) {
                    (true, true, AccessReason::Affordable)
                } else {
                    (
                        false,
                        true,
                        AccessReason::InsufficientBalance { cost, balance },
                    )
                }
            };
            EvaluatedChoice {
                choice: (*choice).clone(),
                accessible,
                requires_purchase,
                reason,
            }
        })
        .collect()
}
