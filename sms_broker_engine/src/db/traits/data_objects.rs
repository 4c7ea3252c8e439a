use serde::{Deserialize, Serialize};
use smb_common::Money;

/// The three discount layers applicable to one `(user, service, server)` lookup. A missing rule contributes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscountSet {
    pub server_discount: Option<Money>,
    pub service_discount: Option<Money>,
    pub user_discount: Option<Money>,
}

/// The result of reconciling a wallet against its ledger. The balance must equal the starting balance plus all
/// ledger movements plus all confirmed top-ups; any drift is a correctness bug, never something to auto-correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub balance: Money,
    pub starting_balance: Money,
    pub ledger_total: Money,
    pub top_up_total: Money,
}

impl LedgerSummary {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.starting_balance + self.ledger_total + self.top_up_total
    }
}
