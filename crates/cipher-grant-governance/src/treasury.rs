//! DAO treasury: membership fees and deposits in, grant disbursements out.

use crate::error::GovernanceError;
use crate::proposal::{ProposalId, ResearchCategory};
use cipher_grant_types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Treasury movement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Fee paid on joining or upgrading
    MembershipFee,
    /// Voluntary deposit
    Deposit,
    /// Grant paid out to a funded proposal
    Disbursement,
}

/// Treasury transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryTransaction {
    pub tx_type: TransactionType,
    pub amount: Amount,
    /// Payer for inflows, recipient for disbursements
    pub counterparty: Address,
    pub proposal_id: Option<ProposalId>,
    pub at: Timestamp,
}

/// Treasury balance and history.
#[derive(Debug, Clone, Default)]
pub struct Treasury {
    /// Spendable balance
    pub balance: Amount,
    pub total_received: Amount,
    pub total_disbursed: Amount,
    /// Disbursements by research category
    pub disbursed_by_category: HashMap<ResearchCategory, Amount>,
    /// Transaction history, oldest first
    pub transactions: Vec<TreasuryTransaction>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an inflow.
    pub fn credit(
        &mut self,
        tx_type: TransactionType,
        amount: Amount,
        source: Address,
        at: Timestamp,
    ) -> Amount {
        self.balance = self.balance + amount;
        self.total_received = self.total_received + amount;

        self.transactions.push(TreasuryTransaction {
            tx_type,
            amount,
            counterparty: source,
            proposal_id: None,
            at,
        });
        self.balance
    }

    /// Check that `amount` can be paid out.
    pub fn ensure_available(&self, amount: Amount) -> Result<(), GovernanceError> {
        if amount > self.balance {
            return Err(GovernanceError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Pay `amount` to the researcher of a funded proposal.
    pub fn disburse(
        &mut self,
        proposal_id: ProposalId,
        category: ResearchCategory,
        amount: Amount,
        recipient: Address,
        at: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        self.ensure_available(amount)?;

        self.balance = self.balance.saturating_sub(amount);
        self.total_disbursed = self.total_disbursed + amount;

        let spent = self.disbursed_by_category.entry(category).or_insert(Amount::ZERO);
        *spent = *spent + amount;

        self.transactions.push(TreasuryTransaction {
            tx_type: TransactionType::Disbursement,
            amount,
            counterparty: recipient,
            proposal_id: Some(proposal_id),
            at,
        });
        Ok(self.balance)
    }

    /// Disbursed total for a category.
    pub fn disbursed_for(&self, category: ResearchCategory) -> Amount {
        self.disbursed_by_category
            .get(&category)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}
