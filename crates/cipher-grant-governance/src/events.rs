//! Lifecycle events.
//!
//! Every state change is expressed as one event. Events are journaled before
//! they are applied, and replaying the journal rebuilds the same state.

use crate::membership::{Member, Tier};
use crate::proposal::{Proposal, ProposalId};
use crate::voting::{Decision, Vote, VoteTally};
use cipher_grant_types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    MemberJoined {
        member: Member,
        fee: Amount,
    },
    MemberUpgraded {
        address: Address,
        from: Tier,
        to: Tier,
        fee: Amount,
        at: Timestamp,
    },
    /// Carries the sealed budget only.
    ProposalSubmitted {
        proposal: Proposal,
    },
    VoteCast {
        vote: Vote,
    },
    ProposalFinalized {
        proposal_id: ProposalId,
        decision: Decision,
        tally: VoteTally,
        at: Timestamp,
    },
    GrantFunded {
        proposal_id: ProposalId,
        amount: Amount,
        recipient: Address,
        at: Timestamp,
    },
    TreasuryDeposited {
        from: Address,
        amount: Amount,
        at: Timestamp,
    },
}

impl LifecycleEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::MemberJoined { .. } => "member_joined",
            LifecycleEvent::MemberUpgraded { .. } => "member_upgraded",
            LifecycleEvent::ProposalSubmitted { .. } => "proposal_submitted",
            LifecycleEvent::VoteCast { .. } => "vote_cast",
            LifecycleEvent::ProposalFinalized { .. } => "proposal_finalized",
            LifecycleEvent::GrantFunded { .. } => "grant_funded",
            LifecycleEvent::TreasuryDeposited { .. } => "treasury_deposited",
        }
    }

    /// Proposal the event concerns, if any.
    pub fn proposal_id(&self) -> Option<ProposalId> {
        match self {
            LifecycleEvent::ProposalSubmitted { proposal } => Some(proposal.id),
            LifecycleEvent::VoteCast { vote } => Some(vote.proposal_id),
            LifecycleEvent::ProposalFinalized { proposal_id, .. }
            | LifecycleEvent::GrantFunded { proposal_id, .. } => Some(*proposal_id),
            _ => None,
        }
    }
}

/// Receives events after they have been journaled and applied.
///
/// Listeners are called on the writer's thread once its locks are released.
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = LifecycleEvent::TreasuryDeposited {
            from: Address::from_bytes([1; 20]),
            amount: Amount::from_milli_eth(2_500),
            at: Timestamp::from_millis(42),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "treasury_deposited");
        assert_eq!(json["amount"], "2.5");

        let back: LifecycleEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.proposal_id(), None);
    }

    #[test]
    fn test_negative_amount_rejected_on_read() {
        let json = serde_json::json!({
            "type": "grant_funded",
            "proposal_id": 3,
            "amount": -4.0,
            "recipient": Address::from_bytes([2; 20]).to_string(),
            "at": 1,
        });
        assert!(serde_json::from_value::<LifecycleEvent>(json).is_err());
    }
}
