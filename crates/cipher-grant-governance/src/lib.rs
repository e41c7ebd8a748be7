//! Cipher Grant Governance - the confidential grant ledger.
//!
//! This crate provides:
//! - Tiered DAO membership with fixed voting weights
//! - Research proposals whose budgets stay sealed until finalization
//! - Weighted voting with last-vote-wins replacement
//! - Quorum and approval-threshold decisions
//! - Treasury accounting for fees, deposits and grant disbursements
//! - `GrantLifecycle`, which orders all of the above and journals every change

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod membership;
pub mod proposal;
pub mod query;
pub mod treasury;
pub mod voting;

pub use config::GovernanceConfig;
pub use error::GovernanceError;
pub use events::{LifecycleEvent, LifecycleListener};
pub use lifecycle::{Disbursement, Finalization, GrantLifecycle};
pub use membership::{JoinOutcome, Member, MembershipLedger, Tier};
pub use proposal::{Proposal, ProposalDraft, ProposalId, ProposalStatus, ResearchCategory};
pub use query::{ProposalFilter, StatusCounts, VotingRecord};
pub use treasury::{TransactionType, Treasury, TreasuryTransaction};
pub use voting::{decide, Decision, Vote, VoteBook, VoteChoice, VoteTally};
