//! Grant lifecycle orchestration.
//!
//! [`GrantLifecycle`] owns the membership registry, the proposals with their
//! votes, the treasury and the sealer. It enforces the ordering rules between
//! them:
//!
//! - an address must join before it can vote
//! - votes are refused once a proposal is finalized
//! - only `finalize` moves a proposal out of Pending, and only a finalized
//!   proposal can have its budget revealed
//!
//! Each proposal is guarded by its own mutex, so votes and finalization on one
//! proposal are linearizable while different proposals proceed in parallel.
//! Every change is appended to the journal before it is applied in memory.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::events::{LifecycleEvent, LifecycleListener};
use crate::membership::{JoinOutcome, Member, MembershipLedger, Tier};
use crate::proposal::{Proposal, ProposalDraft, ProposalId, ProposalStatus};
use crate::query::{ProposalFilter, StatusCounts, VotingRecord};
use crate::treasury::{TransactionType, Treasury};
use crate::voting::{decide, Decision, Vote, VoteBook, VoteChoice, VoteTally};
use cipher_grant_crypto::{RevealAuthorization, Sealer};
use cipher_grant_storage::{Journal, MemoryJournal};
use cipher_grant_types::{Address, Amount, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct ProposalSlot {
    proposal: Proposal,
    votes: VoteBook,
}

type SlotRef = Arc<Mutex<ProposalSlot>>;

/// Result of a finalization attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalization {
    pub proposal_id: ProposalId,
    pub decision: Decision,
    pub tally: VoteTally,
    /// Reveal capability, issued only when the proposal reached an end state
    pub authorization: Option<RevealAuthorization>,
}

/// Result of a grant disbursement.
#[derive(Debug, Clone, PartialEq)]
pub struct Disbursement {
    pub proposal_id: ProposalId,
    pub amount: Amount,
    pub recipient: Address,
    pub total_disbursed: Amount,
    pub remaining_budget: Amount,
    pub treasury_balance: Amount,
}

/// The confidential grant ledger.
pub struct GrantLifecycle {
    config: GovernanceConfig,
    sealer: Arc<dyn Sealer>,
    journal: Arc<dyn Journal<LifecycleEvent>>,
    members: MembershipLedger,
    proposals: RwLock<BTreeMap<ProposalId, SlotRef>>,
    next_id: AtomicU64,
    treasury: Mutex<Treasury>,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl fmt::Debug for GrantLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantLifecycle")
            .field("members", &self.members.len())
            .field("proposals", &self.proposals.read().len())
            .field("journal_len", &self.journal.len())
            .finish()
    }
}

impl GrantLifecycle {
    /// Create an empty ledger backed by an in-memory journal.
    pub fn new(config: GovernanceConfig, sealer: Arc<dyn Sealer>) -> Result<Self, GovernanceError> {
        Self::restore(config, sealer, Arc::new(MemoryJournal::new()))
    }

    /// Open a ledger over `journal`, replaying every entry it already holds.
    pub fn restore(
        config: GovernanceConfig,
        sealer: Arc<dyn Sealer>,
        journal: Arc<dyn Journal<LifecycleEvent>>,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;

        let lifecycle = Self {
            config,
            sealer,
            journal,
            members: MembershipLedger::new(),
            proposals: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            treasury: Mutex::new(Treasury::new()),
            listeners: RwLock::new(Vec::new()),
        };

        let entries = lifecycle.journal.entries()?;
        let replayed = entries.len();
        for entry in entries {
            lifecycle.replay(entry.seq, entry.event)?;
        }
        if replayed > 0 {
            tracing::info!(
                events = replayed,
                members = lifecycle.members.len(),
                proposals = lifecycle.proposals.read().len(),
                "Ledger restored from journal"
            );
        }

        Ok(lifecycle)
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Register a listener for applied events.
    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    // ---- Membership ----

    /// Join the DAO at `tier`, or upgrade to a higher tier.
    pub fn join_dao(&self, address: Address, tier: Tier) -> Result<Member, GovernanceError> {
        let now = Timestamp::now();
        let mut applied = None;

        let outcome = self.members.join_with(address, tier, now, |outcome| {
            let event = match outcome {
                JoinOutcome::Joined { member, fee } => LifecycleEvent::MemberJoined {
                    member: member.clone(),
                    fee: *fee,
                },
                JoinOutcome::Upgraded {
                    member,
                    previous,
                    fee,
                } => LifecycleEvent::MemberUpgraded {
                    address,
                    from: *previous,
                    to: member.tier,
                    fee: *fee,
                    at: now,
                },
            };
            self.commit(&event)?;
            self.treasury
                .lock()
                .credit(TransactionType::MembershipFee, outcome.fee(), address, now);
            applied = Some(event);
            Ok(())
        })?;

        if let Some(event) = applied {
            self.publish(&event);
        }

        let member = outcome.member().clone();
        tracing::info!(
            address = %address.short(),
            tier = %member.tier,
            weight = member.voting_weight(),
            "Member joined"
        );
        Ok(member)
    }

    pub fn member(&self, address: &Address) -> Option<Member> {
        self.members.member(address)
    }

    pub fn members(&self) -> Vec<Member> {
        self.members.members()
    }

    pub fn membership(&self) -> &MembershipLedger {
        &self.members
    }

    /// Current voting weight of `address`.
    pub fn weight_of(&self, address: &Address) -> Result<u64, GovernanceError> {
        self.members.weight_of(address)
    }

    // ---- Proposals ----

    /// Validate `draft`, seal its budget and open it for voting.
    pub fn submit_proposal(
        &self,
        proposer: Address,
        draft: ProposalDraft,
    ) -> Result<ProposalId, GovernanceError> {
        draft.validate(&self.config)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sealed = self.sealer.seal(draft.budget, id)?;
        let proposal = Proposal::new(id, proposer, draft, sealed, Timestamp::now());

        let event = LifecycleEvent::ProposalSubmitted {
            proposal: proposal.clone(),
        };
        self.commit(&event)?;

        self.proposals.write().insert(
            id,
            Arc::new(Mutex::new(ProposalSlot {
                proposal,
                votes: VoteBook::new(),
            })),
        );
        self.publish(&event);

        tracing::info!(proposal_id = id, proposer = %proposer.short(), "Proposal submitted");
        Ok(id)
    }

    pub fn proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        Ok(self.slot(id)?.lock().proposal.clone())
    }

    /// Proposals matching `filter`, in id order.
    pub fn proposals(&self, filter: &ProposalFilter) -> Vec<Proposal> {
        self.slots()
            .into_iter()
            .filter_map(|slot| {
                let slot = slot.lock();
                filter.matches(&slot.proposal).then(|| slot.proposal.clone())
            })
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for slot in self.slots() {
            counts.record(slot.lock().proposal.status);
        }
        counts
    }

    // ---- Voting ----

    /// Record a vote, replacing any earlier vote by `voter` on this proposal.
    pub fn cast_vote(
        &self,
        id: ProposalId,
        voter: Address,
        choice: VoteChoice,
        comment: &str,
    ) -> Result<Vote, GovernanceError> {
        let slot = self.slot(id)?;

        let (vote, event) = {
            let mut slot = slot.lock();
            if !slot.proposal.status.can_vote() {
                return Err(GovernanceError::ProposalNotOpen(id));
            }
            let weight = self.members.weight_of(&voter)?;

            let comment = comment.trim();
            if comment.chars().count() > self.config.max_comment_len {
                return Err(GovernanceError::Validation(format!(
                    "comment exceeds {} characters",
                    self.config.max_comment_len
                )));
            }

            let vote = Vote {
                proposal_id: id,
                voter,
                choice,
                weight,
                comment: comment.to_string(),
                cast_at: Timestamp::now(),
            };
            let event = LifecycleEvent::VoteCast { vote: vote.clone() };
            self.commit(&event)?;

            if let Some(previous) = slot.votes.cast(vote.clone()) {
                tracing::debug!(
                    proposal_id = id,
                    voter = %voter.short(),
                    previous = %previous.choice,
                    "Vote replaced"
                );
            }
            (vote, event)
        };

        self.publish(&event);
        tracing::info!(proposal_id = id, voter = %voter.short(), choice = %choice, weight = vote.weight, "Vote cast");
        Ok(vote)
    }

    /// Live tally, recomputed from the stored votes.
    pub fn get_tally(&self, id: ProposalId) -> Result<VoteTally, GovernanceError> {
        let slot = self.slot(id)?;
        let slot = slot.lock();
        Ok(slot.votes.tally(self.members.total_weight()))
    }

    /// Votes on a proposal, ordered by voter address.
    pub fn votes(&self, id: ProposalId) -> Result<Vec<Vote>, GovernanceError> {
        let slot = self.slot(id)?;
        let slot = slot.lock();
        Ok(slot.votes.iter().cloned().collect())
    }

    /// Every vote `address` has cast, newest first.
    pub fn voting_history(&self, address: &Address) -> Vec<VotingRecord> {
        let mut history: Vec<VotingRecord> = self
            .slots()
            .into_iter()
            .filter_map(|slot| {
                let slot = slot.lock();
                slot.votes.get(address).map(|vote| VotingRecord {
                    proposal_id: slot.proposal.id,
                    title: slot.proposal.title.clone(),
                    choice: vote.choice,
                    weight: vote.weight,
                    cast_at: vote.cast_at,
                    status: slot.proposal.status,
                })
            })
            .collect();
        history.sort_by(|a, b| {
            b.cast_at
                .cmp(&a.cast_at)
                .then_with(|| b.proposal_id.cmp(&a.proposal_id))
        });
        history
    }

    /// What `finalize` would decide right now, without applying it.
    pub fn decide(
        &self,
        id: ProposalId,
        quorum: f64,
        threshold: f64,
    ) -> Result<Decision, GovernanceError> {
        let tally = self.get_tally(id)?;
        decide(&tally, quorum, threshold)
    }

    // ---- Finalization and reveal ----

    /// Decide a pending proposal and apply the result.
    ///
    /// An `Undecided` result leaves the proposal open and issues no reveal
    /// authorization. A second finalization fails with `AlreadyFinalized`.
    pub fn finalize(
        &self,
        id: ProposalId,
        quorum: f64,
        threshold: f64,
    ) -> Result<Finalization, GovernanceError> {
        let slot = self.slot(id)?;

        let (finalization, event) = {
            let mut slot = slot.lock();
            if slot.proposal.status.is_terminal() {
                return Err(GovernanceError::AlreadyFinalized(id));
            }

            let tally = slot.votes.tally(self.members.total_weight());
            let decision = decide(&tally, quorum, threshold)?;
            if decision == Decision::Undecided {
                tracing::debug!(
                    proposal_id = id,
                    participation = tally.participation(),
                    quorum,
                    "Quorum not reached"
                );
                return Ok(Finalization {
                    proposal_id: id,
                    decision,
                    tally,
                    authorization: None,
                });
            }

            let now = Timestamp::now();
            let event = LifecycleEvent::ProposalFinalized {
                proposal_id: id,
                decision,
                tally,
                at: now,
            };
            self.commit(&event)?;
            slot.proposal.finalize(decision, tally, now)?;

            let finalization = Finalization {
                proposal_id: id,
                decision,
                tally,
                authorization: Some(self.sealer.authorize(id)),
            };
            (finalization, event)
        };

        self.publish(&event);
        tracing::info!(
            proposal_id = id,
            decision = %finalization.decision,
            approve = finalization.tally.approve_weight,
            reject = finalization.tally.reject_weight,
            "Proposal finalized"
        );
        Ok(finalization)
    }

    /// Finalize with the configured quorum and approval threshold.
    pub fn finalize_with_defaults(&self, id: ProposalId) -> Result<Finalization, GovernanceError> {
        self.finalize(
            id,
            self.config.default_quorum,
            self.config.default_approval_threshold,
        )
    }

    /// Reveal capability for a finalized proposal.
    pub fn reveal_authorization(
        &self,
        id: ProposalId,
    ) -> Result<RevealAuthorization, GovernanceError> {
        let slot = self.slot(id)?;
        let status = slot.lock().proposal.status;
        if !status.is_terminal() {
            return Err(GovernanceError::Unauthorized(format!(
                "proposal {} is still pending",
                id
            )));
        }
        Ok(self.sealer.authorize(id))
    }

    /// Open the sealed budget of a finalized proposal.
    pub fn reveal_budget(
        &self,
        id: ProposalId,
        authorization: &RevealAuthorization,
    ) -> Result<Amount, GovernanceError> {
        if authorization.binding() != id {
            tracing::warn!(
                proposal_id = id,
                binding = authorization.binding(),
                "Reveal attempted with authorization for another proposal"
            );
            return Err(GovernanceError::Unauthorized(format!(
                "authorization is bound to proposal {}",
                authorization.binding()
            )));
        }

        let slot = self.slot(id)?;
        let slot = slot.lock();
        if !slot.proposal.status.is_terminal() {
            return Err(GovernanceError::Unauthorized(format!(
                "proposal {} is still pending",
                id
            )));
        }

        let budget = self.sealer.reveal(&slot.proposal.budget, authorization)?;
        tracing::debug!(proposal_id = id, "Budget revealed");
        Ok(budget)
    }

    // ---- Treasury ----

    /// Add funds to the treasury.
    pub fn deposit(&self, from: Address, amount: Amount) -> Result<Amount, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount(
                "deposit must be positive".to_string(),
            ));
        }

        let now = Timestamp::now();
        let event = LifecycleEvent::TreasuryDeposited {
            from,
            amount,
            at: now,
        };
        let balance = {
            let mut treasury = self.treasury.lock();
            self.commit(&event)?;
            treasury.credit(TransactionType::Deposit, amount, from, now)
        };
        self.publish(&event);

        tracing::info!(from = %from.short(), %amount, %balance, "Treasury deposit");
        Ok(balance)
    }

    /// Pay part of a funded proposal's budget from the treasury to its proposer.
    pub fn fund(&self, id: ProposalId, amount: Amount) -> Result<Disbursement, GovernanceError> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount(
                "disbursement must be positive".to_string(),
            ));
        }

        let slot = self.slot(id)?;
        let (disbursement, event) = {
            let mut slot = slot.lock();
            if slot.proposal.status != ProposalStatus::Funded {
                return Err(GovernanceError::NotFunded(id));
            }

            let budget = self
                .sealer
                .reveal(&slot.proposal.budget, &self.sealer.authorize(id))?;
            let remaining = budget.saturating_sub(slot.proposal.disbursed);
            if amount > remaining {
                return Err(GovernanceError::ExceedsBudget {
                    requested: amount,
                    remaining,
                });
            }

            let mut treasury = self.treasury.lock();
            treasury.ensure_available(amount)?;

            let now = Timestamp::now();
            let recipient = slot.proposal.proposer;
            let event = LifecycleEvent::GrantFunded {
                proposal_id: id,
                amount,
                recipient,
                at: now,
            };
            self.commit(&event)?;

            slot.proposal.record_disbursement(amount)?;
            let treasury_balance =
                treasury.disburse(id, slot.proposal.category, amount, recipient, now)?;

            let disbursement = Disbursement {
                proposal_id: id,
                amount,
                recipient,
                total_disbursed: slot.proposal.disbursed,
                remaining_budget: budget.saturating_sub(slot.proposal.disbursed),
                treasury_balance,
            };
            (disbursement, event)
        };

        self.publish(&event);
        tracing::info!(proposal_id = id, %amount, recipient = %disbursement.recipient.short(), "Grant disbursed");
        Ok(disbursement)
    }

    pub fn treasury_balance(&self) -> Amount {
        self.treasury.lock().balance
    }

    /// Snapshot of the treasury.
    pub fn treasury(&self) -> Treasury {
        self.treasury.lock().clone()
    }

    // ---- Internals ----

    fn slot(&self, id: ProposalId) -> Result<SlotRef, GovernanceError> {
        self.proposals
            .read()
            .get(&id)
            .cloned()
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn slots(&self) -> Vec<SlotRef> {
        self.proposals.read().values().cloned().collect()
    }

    fn commit(&self, event: &LifecycleEvent) -> Result<(), GovernanceError> {
        let seq = self.journal.append(event)?;
        tracing::debug!(seq, kind = event.kind(), "Event journaled");
        Ok(())
    }

    fn publish(&self, event: &LifecycleEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    fn replay(&self, seq: u64, event: LifecycleEvent) -> Result<(), GovernanceError> {
        let corrupt = |reason: String| {
            GovernanceError::CorruptJournal(format!("entry {}: {}", seq, reason))
        };

        match event {
            LifecycleEvent::MemberJoined { member, fee } => {
                if self.members.is_member(&member.address) {
                    return Err(corrupt(format!("{} joined twice", member.address)));
                }
                let (address, at) = (member.address, member.joined_at);
                self.members.restore(member);
                self.treasury
                    .lock()
                    .credit(TransactionType::MembershipFee, fee, address, at);
            }
            LifecycleEvent::MemberUpgraded {
                address,
                from,
                to,
                fee,
                at,
            } => {
                let mut member = self
                    .members
                    .member(&address)
                    .ok_or_else(|| corrupt(format!("upgrade of unknown member {}", address)))?;
                if member.tier != from || to <= from {
                    return Err(corrupt(format!(
                        "upgrade {} -> {} does not match tier {}",
                        from, to, member.tier
                    )));
                }
                member.tier = to;
                member.upgraded_at = Some(at);
                self.members.restore(member);
                self.treasury
                    .lock()
                    .credit(TransactionType::MembershipFee, fee, address, at);
            }
            LifecycleEvent::ProposalSubmitted { proposal } => {
                let id = proposal.id;
                let mut proposals = self.proposals.write();
                if proposals.contains_key(&id) {
                    return Err(corrupt(format!("proposal {} submitted twice", id)));
                }
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                proposals.insert(
                    id,
                    Arc::new(Mutex::new(ProposalSlot {
                        proposal,
                        votes: VoteBook::new(),
                    })),
                );
            }
            LifecycleEvent::VoteCast { vote } => {
                let slot = self
                    .slot(vote.proposal_id)
                    .map_err(|e| corrupt(e.to_string()))?;
                slot.lock().votes.cast(vote);
            }
            LifecycleEvent::ProposalFinalized {
                proposal_id,
                decision,
                tally,
                at,
            } => {
                let slot = self.slot(proposal_id).map_err(|e| corrupt(e.to_string()))?;
                slot.lock()
                    .proposal
                    .finalize(decision, tally, at)
                    .map_err(|e| corrupt(e.to_string()))?;
            }
            LifecycleEvent::GrantFunded {
                proposal_id,
                amount,
                recipient,
                at,
            } => {
                let slot = self.slot(proposal_id).map_err(|e| corrupt(e.to_string()))?;
                let mut slot = slot.lock();
                slot.proposal
                    .record_disbursement(amount)
                    .map_err(|e| corrupt(e.to_string()))?;
                self.treasury
                    .lock()
                    .disburse(proposal_id, slot.proposal.category, amount, recipient, at)
                    .map_err(|e| corrupt(e.to_string()))?;
            }
            LifecycleEvent::TreasuryDeposited { from, amount, at } => {
                self.treasury
                    .lock()
                    .credit(TransactionType::Deposit, amount, from, at);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ResearchCategory;
    use cipher_grant_crypto::{EnvelopeSealer, SealingKey};
    use cipher_grant_types::Hash;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn eth(v: f64) -> Amount {
        Amount::try_from(v).unwrap()
    }

    fn sealer() -> Arc<dyn Sealer> {
        Arc::new(EnvelopeSealer::new(&SealingKey::from_bytes([9u8; 32])))
    }

    fn lifecycle() -> GrantLifecycle {
        GrantLifecycle::new(GovernanceConfig::default(), sealer()).unwrap()
    }

    fn draft(budget: f64) -> ProposalDraft {
        ProposalDraft {
            title: "CRISPR Gene Therapy for Rare Diseases".to_string(),
            researcher: "Dr. Maria Rodriguez".to_string(),
            description: "Delivery vectors for monogenic disorders".to_string(),
            category: ResearchCategory::Biotechnology,
            budget: eth(budget),
            duration_months: 24,
        }
    }

    /// A (Scholar, weight 5) and B (Researcher, weight 1) plus one proposal.
    fn two_member_setup(budget: f64) -> (GrantLifecycle, ProposalId) {
        let lc = lifecycle();
        lc.join_dao(addr(0xA), Tier::Scholar).unwrap();
        lc.join_dao(addr(0xB), Tier::Researcher).unwrap();
        let id = lc.submit_proposal(addr(0xC), draft(budget)).unwrap();
        (lc, id)
    }

    #[test]
    fn test_weight_follows_tier_table() {
        let lc = lifecycle();
        for (n, tier) in Tier::ALL.into_iter().enumerate() {
            let address = addr(n as u8 + 1);
            lc.join_dao(address, tier).unwrap();
            assert_eq!(lc.weight_of(&address).unwrap(), tier.voting_weight());
        }
        assert_eq!(lc.treasury_balance(), eth(2.6));
    }

    #[test]
    fn test_join_twice_at_same_tier_fails() {
        let lc = lifecycle();
        lc.join_dao(addr(1), Tier::Patron).unwrap();
        assert_eq!(
            lc.join_dao(addr(1), Tier::Patron),
            Err(GovernanceError::AlreadyMember(addr(1)))
        );
        assert_eq!(lc.weight_of(&addr(1)).unwrap(), 10);
    }

    #[test]
    fn test_submit_assigns_sequential_ids() {
        let lc = lifecycle();
        assert_eq!(lc.submit_proposal(addr(1), draft(10.0)).unwrap(), 1);
        assert_eq!(lc.submit_proposal(addr(1), draft(20.0)).unwrap(), 2);
        assert_eq!(lc.proposal(2).unwrap().status, ProposalStatus::Pending);
    }

    #[test]
    fn test_submit_rejects_invalid_fields() {
        let lc = lifecycle();
        let bad = ProposalDraft {
            researcher: String::new(),
            ..draft(10.0)
        };
        assert!(matches!(
            lc.submit_proposal(addr(1), bad),
            Err(GovernanceError::Validation(_))
        ));
        let endless = ProposalDraft {
            duration_months: 0,
            ..draft(10.0)
        };
        assert!(matches!(
            lc.submit_proposal(addr(1), endless),
            Err(GovernanceError::Validation(_))
        ));
        assert!(lc.proposals(&ProposalFilter::new()).is_empty());
    }

    #[test]
    fn test_vote_requires_membership() {
        let (lc, id) = two_member_setup(10.0);
        assert_eq!(
            lc.cast_vote(id, addr(0xD), VoteChoice::Approve, ""),
            Err(GovernanceError::NotAMember(addr(0xD)))
        );
        assert_eq!(
            lc.cast_vote(99, addr(0xA), VoteChoice::Approve, ""),
            Err(GovernanceError::ProposalNotFound(99))
        );
    }

    #[test]
    fn test_revote_keeps_single_vote() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "strong team").unwrap();
        lc.cast_vote(id, addr(0xA), VoteChoice::Reject, "changed my mind").unwrap();

        let votes = lc.votes(id).unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].choice, VoteChoice::Reject);
        assert_eq!(votes[0].weight, 5);
        assert_eq!(votes[0].comment, "changed my mind");

        let tally = lc.get_tally(id).unwrap();
        assert_eq!(tally.approve_weight, 0);
        assert_eq!(tally.reject_weight, 5);
    }

    #[test]
    fn test_scholar_approve_researcher_reject_is_funded() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.cast_vote(id, addr(0xB), VoteChoice::Reject, "").unwrap();

        let tally = lc.get_tally(id).unwrap();
        assert_eq!(tally.approve_weight, 5);
        assert_eq!(tally.reject_weight, 1);
        assert_eq!(lc.decide(id, 0.0, 0.5).unwrap(), Decision::Funded);

        let result = lc.finalize(id, 0.0, 0.5).unwrap();
        assert_eq!(result.decision, Decision::Funded);
        assert!(result.authorization.is_some());
        assert_eq!(lc.proposal(id).unwrap().status, ProposalStatus::Funded);
    }

    #[test]
    fn test_full_quorum_not_met_is_undecided() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();

        let result = lc.finalize(id, 1.0, 0.5).unwrap();
        assert_eq!(result.decision, Decision::Undecided);
        assert_eq!(result.tally.participating_weight(), 5);
        assert_eq!(result.tally.total_eligible_weight, 6);
        assert!(result.authorization.is_none());

        // Still open: B can vote and a later finalize succeeds.
        assert_eq!(lc.proposal(id).unwrap().status, ProposalStatus::Pending);
        lc.cast_vote(id, addr(0xB), VoteChoice::Approve, "").unwrap();
        assert_eq!(lc.finalize(id, 1.0, 0.5).unwrap().decision, Decision::Funded);
    }

    #[test]
    fn test_finalize_twice_fails() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xB), VoteChoice::Reject, "").unwrap();
        assert_eq!(lc.finalize(id, 0.0, 0.5).unwrap().decision, Decision::Rejected);

        assert_eq!(
            lc.finalize(id, 0.0, 0.5),
            Err(GovernanceError::AlreadyFinalized(id))
        );
        assert_eq!(lc.proposal(id).unwrap().status, ProposalStatus::Rejected);
    }

    #[test]
    fn test_votes_refused_after_finalize() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();
        assert_eq!(
            lc.cast_vote(id, addr(0xB), VoteChoice::Reject, ""),
            Err(GovernanceError::ProposalNotOpen(id))
        );
    }

    #[test]
    fn test_reveal_only_after_finalize() {
        let (lc, id) = two_member_setup(12.5);
        assert!(matches!(
            lc.reveal_authorization(id),
            Err(GovernanceError::Unauthorized(_))
        ));

        // A capability minted directly from the key is still refused while pending.
        let premature = sealer().authorize(id);
        assert!(matches!(
            lc.reveal_budget(id, &premature),
            Err(GovernanceError::Unauthorized(_))
        ));

        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        let auth = lc.finalize(id, 0.0, 0.5).unwrap().authorization.unwrap();
        assert_eq!(lc.reveal_budget(id, &auth).unwrap(), eth(12.5));
        assert_eq!(lc.reveal_budget(id, &lc.reveal_authorization(id).unwrap()).unwrap(), eth(12.5));
    }

    #[test]
    fn test_reveal_rejects_forged_or_misbound_authorization() {
        let (lc, first) = two_member_setup(10.0);
        let second = lc.submit_proposal(addr(0xC), draft(20.0)).unwrap();
        lc.finalize(first, 0.0, 0.5).unwrap();
        lc.finalize(second, 0.0, 0.5).unwrap();

        let forged = RevealAuthorization::from_parts(first, Hash::compute(b"guess"));
        assert!(lc.reveal_budget(first, &forged).unwrap_err().is_security_failure());

        let for_second = lc.reveal_authorization(second).unwrap();
        assert!(matches!(
            lc.reveal_budget(first, &for_second),
            Err(GovernanceError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_fund_requires_funded_status() {
        let (lc, id) = two_member_setup(10.0);
        assert_eq!(lc.fund(id, eth(1.0)), Err(GovernanceError::NotFunded(id)));

        lc.cast_vote(id, addr(0xB), VoteChoice::Reject, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();
        assert_eq!(lc.fund(id, eth(1.0)), Err(GovernanceError::NotFunded(id)));
    }

    #[test]
    fn test_fund_draws_from_treasury_within_budget() {
        let (lc, id) = two_member_setup(10.0);
        lc.deposit(addr(0xE), eth(20.0)).unwrap();
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();

        let first = lc.fund(id, eth(6.0)).unwrap();
        assert_eq!(first.recipient, addr(0xC));
        assert_eq!(first.remaining_budget, eth(4.0));

        assert!(matches!(
            lc.fund(id, eth(5.0)),
            Err(GovernanceError::ExceedsBudget { .. })
        ));
        let second = lc.fund(id, eth(4.0)).unwrap();
        assert_eq!(second.total_disbursed, eth(10.0));
        assert_eq!(second.remaining_budget, Amount::ZERO);
        assert_eq!(lc.proposal(id).unwrap().disbursed, eth(10.0));

        assert!(matches!(
            lc.fund(id, Amount::ZERO),
            Err(GovernanceError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_fractional_budget_pays_out_in_installments() {
        let (lc, id) = two_member_setup(0.3);
        lc.deposit(addr(0xE), eth(1.0)).unwrap();
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();

        let first = lc.fund(id, eth(0.1)).unwrap();
        assert_eq!(first.remaining_budget, eth(0.2));
        let second = lc.fund(id, eth(0.2)).unwrap();
        assert_eq!(second.total_disbursed, eth(0.3));
        assert_eq!(second.remaining_budget, Amount::ZERO);

        assert_eq!(
            lc.fund(id, Amount::from_wei(1)),
            Err(GovernanceError::ExceedsBudget {
                requested: Amount::from_wei(1),
                remaining: Amount::ZERO,
            })
        );
        // 2.5 ETH of fees plus the deposit, less the full budget.
        assert_eq!(lc.treasury_balance(), eth(3.2));
        assert_eq!(lc.treasury().disbursed_for(ResearchCategory::Biotechnology), eth(0.3));
    }

    #[test]
    fn test_fund_fails_when_treasury_short() {
        let (lc, id) = two_member_setup(50.0);
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();

        // Only the 0.6 ETH of membership fees is available.
        assert!(matches!(
            lc.fund(id, eth(1.0)),
            Err(GovernanceError::InsufficientFunds { .. })
        ));
        assert!(lc.proposal(id).unwrap().disbursed.is_zero());
    }

    #[test]
    fn test_upgrade_after_vote_keeps_vote_weight() {
        let (lc, id) = two_member_setup(10.0);
        lc.cast_vote(id, addr(0xB), VoteChoice::Approve, "").unwrap();
        lc.join_dao(addr(0xB), Tier::Patron).unwrap();

        let tally = lc.get_tally(id).unwrap();
        assert_eq!(tally.approve_weight, 1);
        assert_eq!(tally.total_eligible_weight, 15);
    }

    #[test]
    fn test_filters_counts_and_history() {
        let (lc, first) = two_member_setup(10.0);
        let second = lc
            .submit_proposal(
                addr(0xC),
                ProposalDraft {
                    title: "Carbon Capture Catalysts".into(),
                    category: ResearchCategory::Chemistry,
                    ..draft(8.0)
                },
            )
            .unwrap();

        lc.cast_vote(first, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.cast_vote(second, addr(0xA), VoteChoice::Reject, "").unwrap();
        lc.finalize(first, 0.0, 0.5).unwrap();

        let counts = lc.status_counts();
        assert_eq!((counts.pending, counts.funded, counts.rejected), (1, 1, 0));

        let chemistry = lc.proposals(&ProposalFilter::new().category(ResearchCategory::Chemistry));
        assert_eq!(chemistry.len(), 1);
        assert_eq!(chemistry[0].id, second);

        let found = lc.proposals(&ProposalFilter::new().search("carbon"));
        assert_eq!(found.len(), 1);

        let funded = lc.proposals(&ProposalFilter::new().status(ProposalStatus::Funded));
        assert_eq!(funded[0].id, first);

        let history = lc.voting_history(&addr(0xA));
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|r| r.proposal_id == first && r.status == ProposalStatus::Funded));
        assert!(lc.voting_history(&addr(0xB)).is_empty());
    }

    #[test]
    fn test_listener_sees_applied_events() {
        struct Recorder(Mutex<Vec<&'static str>>);
        impl LifecycleListener for Recorder {
            fn on_event(&self, event: &LifecycleEvent) {
                self.0.lock().push(event.kind());
            }
        }

        let lc = lifecycle();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        lc.subscribe(recorder.clone());

        lc.join_dao(addr(1), Tier::Researcher).unwrap();
        let id = lc.submit_proposal(addr(2), draft(1.0)).unwrap();
        lc.cast_vote(id, addr(1), VoteChoice::Approve, "").unwrap();
        let _ = lc.join_dao(addr(1), Tier::Researcher);

        assert_eq!(
            *recorder.0.lock(),
            vec!["member_joined", "proposal_submitted", "vote_cast"]
        );
    }

    #[test]
    fn test_restore_rebuilds_state() {
        let journal: Arc<dyn Journal<LifecycleEvent>> = Arc::new(MemoryJournal::new());
        let lc = GrantLifecycle::restore(GovernanceConfig::default(), sealer(), journal.clone())
            .unwrap();

        lc.join_dao(addr(0xA), Tier::Researcher).unwrap();
        lc.join_dao(addr(0xA), Tier::Scholar).unwrap();
        lc.join_dao(addr(0xB), Tier::Researcher).unwrap();
        lc.deposit(addr(0xE), eth(5.0)).unwrap();
        let id = lc.submit_proposal(addr(0xC), draft(3.0)).unwrap();
        let open = lc.submit_proposal(addr(0xC), draft(4.0)).unwrap();
        lc.cast_vote(id, addr(0xA), VoteChoice::Approve, "").unwrap();
        lc.cast_vote(open, addr(0xB), VoteChoice::Reject, "").unwrap();
        lc.finalize(id, 0.0, 0.5).unwrap();
        lc.fund(id, eth(2.0)).unwrap();

        let restored =
            GrantLifecycle::restore(GovernanceConfig::default(), sealer(), journal).unwrap();

        assert_eq!(restored.members(), lc.members());
        assert_eq!(restored.proposal(id).unwrap(), lc.proposal(id).unwrap());
        assert_eq!(restored.votes(open).unwrap(), lc.votes(open).unwrap());
        assert_eq!(restored.treasury_balance(), lc.treasury_balance());
        assert_eq!(restored.status_counts(), lc.status_counts());

        let auth = restored.reveal_authorization(id).unwrap();
        assert_eq!(restored.reveal_budget(id, &auth).unwrap(), eth(3.0));

        // Ids continue after the highest replayed proposal.
        assert_eq!(restored.submit_proposal(addr(0xC), draft(1.0)).unwrap(), open + 1);
    }

    #[test]
    fn test_restore_rejects_inconsistent_journal() {
        let journal: Arc<dyn Journal<LifecycleEvent>> = Arc::new(MemoryJournal::new());
        journal
            .append(&LifecycleEvent::ProposalFinalized {
                proposal_id: 4,
                decision: Decision::Funded,
                tally: VoteTally::default(),
                at: Timestamp::from_millis(1),
            })
            .unwrap();

        let result = GrantLifecycle::restore(GovernanceConfig::default(), sealer(), journal);
        assert!(matches!(result, Err(GovernanceError::CorruptJournal(_))));
    }

    #[test]
    fn test_concurrent_votes_are_not_lost() {
        let lc = lifecycle();
        let voters: Vec<Address> = (1..=32u8).map(addr).collect();
        for voter in &voters {
            lc.join_dao(*voter, Tier::Researcher).unwrap();
        }
        let id = lc.submit_proposal(addr(0xFF), draft(10.0)).unwrap();

        std::thread::scope(|s| {
            for chunk in voters.chunks(8) {
                let lc = &lc;
                s.spawn(move || {
                    for voter in chunk {
                        lc.cast_vote(id, *voter, VoteChoice::Reject, "").unwrap();
                        lc.cast_vote(id, *voter, VoteChoice::Approve, "").unwrap();
                    }
                });
            }
        });

        let tally = lc.get_tally(id).unwrap();
        assert_eq!(tally.approve_weight, 32);
        assert_eq!(tally.reject_weight, 0);
        assert_eq!(tally.participant_count, 32);
        assert_eq!(lc.finalize(id, 1.0, 0.5).unwrap().decision, Decision::Funded);
    }
}
