//! Weighted votes, tallies and the funding decision.
//!
//! A tally is always derived from the stored votes, never kept as a running
//! counter. Each voter holds at most one vote per proposal; a later vote
//! replaces the earlier one.

use crate::config::check_ratio;
use crate::error::GovernanceError;
use crate::proposal::ProposalId;
use cipher_grant_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Vote choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Approve => "approve",
            VoteChoice::Reject => "reject",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "yes" | "for" => Ok(VoteChoice::Approve),
            "reject" | "no" | "against" => Ok(VoteChoice::Reject),
            _ => Err(GovernanceError::InvalidChoice(s.to_string())),
        }
    }
}

/// A recorded vote. `weight` is the voter's weight when the vote was cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub voter: Address,
    pub choice: VoteChoice,
    pub weight: u64,
    pub comment: String,
    pub cast_at: Timestamp,
}

/// Weighted vote totals for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub approve_weight: u64,
    pub reject_weight: u64,
    pub participant_count: u64,
    /// Weight of every member at the time of tallying
    pub total_eligible_weight: u64,
}

impl VoteTally {
    /// Recompute a tally from a vote set.
    pub fn from_votes<'a, I>(votes: I, total_eligible_weight: u64) -> Self
    where
        I: IntoIterator<Item = &'a Vote>,
    {
        let mut tally = VoteTally {
            total_eligible_weight,
            ..VoteTally::default()
        };
        for vote in votes {
            match vote.choice {
                VoteChoice::Approve => tally.approve_weight += vote.weight,
                VoteChoice::Reject => tally.reject_weight += vote.weight,
            }
            tally.participant_count += 1;
        }
        tally
    }

    pub fn participating_weight(&self) -> u64 {
        self.approve_weight + self.reject_weight
    }

    /// Share of eligible weight that voted. Zero when nobody is eligible.
    pub fn participation(&self) -> f64 {
        if self.total_eligible_weight == 0 {
            return 0.0;
        }
        (self.participating_weight() as f64 / self.total_eligible_weight as f64).min(1.0)
    }

    /// Share of decisive weight in favor, if any weight was cast.
    pub fn approval_ratio(&self) -> Option<f64> {
        let decisive = self.participating_weight();
        if decisive == 0 {
            return None;
        }
        Some(self.approve_weight as f64 / decisive as f64)
    }
}

/// Outcome of applying quorum and threshold to a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Funded,
    Rejected,
    /// Quorum not reached; the proposal stays open
    Undecided,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Funded => "funded",
            Decision::Rejected => "rejected",
            Decision::Undecided => "undecided",
        };
        f.write_str(s)
    }
}

/// Decide a tally.
///
/// Below quorum the result is `Undecided`. Otherwise the proposal is funded
/// when the approving share of decisive weight reaches `threshold`; a tie,
/// or no decisive weight at all, rejects.
pub fn decide(tally: &VoteTally, quorum: f64, threshold: f64) -> Result<Decision, GovernanceError> {
    check_ratio("quorum", quorum)?;
    check_ratio("threshold", threshold)?;

    if tally.participation() < quorum {
        return Ok(Decision::Undecided);
    }

    let decision = match tally.approval_ratio() {
        None => Decision::Rejected,
        Some(_) if tally.approve_weight == tally.reject_weight => Decision::Rejected,
        Some(ratio) if ratio >= threshold => Decision::Funded,
        Some(_) => Decision::Rejected,
    };
    Ok(decision)
}

/// Votes on a single proposal, one per voter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteBook {
    votes: BTreeMap<Address, Vote>,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `vote`, returning the vote it replaced.
    pub fn cast(&mut self, vote: Vote) -> Option<Vote> {
        self.votes.insert(vote.voter, vote)
    }

    pub fn get(&self, voter: &Address) -> Option<&Vote> {
        self.votes.get(voter)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vote> {
        self.votes.values()
    }

    pub fn tally(&self, total_eligible_weight: u64) -> VoteTally {
        VoteTally::from_votes(self.votes.values(), total_eligible_weight)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
