//! Read-side views over the ledger.

use crate::proposal::{Proposal, ProposalId, ProposalStatus, ResearchCategory};
use crate::voting::VoteChoice;
use cipher_grant_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Proposal list filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub category: Option<ResearchCategory>,
    pub search: Option<String>,
}

impl ProposalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: ResearchCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn matches(&self, proposal: &Proposal) -> bool {
        if self.status.is_some_and(|s| s != proposal.status) {
            return false;
        }
        if self.category.is_some_and(|c| c != proposal.category) {
            return false;
        }
        match &self.search {
            Some(text) => proposal.matches_text(text.trim()),
            None => true,
        }
    }
}

/// Number of proposals in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub funded: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ProposalStatus) {
        match status {
            ProposalStatus::Pending => self.pending += 1,
            ProposalStatus::Funded => self.funded += 1,
            ProposalStatus::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.funded + self.rejected
    }
}

/// One entry in a member's voting history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingRecord {
    pub proposal_id: ProposalId,
    pub title: String,
    pub choice: VoteChoice,
    pub weight: u64,
    pub cast_at: Timestamp,
    /// Status of the proposal now
    pub status: ProposalStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_matches_everything() {
        let filter = ProposalFilter::new().search("   ");
        assert_eq!(filter.search, None);
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(ProposalStatus::Pending);
        counts.record(ProposalStatus::Funded);
        counts.record(ProposalStatus::Funded);
        assert_eq!(counts.funded, 2);
        assert_eq!(counts.total(), 3);
    }
}
