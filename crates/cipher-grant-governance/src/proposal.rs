//! Research proposals and their lifecycle.
//!
//! Proposals go through states: Pending -> Funded | Rejected. Both end states
//! are terminal.

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::voting::{Decision, VoteTally};
use cipher_grant_crypto::SealedValue;
use cipher_grant_types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sequential proposal identifier, starting at 1.
pub type ProposalId = u64;

/// Proposal status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Open for voting, budget sealed
    Pending,
    /// Approved; budget revealable and disbursements allowed
    Funded,
    /// Declined; budget revealable
    Rejected,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 3] = [
        ProposalStatus::Pending,
        ProposalStatus::Funded,
        ProposalStatus::Rejected,
    ];

    /// Check if voting is still possible.
    pub fn can_vote(&self) -> bool {
        matches!(self, ProposalStatus::Pending)
    }

    /// Check if the proposal has left Pending for good.
    pub fn is_terminal(&self) -> bool {
        !self.can_vote()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Funded => "funded",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ProposalStatus::Pending),
            "funded" => Ok(ProposalStatus::Funded),
            "rejected" => Ok(ProposalStatus::Rejected),
            _ => Err(GovernanceError::InvalidParameter(format!(
                "unknown proposal status '{}'",
                s
            ))),
        }
    }
}

/// Research field a proposal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResearchCategory {
    Biotechnology,
    Quantum,
    Environmental,
    AiMl,
    Physics,
    Chemistry,
}

impl ResearchCategory {
    pub const ALL: [ResearchCategory; 6] = [
        ResearchCategory::Biotechnology,
        ResearchCategory::Quantum,
        ResearchCategory::Environmental,
        ResearchCategory::AiMl,
        ResearchCategory::Physics,
        ResearchCategory::Chemistry,
    ];

    /// Stable identifier used in files and on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            ResearchCategory::Biotechnology => "biotechnology",
            ResearchCategory::Quantum => "quantum",
            ResearchCategory::Environmental => "environmental",
            ResearchCategory::AiMl => "ai-ml",
            ResearchCategory::Physics => "physics",
            ResearchCategory::Chemistry => "chemistry",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ResearchCategory::Biotechnology => "Biotechnology",
            ResearchCategory::Quantum => "Quantum Research",
            ResearchCategory::Environmental => "Environmental Science",
            ResearchCategory::AiMl => "AI & Machine Learning",
            ResearchCategory::Physics => "Physics",
            ResearchCategory::Chemistry => "Chemistry",
        }
    }
}

impl fmt::Display for ResearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ResearchCategory {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ResearchCategory::ALL
            .into_iter()
            .find(|c| c.slug() == wanted || c.display_name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| {
                GovernanceError::InvalidParameter(format!("unknown research category '{}'", s))
            })
    }
}

/// Caller-supplied fields of a new proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalDraft {
    pub title: String,
    pub researcher: String,
    pub description: String,
    pub category: ResearchCategory,
    /// Requested budget, sealed on submission
    pub budget: Amount,
    pub duration_months: i64,
}

impl ProposalDraft {
    /// Check every field against `config`.
    pub fn validate(&self, config: &GovernanceConfig) -> Result<(), GovernanceError> {
        check_text("title", &self.title, config.max_title_len)?;
        check_text("researcher", &self.researcher, config.max_researcher_len)?;
        check_text("description", &self.description, config.max_description_len)?;

        if self.duration_months <= 0 {
            return Err(GovernanceError::Validation(format!(
                "duration must be positive, got {} months",
                self.duration_months
            )));
        }
        if self.duration_months > i64::from(config.max_duration_months) {
            return Err(GovernanceError::Validation(format!(
                "duration of {} months exceeds limit of {}",
                self.duration_months, config.max_duration_months
            )));
        }

        Ok(())
    }
}

fn check_text(field: &str, value: &str, max_len: usize) -> Result<(), GovernanceError> {
    if value.trim().is_empty() {
        return Err(GovernanceError::Validation(format!("{} is empty", field)));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(GovernanceError::Validation(format!(
            "{} is {} characters, limit is {}",
            field, len, max_len
        )));
    }
    Ok(())
}

/// A grant proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique proposal ID
    pub id: ProposalId,
    /// Title
    pub title: String,
    /// Researcher name
    pub researcher: String,
    /// Description
    pub description: String,
    /// Research field
    pub category: ResearchCategory,
    /// Sealed budget, bound to `id`
    pub budget: SealedValue,
    /// Research duration
    pub duration_months: u32,
    /// Submitting account, recipient of disbursements
    pub proposer: Address,
    /// Current status
    pub status: ProposalStatus,
    pub created_at: Timestamp,
    pub finalized_at: Option<Timestamp>,
    /// Tally frozen at finalization
    pub final_tally: Option<VoteTally>,
    /// Total disbursed so far
    pub disbursed: Amount,
}

impl Proposal {
    /// Create a pending proposal from a validated draft.
    pub fn new(
        id: ProposalId,
        proposer: Address,
        draft: ProposalDraft,
        budget: SealedValue,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            researcher: draft.researcher.trim().to_string(),
            description: draft.description,
            category: draft.category,
            budget,
            duration_months: u32::try_from(draft.duration_months).unwrap_or(u32::MAX),
            proposer,
            status: ProposalStatus::Pending,
            created_at,
            finalized_at: None,
            final_tally: None,
            disbursed: Amount::ZERO,
        }
    }

    /// Move to the end state named by `decision`.
    pub fn finalize(
        &mut self,
        decision: Decision,
        tally: VoteTally,
        at: Timestamp,
    ) -> Result<(), GovernanceError> {
        if self.status.is_terminal() {
            return Err(GovernanceError::AlreadyFinalized(self.id));
        }
        self.status = match decision {
            Decision::Funded => ProposalStatus::Funded,
            Decision::Rejected => ProposalStatus::Rejected,
            Decision::Undecided => {
                return Err(GovernanceError::Validation(format!(
                    "proposal {} has no decision to apply",
                    self.id
                )))
            }
        };
        self.finalized_at = Some(at);
        self.final_tally = Some(tally);
        Ok(())
    }

    /// Add a disbursement to the running total.
    pub fn record_disbursement(&mut self, amount: Amount) -> Result<(), GovernanceError> {
        if self.status != ProposalStatus::Funded {
            return Err(GovernanceError::NotFunded(self.id));
        }
        self.disbursed = self.disbursed.checked_add(amount)?;
        Ok(())
    }

    /// Case-insensitive match on title, researcher or description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.researcher.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProposalDraft {
        ProposalDraft {
            title: "Quantum Error Correction".to_string(),
            researcher: "Dr. Sarah Chen".to_string(),
            description: "Surface code decoders for near-term devices".to_string(),
            category: ResearchCategory::Quantum,
            budget: Amount::from_eth(45),
            duration_months: 18,
        }
    }

    fn proposal() -> Proposal {
        let sealed = SealedValue::from_parts(vec![1, 2, 3], Timestamp::from_millis(1));
        Proposal::new(
            1,
            Address::from_bytes([7; 20]),
            draft(),
            sealed,
            Timestamp::from_millis(1),
        )
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate(&GovernanceConfig::default()).is_ok());
    }

    #[test]
    fn test_draft_rejections() {
        let config = GovernanceConfig::default();

        let empty_title = ProposalDraft {
            title: "   ".into(),
            ..draft()
        };
        assert!(matches!(empty_title.validate(&config), Err(GovernanceError::Validation(_))));

        let zero_duration = ProposalDraft {
            duration_months: 0,
            ..draft()
        };
        assert!(zero_duration.validate(&config).is_err());

        let long_title = ProposalDraft {
            title: "x".repeat(config.max_title_len + 1),
            ..draft()
        };
        assert!(long_title.validate(&config).is_err());
    }

    #[test]
    fn test_zero_budget_allowed() {
        let free = ProposalDraft {
            budget: Amount::ZERO,
            ..draft()
        };
        assert!(free.validate(&GovernanceConfig::default()).is_ok());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("ai-ml".parse::<ResearchCategory>().unwrap(), ResearchCategory::AiMl);
        assert_eq!(
            "Quantum Research".parse::<ResearchCategory>().unwrap(),
            ResearchCategory::Quantum
        );
        assert!("astrology".parse::<ResearchCategory>().is_err());
        assert_eq!(ResearchCategory::AiMl.to_string(), "AI & Machine Learning");
    }

    #[test]
    fn test_finalize_is_one_way() {
        let mut p = proposal();
        assert!(p.status.can_vote());

        p.finalize(Decision::Funded, VoteTally::default(), Timestamp::from_millis(9))
            .unwrap();
        assert_eq!(p.status, ProposalStatus::Funded);
        assert_eq!(p.finalized_at, Some(Timestamp::from_millis(9)));

        assert_eq!(
            p.finalize(Decision::Rejected, VoteTally::default(), Timestamp::from_millis(10)),
            Err(GovernanceError::AlreadyFinalized(1))
        );
        assert_eq!(p.status, ProposalStatus::Funded);
    }

    #[test]
    fn test_finalize_undecided_keeps_pending() {
        let mut p = proposal();
        assert!(p
            .finalize(Decision::Undecided, VoteTally::default(), Timestamp::from_millis(2))
            .is_err());
        assert_eq!(p.status, ProposalStatus::Pending);
    }

    #[test]
    fn test_disbursement_requires_funded() {
        let mut p = proposal();
        let amount = Amount::from_milli_eth(150);
        assert_eq!(p.record_disbursement(amount), Err(GovernanceError::NotFunded(1)));

        p.finalize(Decision::Funded, VoteTally::default(), Timestamp::from_millis(2))
            .unwrap();
        p.record_disbursement(amount).unwrap();
        p.record_disbursement(amount).unwrap();
        assert_eq!(p.disbursed, Amount::from_milli_eth(300));
    }

    #[test]
    fn test_text_search() {
        let p = proposal();
        assert!(p.matches_text("surface CODE"));
        assert!(p.matches_text("chen"));
        assert!(!p.matches_text("protein"));
    }
}
