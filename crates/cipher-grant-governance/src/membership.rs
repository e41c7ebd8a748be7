//! DAO membership: tiers, voting weight and the member registry.

use crate::error::GovernanceError;
use cipher_grant_types::{Address, Amount, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Membership tier. Ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Researcher,
    Scholar,
    Patron,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Researcher, Tier::Scholar, Tier::Patron];

    /// Voting weight granted by this tier.
    pub fn voting_weight(&self) -> u64 {
        match self {
            Tier::Researcher => 1,
            Tier::Scholar => 5,
            Tier::Patron => 10,
        }
    }

    /// Fee paid into the treasury to hold this tier.
    pub fn membership_fee(&self) -> Amount {
        match self {
            Tier::Researcher => Amount::from_milli_eth(100),
            Tier::Scholar => Amount::from_milli_eth(500),
            Tier::Patron => Amount::from_milli_eth(2_000),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Researcher => "researcher",
            Tier::Scholar => "scholar",
            Tier::Patron => "patron",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tier::Researcher => "Vote on proposals and submit research",
            Tier::Scholar => "Enhanced voting weight and proposal review",
            Tier::Patron => "Maximum voting weight and governance rights",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "researcher" => Ok(Tier::Researcher),
            "scholar" => Ok(Tier::Scholar),
            "patron" => Ok(Tier::Patron),
            _ => Err(GovernanceError::InvalidTier(s.to_string())),
        }
    }
}

/// A registered DAO member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub address: Address,
    pub tier: Tier,
    pub joined_at: Timestamp,
    pub upgraded_at: Option<Timestamp>,
}

impl Member {
    pub fn voting_weight(&self) -> u64 {
        self.tier.voting_weight()
    }
}

/// Result of a successful join request.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// First registration of the address.
    Joined { member: Member, fee: Amount },
    /// Existing member moved to a higher tier, paying the fee difference.
    Upgraded {
        member: Member,
        previous: Tier,
        fee: Amount,
    },
}

impl JoinOutcome {
    pub fn member(&self) -> &Member {
        match self {
            JoinOutcome::Joined { member, .. } | JoinOutcome::Upgraded { member, .. } => member,
        }
    }

    pub fn fee(&self) -> Amount {
        match self {
            JoinOutcome::Joined { fee, .. } | JoinOutcome::Upgraded { fee, .. } => *fee,
        }
    }
}

/// Registry of members keyed by address.
///
/// Each address has at most one record. A repeat join is only accepted when
/// it moves the member to a strictly higher tier.
#[derive(Debug, Default)]
pub struct MembershipLedger {
    members: DashMap<Address, Member>,
}

impl MembershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` at `tier`.
    pub fn join(
        &self,
        address: Address,
        tier: Tier,
        at: Timestamp,
    ) -> Result<JoinOutcome, GovernanceError> {
        self.join_with(address, tier, at, |_| Ok(()))
    }

    /// Register `address` at `tier`, running `commit` while the address is
    /// locked and before the record becomes visible. An error from `commit`
    /// leaves the registry unchanged.
    pub fn join_with<F>(
        &self,
        address: Address,
        tier: Tier,
        at: Timestamp,
        commit: F,
    ) -> Result<JoinOutcome, GovernanceError>
    where
        F: FnOnce(&JoinOutcome) -> Result<(), GovernanceError>,
    {
        if address.is_zero() {
            return Err(GovernanceError::Validation(
                "zero address cannot join".to_string(),
            ));
        }

        match self.members.entry(address) {
            Entry::Vacant(slot) => {
                let member = Member {
                    address,
                    tier,
                    joined_at: at,
                    upgraded_at: None,
                };
                let outcome = JoinOutcome::Joined {
                    member: member.clone(),
                    fee: tier.membership_fee(),
                };
                commit(&outcome)?;
                slot.insert(member);
                Ok(outcome)
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get().tier;
                if tier <= current {
                    return Err(GovernanceError::AlreadyMember(address));
                }
                let member = Member {
                    tier,
                    upgraded_at: Some(at),
                    ..slot.get().clone()
                };
                let outcome = JoinOutcome::Upgraded {
                    member: member.clone(),
                    previous: current,
                    fee: tier.membership_fee().saturating_sub(current.membership_fee()),
                };
                commit(&outcome)?;
                slot.insert(member);
                Ok(outcome)
            }
        }
    }

    /// Put a member record back as it was journaled.
    pub fn restore(&self, member: Member) {
        self.members.insert(member.address, member);
    }

    pub fn member(&self, address: &Address) -> Option<Member> {
        self.members.get(address).map(|m| m.value().clone())
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.members.contains_key(address)
    }

    /// Current voting weight of `address`.
    pub fn weight_of(&self, address: &Address) -> Result<u64, GovernanceError> {
        self.members
            .get(address)
            .map(|m| m.voting_weight())
            .ok_or(GovernanceError::NotAMember(*address))
    }

    /// Combined weight of every member.
    pub fn total_weight(&self) -> u64 {
        self.members.iter().map(|m| m.voting_weight()).sum()
    }

    /// All members, oldest first.
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.members.iter().map(|m| m.value().clone()).collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.address.cmp(&b.address))
        });
        members
    }

    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.members.iter().filter(|m| m.tier == tier).count()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_tier_weights_and_fees() {
        assert_eq!(Tier::Researcher.voting_weight(), 1);
        assert_eq!(Tier::Scholar.voting_weight(), 5);
        assert_eq!(Tier::Patron.voting_weight(), 10);
        assert_eq!(Tier::Scholar.membership_fee(), Amount::from_milli_eth(500));
        assert!(Tier::Researcher < Tier::Patron);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Patron".parse::<Tier>().unwrap(), Tier::Patron);
        assert_eq!(" scholar ".parse::<Tier>().unwrap(), Tier::Scholar);
        assert!(matches!(
            "admin".parse::<Tier>(),
            Err(GovernanceError::InvalidTier(_))
        ));
    }

    #[test]
    fn test_join_and_weight() {
        let ledger = MembershipLedger::new();
        let outcome = ledger.join(addr(1), Tier::Scholar, at(10)).unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
        assert_eq!(outcome.fee(), Amount::from_milli_eth(500));

        assert_eq!(ledger.weight_of(&addr(1)).unwrap(), 5);
        assert_eq!(
            ledger.weight_of(&addr(2)),
            Err(GovernanceError::NotAMember(addr(2)))
        );
    }

    #[test]
    fn test_rejoin_same_or_lower_tier_fails() {
        let ledger = MembershipLedger::new();
        ledger.join(addr(1), Tier::Scholar, at(1)).unwrap();

        assert_eq!(
            ledger.join(addr(1), Tier::Scholar, at(2)),
            Err(GovernanceError::AlreadyMember(addr(1)))
        );
        assert_eq!(
            ledger.join(addr(1), Tier::Researcher, at(3)),
            Err(GovernanceError::AlreadyMember(addr(1)))
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.member(&addr(1)).unwrap().tier, Tier::Scholar);
    }

    #[test]
    fn test_upgrade_pays_difference() {
        let ledger = MembershipLedger::new();
        ledger.join(addr(1), Tier::Researcher, at(1)).unwrap();
        let outcome = ledger.join(addr(1), Tier::Patron, at(5)).unwrap();

        match outcome {
            JoinOutcome::Upgraded { member, previous, fee } => {
                assert_eq!(previous, Tier::Researcher);
                assert_eq!(member.tier, Tier::Patron);
                assert_eq!(member.joined_at, at(1));
                assert_eq!(member.upgraded_at, Some(at(5)));
                assert_eq!(fee, Amount::from_milli_eth(1_900));
            }
            other => panic!("expected upgrade, got {:?}", other),
        }
        assert_eq!(ledger.total_weight(), 10);
    }

    #[test]
    fn test_failed_commit_leaves_ledger_unchanged() {
        let ledger = MembershipLedger::new();
        let result = ledger.join_with(addr(1), Tier::Patron, at(1), |_| {
            Err(GovernanceError::Storage("disk full".into()))
        });
        assert!(result.is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_zero_address_rejected() {
        let ledger = MembershipLedger::new();
        assert!(matches!(
            ledger.join(Address::ZERO, Tier::Researcher, at(1)),
            Err(GovernanceError::Validation(_))
        ));
    }

    #[test]
    fn test_totals_and_ordering() {
        let ledger = MembershipLedger::new();
        ledger.join(addr(3), Tier::Patron, at(3)).unwrap();
        ledger.join(addr(1), Tier::Researcher, at(1)).unwrap();
        ledger.join(addr(2), Tier::Scholar, at(2)).unwrap();

        assert_eq!(ledger.total_weight(), 16);
        assert_eq!(ledger.count_by_tier(Tier::Scholar), 1);

        let order: Vec<Address> = ledger.members().into_iter().map(|m| m.address).collect();
        assert_eq!(order, vec![addr(1), addr(2), addr(3)]);
    }
}
