// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::fmt;

use serde::{Deserialize, Serialize};
use tpre_core::PolicyGrant;

use crate::{CoordinatorError, RelayRecord};

/// Why a single relay did not contribute a verified cfrag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayFailure {
    Timeout,
    ProofFailed,
    Unreachable,
    Malformed,
    Refused,
}

impl fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayFailure::Timeout => "timeout",
            RelayFailure::ProofFailed => "proof failure",
            RelayFailure::Unreachable => "unreachable",
            RelayFailure::Malformed => "malformed response",
            RelayFailure::Refused => "refused",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureTally {
    pub timeouts: usize,
    pub proof_failures: usize,
    pub unreachable: usize,
    pub malformed: usize,
    pub refused: usize,
}

impl FailureTally {
    pub fn record(&mut self, failure: RelayFailure) {
        match failure {
            RelayFailure::Timeout => self.timeouts += 1,
            RelayFailure::ProofFailed => self.proof_failures += 1,
            RelayFailure::Unreachable => self.unreachable += 1,
            RelayFailure::Malformed => self.malformed += 1,
            RelayFailure::Refused => self.refused += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.timeouts + self.proof_failures + self.unreachable + self.malformed + self.refused
    }
}

impl fmt::Display for FailureTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timeouts={} proof_failures={} unreachable={} malformed={} refused={}",
            self.timeouts, self.proof_failures, self.unreachable, self.malformed, self.refused
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonCause {
    Expired,
    /// Every eligible relay was tried without reaching the threshold.
    RosterExhausted,
    /// Fewer eligible relays than the threshold at distribution time.
    RelayShortage,
    /// Verified cfrags did not combine into a key.
    AggregationFailed,
}

impl fmt::Display for AbandonCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AbandonCause::Expired => "expired",
            AbandonCause::RosterExhausted => "roster exhausted",
            AbandonCause::RelayShortage => "relay shortage",
            AbandonCause::AggregationFailed => "aggregation failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonReason {
    pub cause: AbandonCause,
    pub tally: FailureTally,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.cause, self.tally)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distributing {
    pub(crate) grants: Vec<PolicyGrant>,
    /// Ranked eligible relays; the first `shares` are the primary assignment.
    pub(crate) candidates: Vec<RelayRecord>,
}

impl Distributing {
    pub fn grants(&self) -> &[PolicyGrant] {
        &self.grants
    }

    pub fn candidates(&self) -> &[RelayRecord] {
        &self.candidates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingCfrags {
    pub in_flight: usize,
    pub verified: usize,
    pub tally: FailureTally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregating {
    pub verified: usize,
    pub tally: FailureTally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complete {
    pub tally: FailureTally,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PolicyState {
    #[default]
    Created,
    Distributing(Distributing),
    AwaitingCfrags(AwaitingCfrags),
    Aggregating(Aggregating),
    Complete(Complete),
    Abandoned(AbandonReason),
}

impl PolicyState {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyState::Created => "Created",
            PolicyState::Distributing(_) => "Distributing",
            PolicyState::AwaitingCfrags(_) => "AwaitingCfrags",
            PolicyState::Aggregating(_) => "Aggregating",
            PolicyState::Complete(_) => "Complete",
            PolicyState::Abandoned(_) => "Abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyState::Complete(_) | PolicyState::Abandoned(_))
    }

    pub fn abandon_reason(&self) -> Option<&AbandonReason> {
        match self {
            PolicyState::Abandoned(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&PolicyState> for Complete {
    type Error = CoordinatorError;
    fn try_from(value: &PolicyState) -> Result<Self, Self::Error> {
        match value {
            PolicyState::Complete(s) => Ok(*s),
            other => Err(CoordinatorError::InvalidState {
                operation: "read completion",
                state: other.name(),
            }),
        }
    }
}
