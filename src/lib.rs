// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! Given the ranked ballots of a single IRV contest, produce a set of
//! assertions whose joint validity rules out every elimination order in
//! which anyone other than the reported winner is elected, each scored with
//! how hard it would be to audit. The problem and solution types here form
//! an API suitable for a web service or command line wrapper.

use std::time::Duration;
use serde::Deserialize;
use serde::Serialize;
use crate::audit::Audit;
use crate::ballots::{Ballots, CandidateId, Vote};
use crate::search::{generate_assertions, AssertionSet};
use crate::timeout::TimeOut;
use crate::trim::TrimAlgorithm;

pub mod assertions;
pub mod audit;
pub mod ballots;
pub mod search;
pub mod tabulation;
pub mod timeout;
pub mod trim;

#[derive(thiserror::Error, Debug, Clone, Serialize, Deserialize)]
pub enum AuditError {
    #[error("there must be at least one candidate")]
    InvalidNumberOfCandidates,
    #[error("the time limit must be a positive number of seconds")]
    InvalidTimeout,
    #[error("a vote referenced a candidate not in the contest")]
    InvalidCandidateNumber,
    #[error("timed out determining who won")]
    TimeoutCheckingWinner,
    /// Carries the difficulty of the hardest suffix still outstanding when
    /// time ran out, a lower bound on what the answer would have been.
    #[error("timed out finding assertions - difficulty at stopping point {0}")]
    TimeoutFindingAssertions(f64),
    #[error("timed out trimming assertions")]
    TimeoutTrimmingAssertions,
    /// There may be tie resolution legislation that unambiguously resolves
    /// ties, but an election whose winner turns on it cannot sensibly be
    /// audited stochastically, as a one vote difference would change the
    /// outcome.
    #[error("candidates {0:?} tied as alternate winners")]
    TiedWinners(Vec<CandidateId>),
    #[error("the asserted winner was not the actual winner - expecting {0:?}")]
    WrongWinner(Vec<CandidateId>),
    #[error("could not rule out the elimination order {0:?}")]
    CouldNotRuleOut(Vec<CandidateId>),
    #[error("internal error - ruled out the winner")]
    InternalErrorRuledOutWinner,
    #[error("internal error - did not rule out a loser")]
    InternalErrorDidntRuleOutLoser,
    #[error("internal error - trimming failed")]
    InternalErrorTrimming,
}

/// One contest to generate audit assertions for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditProblem {
    /// Passed through to the solution untouched.
    pub metadata: serde_json::Value,
    pub num_candidates: usize,
    pub votes: Vec<Vote>,
    /// Not strictly necessary, but recommended: it would be unfortunate to
    /// announce one winner and have the audit quietly prove a different
    /// person won without anyone noticing the discrepancy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<CandidateId>,
    pub audit: Audit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_algorithm: Option<TrimAlgorithm>,
    /// Don't bother optimizing below this difficulty. A value > 0 may make
    /// the search faster and the result worse, but no worse than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_estimate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditSolution {
    pub metadata: serde_json::Value,
    pub solution: Result<AssertionSet, AuditError>,
}

impl AuditProblem {
    /// Produce the assertions, or the reason that was not possible.
    pub fn solve(self) -> AuditSolution {
        let duration_limit = match self.time_limit_seconds {
            None => None,
            // rejects NaN, negatives and other nonsense before any work starts
            Some(limit) => match Duration::try_from_secs_f64(limit) {
                Ok(limit) if !limit.is_zero() => Some(limit),
                _ => return AuditSolution { metadata: self.metadata, solution: Err(AuditError::InvalidTimeout) },
            },
        };
        let mut timeout = TimeOut::new(None, duration_limit);
        let solution = if self.num_candidates < 1 {
            Err(AuditError::InvalidNumberOfCandidates)
        } else {
            Ballots::new(self.votes, self.num_candidates).and_then(|ballots| {
                generate_assertions(
                    &ballots,
                    self.winner,
                    &self.audit,
                    self.trim_algorithm.unwrap_or(TrimAlgorithm::MinimizeTree),
                    self.difficulty_estimate,
                    &mut timeout,
                )
            })
        };
        AuditSolution { metadata: self.metadata, solution }
    }
}
