// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! The ballot data for a single IRV contest.
//!
//! Counts and candidate numbers are newtype wrappers around integers so that
//! e.g. a tally cannot be added to a candidate number by accident. Rust makes
//! these wrappers free, so there is little reason not to use them.

use std::collections::HashMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use serde::Deserialize;
use serde::Serialize;
use crate::AuditError;

/// A number of ballot papers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BallotCount(pub usize);

impl AddAssign for BallotCount {
    fn add_assign(&mut self, rhs: Self) { self.0 += rhs.0; }
}
impl Add for BallotCount {
    type Output = BallotCount;
    fn add(self, rhs: Self) -> Self::Output { BallotCount(self.0 + rhs.0) }
}
impl Sub for BallotCount {
    type Output = BallotCount;
    fn sub(self, rhs: Self) -> Self::Output { BallotCount(self.0 - rhs.0) }
}
impl Sum for BallotCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        BallotCount(iter.map(|b| b.0).sum())
    }
}
// really a type alias, don't want a long display
impl fmt::Display for BallotCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
impl fmt::Debug for BallotCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A candidate, identified by position on the ballot paper, counting from 0.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u32);

// really a type alias, don't want a long display
impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
impl fmt::Debug for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// A number of identical rankings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vote {
    /// How many voters voted exactly this way.
    pub n: BallotCount,
    /// Ranked candidates, most preferred first.
    pub prefs: Vec<CandidateId>,
}

impl Vote {
    /// The position (within the continuing slice) of the most preferred
    /// candidate on this ballot who is still continuing.
    fn top_preference(&self, position_in_continuing: &HashMap<CandidateId, usize>) -> Option<usize> {
        self.prefs.iter().find_map(|c| position_in_continuing.get(c).copied())
    }
}

/// All the ballots cast in one contest, with first preference tallies
/// computed once at construction. Immutable thereafter.
pub struct Ballots {
    pub votes: Vec<Vote>,
    first_preferences: Vec<BallotCount>,
}

impl Ballots {
    /// Build the table, checking that every referenced candidate exists.
    pub fn new(votes: Vec<Vote>, num_candidates: usize) -> Result<Ballots, AuditError> {
        let mut first_preferences = vec![BallotCount(0); num_candidates];
        for v in &votes {
            if v.prefs.iter().any(|c| c.0 as usize >= num_candidates) {
                return Err(AuditError::InvalidCandidateNumber);
            }
            if let Some(&c) = v.prefs.first() {
                first_preferences[c.0 as usize] += v.n;
            }
        }
        Ok(Ballots { votes, first_preferences })
    }

    pub fn first_preference_tally(&self, candidate: CandidateId) -> BallotCount {
        self.first_preferences[candidate.0 as usize]
    }

    /// Tallies as if only the given candidates were standing, in the same
    /// order as the `continuing` slice. A ballot ranking none of them counts
    /// for no one.
    pub fn restricted_tallies(&self, continuing: &[CandidateId]) -> Vec<BallotCount> {
        let mut tallies = vec![BallotCount(0); continuing.len()];
        let position: HashMap<CandidateId, usize> =
            continuing.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        for v in &self.votes {
            if let Some(i) = v.top_preference(&position) {
                tallies[i] += v.n;
            }
        }
        tallies
    }

    pub fn total_votes(&self) -> BallotCount {
        self.votes.iter().map(|v| v.n).sum()
    }

    pub fn num_candidates(&self) -> u32 { self.first_preferences.len() as u32 }
}
