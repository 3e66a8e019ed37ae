// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! The assertions an audit can check, each a claim about the relative
//! standing of two candidates at some stage of the count.

use serde::Deserialize;
use serde::Serialize;
use crate::audit::AuditModel;
use crate::ballots::{BallotCount, Ballots, CandidateId};

/// A complete elimination order, earliest elimination first, winner last.
pub type EliminationOrder = Vec<CandidateId>;

/// A contiguous tail of an elimination order; everyone not listed was
/// eliminated before everyone listed.
pub type EliminationOrderSuffix = Vec<CandidateId>;

/// The difficulty of auditing an assertion together with the tally margin
/// backing it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultyAndMargin {
    pub difficulty: f64,
    pub margin: BallotCount,
}

fn tally_margin(winner: BallotCount, loser: BallotCount) -> BallotCount {
    if winner > loser { winner - loser } else { BallotCount(0) }
}

/// What an assertion says about a proposed tail of the elimination order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuffixEffect {
    /// Every completion of this tail is ruled out.
    Contradiction,
    /// The assertion says nothing against orders ending this way.
    Ok,
    /// Depends on how the earlier part of the order is filled in.
    NeedsMoreDetail,
}

/// Assert that `winner` has more votes than `loser` at every stage of the
/// count, so there is no way `loser` can outlast `winner`.
///
/// This was called WinnerOnly in the original paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotEliminatedBefore {
    pub winner: CandidateId,
    pub loser: CandidateId,
}

impl NotEliminatedBefore {
    /// The winner is backed by first preferences only; the loser gets every
    /// ballot on which no other continuing candidate outranks them, the
    /// most votes they could ever hold.
    pub fn difficulty<A: AuditModel>(&self, ballots: &Ballots, audit: &A) -> DifficultyAndMargin {
        let tally_winner = ballots.first_preference_tally(self.winner);
        let tally_loser = ballots.restricted_tallies(&[self.winner, self.loser])[1];
        DifficultyAndMargin {
            difficulty: audit.difficulty(tally_winner, tally_loser),
            margin: tally_margin(tally_winner, tally_loser),
        }
    }

    /// The cheapest NEB ruling out a suffix starting with `c`: either `c`
    /// beats someone due to be eliminated later in the suffix, or someone
    /// outside the suffix beats `c`.
    pub fn find_best_assertion(c: CandidateId, later_in_suffix: &[CandidateId], ballots: &Ballots, cache: &NebCache) -> Option<AssertionAndDifficulty> {
        let mut best: Option<(NotEliminatedBefore, DifficultyAndMargin)> = None;
        for alt in 0..ballots.num_candidates() {
            let alt = CandidateId(alt);
            if alt == c { continue; }
            let contest = if later_in_suffix.contains(&alt) {
                NotEliminatedBefore { winner: c, loser: alt }
            } else {
                NotEliminatedBefore { winner: alt, loser: c }
            };
            let scored = cache.lookup(&contest);
            if best.as_ref().map_or(true, |(_, so_far)| scored.difficulty < so_far.difficulty) {
                best = Some((contest, scored));
            }
        }
        best.map(|(assertion, dm)| AssertionAndDifficulty::new(Assertion::NEB(assertion), dm))
    }

    pub fn effect(&self, suffix: &[CandidateId]) -> SuffixEffect {
        // Everyone absent from the suffix went out before everyone in it, so
        // whichever of the pair shows up last in the scan settles the order.
        for &c in suffix.iter().rev() {
            if c == self.winner { return SuffixEffect::Ok; }
            if c == self.loser { return SuffixEffect::Contradiction; }
        }
        SuffixEffect::NeedsMoreDetail
    }
}

/// Assert that `winner` beats `loser` when only the candidates in
/// `continuing` remain, so `winner` is not the next one eliminated.
///
/// This was called IRV in the original paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotEliminatedNext {
    pub winner: CandidateId,
    pub loser: CandidateId,
    /// The continuing candidates, ascending.
    pub continuing: Vec<CandidateId>,
}

impl NotEliminatedNext {
    pub fn difficulty<A: AuditModel>(&self, ballots: &Ballots, audit: &A) -> DifficultyAndMargin {
        let tallies = ballots.restricted_tallies(&self.continuing);
        let mut tally_winner = BallotCount(usize::MAX);
        let mut tally_loser = BallotCount(0);
        for (i, &c) in self.continuing.iter().enumerate() {
            if c == self.winner { tally_winner = tallies[i]; }
            else if c == self.loser { tally_loser = tallies[i]; }
        }
        DifficultyAndMargin {
            difficulty: audit.difficulty(tally_winner, tally_loser),
            margin: tally_margin(tally_winner, tally_loser),
        }
    }

    /// The cheapest NEN keeping `winner` alive among `continuing`: compare
    /// against whichever continuing candidate holds the fewest votes.
    pub fn find_best_difficulty<A: AuditModel>(ballots: &Ballots, audit: &A, continuing: &[CandidateId], winner: CandidateId) -> Option<AssertionAndDifficulty> {
        let tallies = ballots.restricted_tallies(continuing);
        let mut tally_winner = BallotCount(usize::MAX);
        let mut tally_loser = BallotCount(usize::MAX);
        let mut best_loser: Option<CandidateId> = None;
        for (i, &c) in continuing.iter().enumerate() {
            if c == winner { tally_winner = tallies[i]; }
            else if tallies[i] <= tally_loser { best_loser = Some(c); tally_loser = tallies[i]; }
        }
        let loser = best_loser?;
        let dm = DifficultyAndMargin {
            difficulty: audit.difficulty(tally_winner, tally_loser),
            margin: tally_margin(tally_winner, tally_loser),
        };
        let mut continuing = continuing.to_vec();
        // canonical ascending order: assertion equality and the binary
        // search in is_continuing both rely on it
        continuing.sort_unstable_by_key(|c| c.0);
        let assertion = NotEliminatedNext { winner, loser, continuing };
        Some(AssertionAndDifficulty::new(Assertion::NEN(assertion), dm))
    }

    fn is_continuing(&self, c: CandidateId) -> bool {
        self.continuing.binary_search_by_key(&c.0, |e| e.0).is_ok()
    }

    pub fn effect(&self, suffix: &[CandidateId]) -> SuffixEffect {
        let rounds = self.continuing.len();
        if suffix.len() >= rounds {
            // the last `rounds` entries are the field when this assertion speaks
            let tail = &suffix[suffix.len() - rounds..];
            if tail.iter().any(|&c| !self.is_continuing(c)) {
                return SuffixEffect::Ok; // a different field; says nothing here
            }
            if tail[0] == self.winner { SuffixEffect::Contradiction } else { SuffixEffect::Ok }
        } else {
            if suffix.iter().any(|&c| !self.is_continuing(c)) {
                return SuffixEffect::Ok;
            }
            // all of the suffix sits inside the continuing set; if the winner
            // is already placed they cannot end up first in the full tail
            if suffix.contains(&self.winner) { SuffixEffect::Ok } else { SuffixEffect::NeedsMoreDetail }
        }
    }
}

/// An assertion about the contest, of one of the two kinds the search emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Assertion {
    NEB(NotEliminatedBefore),
    NEN(NotEliminatedNext),
}

impl Assertion {
    pub fn is_neb(&self) -> bool { matches!(self, Assertion::NEB(_)) }

    pub fn effect(&self, suffix: &[CandidateId]) -> SuffixEffect {
        match self {
            Assertion::NEB(neb) => neb.effect(suffix),
            Assertion::NEN(nen) => nen.effect(suffix),
        }
    }

    /// Whether a complete elimination order is consistent with this
    /// assertion. Complete orders are never ambiguous.
    pub fn allows(&self, order: &[CandidateId]) -> bool {
        self.effect(order) == SuffixEffect::Ok
    }

    /// Expand a suffix into the minimal set of longer suffixes this
    /// assertion allows: every permitted completion of `suffix` extends
    /// exactly one of the returned suffixes. For verification of small
    /// contests.
    pub fn allowed_suffixes(&self, suffix: EliminationOrderSuffix, num_candidates: u32) -> Vec<EliminationOrderSuffix> {
        match self.effect(&suffix) {
            SuffixEffect::Ok => vec![suffix],
            SuffixEffect::Contradiction => vec![],
            SuffixEffect::NeedsMoreDetail => {
                let mut res = vec![];
                for c in 0..num_candidates {
                    let c = CandidateId(c);
                    if !suffix.contains(&c) {
                        let mut extended = vec![c];
                        extended.extend_from_slice(&suffix);
                        res.append(&mut self.allowed_suffixes(extended, num_candidates));
                    }
                }
                res
            }
        }
    }
}

/// An assertion bundled with the effort needed to audit it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssertionAndDifficulty {
    pub assertion: Assertion,
    pub difficulty: f64,
    pub margin: BallotCount,
    /// Annotations added by consumers of the assertion (risk measurements,
    /// storage ids and the like); never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl AssertionAndDifficulty {
    pub fn new(assertion: Assertion, dm: DifficultyAndMargin) -> Self {
        AssertionAndDifficulty { assertion, difficulty: dm.difficulty, margin: dm.margin, status: None }
    }
}

/// Difficulty and margin of NEB(winner, loser) for every ordered pair,
/// computed once up front since the frontier search asks about the same
/// pairs over and over. Diagonal entries are infinitely hard.
pub struct NebCache {
    entries: Vec<DifficultyAndMargin>,
    num_candidates: usize,
}

impl NebCache {
    pub fn new<A: AuditModel>(ballots: &Ballots, audit: &A) -> Self {
        let n = ballots.num_candidates() as usize;
        let mut entries = Vec::with_capacity(n * n);
        for winner in 0..n {
            for loser in 0..n {
                entries.push(if winner == loser {
                    DifficultyAndMargin { difficulty: f64::INFINITY, margin: BallotCount(0) }
                } else {
                    let assertion = NotEliminatedBefore {
                        winner: CandidateId(winner as u32),
                        loser: CandidateId(loser as u32),
                    };
                    assertion.difficulty(ballots, audit)
                });
            }
        }
        NebCache { entries, num_candidates: n }
    }

    pub fn lookup(&self, assertion: &NotEliminatedBefore) -> DifficultyAndMargin {
        self.entries[assertion.winner.0 as usize * self.num_candidates + assertion.loser.0 as usize]
    }
}

/// Every permutation of the candidates. Factorial; for verification of
/// small contests only.
pub fn all_elimination_orders(num_candidates: u32) -> Vec<EliminationOrder> {
    if num_candidates == 0 { return vec![vec![]]; }
    let c = CandidateId(num_candidates - 1);
    let mut res = vec![];
    for shorter in all_elimination_orders(num_candidates - 1) {
        // put c in every possible place
        for i in 0..=shorter.len() {
            let mut order = shorter.clone();
            order.insert(i, c);
            res.push(order);
        }
    }
    res
}
