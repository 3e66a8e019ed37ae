// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! The frontier search over elimination order suffixes that chooses which
//! assertions to audit.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use serde::Deserialize;
use serde::Serialize;
use crate::assertions::{all_elimination_orders, Assertion, AssertionAndDifficulty, EliminationOrder, EliminationOrderSuffix, NebCache, NotEliminatedBefore, NotEliminatedNext};
use crate::audit::AuditModel;
use crate::ballots::{BallotCount, Ballots, CandidateId};
use crate::tabulation::tabulate;
use crate::timeout::{TimeOut, TimeTaken};
use crate::trim::{sort_and_trim, PruneTreeNode, TreeContinuation, TrimAlgorithm};
use crate::AuditError;

/// The assertions chosen for a contest, with the effort needed to audit
/// them. The difficulty is the largest over the retained assertions, the
/// margin the smallest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssertionSet {
    pub assertions: Vec<AssertionAndDifficulty>,
    pub difficulty: f64,
    pub margin: BallotCount,
    pub winner: CandidateId,
    pub num_candidates: u32,
    pub time_to_determine_winners: TimeTaken,
    pub time_to_find_assertions: TimeTaken,
    pub time_to_trim_assertions: TimeTaken,
    /// Set when trimming ran out of time; the assertions are then sorted
    /// but still carry whatever redundancy the search left in.
    #[serde(default)]
    pub warning_trim_timed_out: bool,
}

impl AssertionSet {
    /// Brute force enumeration of the complete elimination orders the
    /// assertions permit. Factorial; for tests and small contests.
    pub fn allowed_elimination_orders(&self) -> Vec<EliminationOrder> {
        let mut orders = all_elimination_orders(self.num_candidates);
        for a in &self.assertions {
            orders.retain(|order| a.assertion.allows(order));
        }
        orders
    }

    /// The minimal elimination order suffixes the assertions permit: every
    /// allowed complete order extends exactly one of them. A more compact
    /// view of the same information as [`Self::allowed_elimination_orders`].
    pub fn allowed_elimination_order_suffixes(&self) -> Vec<EliminationOrderSuffix> {
        let mut suffixes: Vec<EliminationOrderSuffix> = vec![vec![]];
        for a in &self.assertions {
            let mut next = vec![];
            for s in suffixes.drain(..) {
                next.append(&mut a.assertion.allowed_suffixes(s, self.num_candidates));
            }
            suffixes = next;
        }
        suffixes
    }

    /// Check that every candidate other than the winner really is ruled out
    /// by the assertions, and the winner is not.
    pub fn verify_result_does_prove_winner(&self, timeout: &mut TimeOut) -> Result<(), AuditError> {
        let all_assertions: Vec<Assertion> = self.assertions.iter().map(|ad| ad.assertion.clone()).collect();
        let all_indices: Vec<usize> = (0..all_assertions.len()).collect();
        for candidate in 0..self.num_candidates {
            let candidate = CandidateId(candidate);
            let tree = PruneTreeNode::new(&[], candidate, &all_indices, &all_assertions, self.num_candidates, TreeContinuation::StopImmediately, timeout)?;
            if tree.valid != (candidate == self.winner) {
                return Err(if candidate == self.winner {
                    AuditError::InternalErrorRuledOutWinner
                } else {
                    AuditError::InternalErrorDidntRuleOutLoser
                });
            }
        }
        Ok(())
    }
}

/// An elimination order suffix awaiting expansion, with the cheapest
/// assertion known to rule out every completion of it.
#[derive(Debug)]
struct FrontierEntry {
    /// The suffix under consideration; the first entry is the most recent
    /// prepended elimination.
    pi: EliminationOrderSuffix,
    /// The cheapest assertion found at any ancestor of `pi`, `pi` included.
    best_assertion: AssertionAndDifficulty,
    /// Where that assertion was found: the ancestor made of the last
    /// `best_ancestor_length` entries of `pi`.
    best_ancestor_length: usize,
    /// Set once a dive from this entry has explored the given candidate, so
    /// ordinary expansion does not repeat it.
    dive_done: Option<CandidateId>,
}

impl FrontierEntry {
    /// Higher means more auditing effort needed.
    fn difficulty(&self) -> f64 { self.best_assertion.difficulty }

    fn best_ancestor(&self) -> &[CandidateId] {
        &self.pi[self.pi.len() - self.best_ancestor_length..]
    }

    fn extend_by_candidate<A: AuditModel>(&self, c: CandidateId, ballots: &Ballots, audit: &A, neb_cache: &NebCache) -> FrontierEntry {
        let mut pi = Vec::with_capacity(self.pi.len() + 1);
        pi.push(c);
        pi.extend_from_slice(&self.pi);
        let best_here = find_best_assertion(&pi, ballots, audit, neb_cache);
        let (best_ancestor_length, best_assertion) = if best_here.difficulty < self.difficulty() {
            (pi.len(), best_here)
        } else {
            (self.best_ancestor_length, self.best_assertion.clone())
        };
        FrontierEntry { pi, best_assertion, best_ancestor_length, dive_done: None }
    }

    /// Move this entry's assertion into the result, unless an equal one is
    /// already there, and drop every frontier entry the commit covers.
    fn commit(self, assertions: &mut Vec<AssertionAndDifficulty>, frontier: &mut BinaryHeap<FrontierEntry>) {
        if !assertions.iter().any(|a| a.assertion == self.best_assertion.assertion) {
            let best_ancestor = self.best_ancestor();
            frontier.retain(|entry| !entry.pi.ends_with(best_ancestor));
            assertions.push(self.best_assertion);
        }
    }

    /// A full length suffix has nowhere left to expand: it must be
    /// auditable outright, and its difficulty floors every later commit.
    fn finish_full_suffix(self, assertions: &mut Vec<AssertionAndDifficulty>, frontier: &mut BinaryHeap<FrontierEntry>, lower_bound: &mut f64) -> Result<(), AuditError> {
        if self.difficulty().is_infinite() {
            return Err(AuditError::CouldNotRuleOut(self.pi));
        }
        if *lower_bound < self.difficulty() {
            *lower_bound = self.difficulty();
            log::trace!("Raised lower bound to {} on elimination order {:?}", *lower_bound, self.pi);
        }
        self.commit(assertions, frontier);
        Ok(())
    }
}

// ordering impls so the BinaryHeap pops the hardest suffix first

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.pi == other.pi && self.difficulty() == other.difficulty()
    }
}
impl Eq for FrontierEntry {}
impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // difficulties are never NaN, so this never actually falls back
        self.difficulty().partial_cmp(&other.difficulty()).unwrap_or(Ordering::Equal)
    }
}

/// The cheapest single assertion ruling out every elimination order that
/// ends with `pi`: the best NEB involving its head, or the best NEN that
/// keeps the head alive when exactly the suffix candidates remain.
fn find_best_assertion<A: AuditModel>(pi: &[CandidateId], ballots: &Ballots, audit: &A, neb_cache: &NebCache) -> AssertionAndDifficulty {
    let head = pi[0];
    // a placeholder that anything finite beats
    let mut best = AssertionAndDifficulty {
        assertion: Assertion::NEB(NotEliminatedBefore { winner: head, loser: head }),
        difficulty: f64::INFINITY,
        margin: BallotCount(0),
        status: None,
    };
    if let Some(a) = NotEliminatedBefore::find_best_assertion(head, &pi[1..], ballots, neb_cache) {
        if a.difficulty < best.difficulty { best = a; }
    }
    if let Some(a) = NotEliminatedNext::find_best_difficulty(ballots, audit, pi, head) {
        if a.difficulty < best.difficulty { best = a; }
    }
    best
}

/// Use Michelle Blom's diving optimization: chase each popped suffix down
/// the recorded elimination order before expanding breadth first. Almost
/// always a moderate speedup.
const USE_DIVING: bool = true;

/// Tabulate the contest, then search for the cheapest set of assertions
/// that rules out every elimination order electing anyone but the winner.
pub fn generate_assertions<A: AuditModel>(ballots: &Ballots, claimed_winner: Option<CandidateId>, audit: &A, trim_algorithm: TrimAlgorithm, difficulty_estimate: Option<f64>, timeout: &mut TimeOut) -> Result<AssertionSet, AuditError> {
    if ballots.num_candidates() < 1 { return Err(AuditError::InvalidNumberOfCandidates); }
    log::debug!("Generating assertions for {} candidates over {} distinct rankings", ballots.num_candidates(), ballots.votes.len());
    let tabulation = tabulate(ballots, timeout)?;
    if let Some(claimed) = claimed_winner {
        // any announced winner the tabulation does not unambiguously confirm
        // is wrong, ties included
        if tabulation.possible_winners.len() != 1 || tabulation.possible_winners[0] != claimed {
            return Err(AuditError::WrongWinner(tabulation.possible_winners));
        }
    }
    if tabulation.possible_winners.len() != 1 {
        return Err(AuditError::TiedWinners(tabulation.possible_winners));
    }
    let winner = tabulation.possible_winners[0];
    let time_to_determine_winners = timeout.time_taken();
    log::debug!("Winner {} with elimination order {:?}", winner, tabulation.elimination_order);

    let neb_cache = NebCache::new(ballots, audit);
    let mut assertions: Vec<AssertionAndDifficulty> = vec![];
    let mut lower_bound: f64 = difficulty_estimate.unwrap_or(0.0).max(0.0);
    let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::new();
    for c in 0..ballots.num_candidates() {
        let c = CandidateId(c);
        if c != winner {
            let pi = vec![c];
            let best_assertion = find_best_assertion(&pi, ballots, audit, &neb_cache);
            frontier.push(FrontierEntry { best_ancestor_length: pi.len(), pi, best_assertion, dive_done: None });
        }
    }
    let mut last_logged_difficulty = f64::INFINITY;
    while let Some(mut entry) = frontier.pop() {
        if timeout.quick_check() {
            return Err(AuditError::TimeoutFindingAssertions(entry.difficulty().max(lower_bound)));
        }
        if entry.difficulty() != last_logged_difficulty {
            last_logged_difficulty = entry.difficulty();
            log::trace!("Frontier head difficulty {}{}", last_logged_difficulty, if last_logged_difficulty <= lower_bound { " (within bound)" } else { "" });
        }
        if entry.difficulty() <= lower_bound {
            // nothing cheaper can be hoped for; keep its assertion as is
            entry.commit(&mut assertions, &mut frontier);
            continue;
        }
        if USE_DIVING && entry.dive_done.is_none() {
            debug_assert_eq!(tabulation.elimination_order.len(), ballots.num_candidates() as usize);
            let mut pending: Option<FrontierEntry> = None;
            for &c in tabulation.elimination_order.iter().rev() {
                if entry.pi.contains(&c) { continue; }
                let extended = match pending.take() {
                    // mark the path already taken so it is not re-expanded
                    Some(mut last) => {
                        last.dive_done = Some(c);
                        let extended = last.extend_by_candidate(c, ballots, audit, &neb_cache);
                        frontier.push(last);
                        extended
                    }
                    None => {
                        entry.dive_done = Some(c);
                        entry.extend_by_candidate(c, ballots, audit, &neb_cache)
                    }
                };
                if extended.difficulty() <= lower_bound {
                    extended.commit(&mut assertions, &mut frontier);
                    break;
                }
                pending = Some(extended);
            }
            if let Some(full) = pending {
                debug_assert_eq!(full.pi.len(), ballots.num_candidates() as usize);
                full.finish_full_suffix(&mut assertions, &mut frontier, &mut lower_bound)?;
                if entry.difficulty() <= lower_bound {
                    // the dive raised the bound past this entry
                    entry.commit(&mut assertions, &mut frontier);
                    continue;
                }
            }
        }
        for c in 0..ballots.num_candidates() {
            let c = CandidateId(c);
            if entry.pi.contains(&c) || entry.dive_done == Some(c) { continue; }
            let extended = entry.extend_by_candidate(c, ballots, audit, &neb_cache);
            if extended.pi.len() == ballots.num_candidates() as usize {
                extended.finish_full_suffix(&mut assertions, &mut frontier, &mut lower_bound)?;
            } else {
                frontier.push(extended);
            }
        }
    }
    log::debug!("Generated {} assertions with lower bound {}; trimming", assertions.len(), lower_bound);
    let time_to_find_assertions = timeout.time_taken() - time_to_determine_winners;

    let mut warning_trim_timed_out = false;
    match sort_and_trim(&mut assertions, winner, ballots.num_candidates(), trim_algorithm, timeout) {
        Ok(()) => {}
        Err(AuditError::TimeoutTrimmingAssertions) => { warning_trim_timed_out = true; }
        Err(e) => return Err(e),
    }
    let time_to_trim_assertions = timeout.time_taken() - time_to_determine_winners - time_to_find_assertions;
    log::debug!("{} assertions after trimming", assertions.len());

    let difficulty = assertions.iter().map(|a| a.difficulty).fold(0.0, f64::max);
    let margin = assertions.iter().map(|a| a.margin).min().unwrap_or(BallotCount(0));
    Ok(AssertionSet {
        assertions,
        difficulty,
        margin,
        winner,
        num_candidates: ballots.num_candidates(),
        time_to_determine_winners,
        time_to_find_assertions,
        time_to_trim_assertions,
        warning_trim_timed_out,
    })
}
