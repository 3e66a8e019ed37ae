// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! IRV tabulation that explores every way the ties could have been broken.

use std::collections::{HashMap, HashSet};
use crate::ballots::{Ballots, CandidateId};
use crate::timeout::TimeOut;
use crate::AuditError;

/// Who could have won, and one concrete order of elimination.
pub struct TabulationOutcome {
    /// Every candidate who wins under some resolution of ties. Tie
    /// resolution legislation may exist, but an election whose winner turns
    /// on it is not stochastically auditable anyway.
    pub possible_winners: Vec<CandidateId>,
    /// The eliminations along the first fully explored path, winner last.
    pub elimination_order: Vec<CandidateId>,
}

/// Run the contest. The only possible error is `TimeoutCheckingWinner`.
pub fn tabulate(ballots: &Ballots, timeout: &mut TimeOut) -> Result<TabulationOutcome, AuditError> {
    let mut search = TieSearch { memo: HashMap::new(), elimination_order: vec![] };
    let everyone: Vec<CandidateId> = (0..ballots.num_candidates()).map(CandidateId).collect();
    let possible_winners = search.possible_winners(everyone, ballots, timeout)?;
    Ok(TabulationOutcome { possible_winners, elimination_order: search.elimination_order })
}

struct TieSearch {
    /// Key: continuing candidates in ascending order. Value: who can still
    /// win from that position. Equivalent states are reachable along many
    /// tie branches, so memoization matters.
    memo: HashMap<Vec<CandidateId>, Vec<CandidateId>>,
    elimination_order: Vec<CandidateId>,
}

impl TieSearch {
    fn possible_winners(&mut self, continuing: Vec<CandidateId>, ballots: &Ballots, timeout: &mut TimeOut) -> Result<Vec<CandidateId>, AuditError> {
        if timeout.quick_check() { return Err(AuditError::TimeoutCheckingWinner); }
        if continuing.len() == 1 {
            if self.on_first_path(ballots, continuing.len()) {
                self.elimination_order.push(continuing[0]);
            }
            return Ok(continuing);
        }
        if let Some(known) = self.memo.get(&continuing) {
            return Ok(known.clone());
        }
        let tallies = ballots.restricted_tallies(&continuing);
        let lowest = *tallies.iter().min().unwrap();
        let mut winners: HashSet<CandidateId> = HashSet::new();
        for i in 0..continuing.len() {
            if tallies[i] == lowest {
                // every candidate on the lowest tally is a plausible next
                // elimination; try each of them
                if self.on_first_path(ballots, continuing.len()) {
                    self.elimination_order.push(continuing[i]);
                }
                let mut rest = continuing[..i].to_vec();
                rest.extend_from_slice(&continuing[i + 1..]);
                for w in self.possible_winners(rest, ballots, timeout)? {
                    winners.insert(w);
                }
            }
        }
        let winners: Vec<CandidateId> = winners.into_iter().collect();
        self.memo.insert(continuing, winners.clone());
        Ok(winners)
    }

    /// True while still on the path of the first depth first traversal of
    /// the tree of elimination orders; the gate below holds exactly there,
    /// so only that one complete trace gets recorded.
    fn on_first_path(&self, ballots: &Ballots, num_continuing: usize) -> bool {
        self.elimination_order.len() + num_continuing == ballots.num_candidates() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballots::{BallotCount, Vote};

    fn ballots(votes: &[(usize, &[u32])], num_candidates: usize) -> Ballots {
        let votes = votes
            .iter()
            .map(|&(n, prefs)| Vote { n: BallotCount(n), prefs: prefs.iter().map(|&c| CandidateId(c)).collect() })
            .collect();
        Ballots::new(votes, num_candidates).unwrap()
    }

    #[test]
    fn ties_are_explored_both_ways() {
        // candidates 0 and 1 tie for elimination; whoever stays inherits
        // the other's ballots and beats candidate 2
        let b = ballots(&[(2, &[0, 1]), (2, &[1, 0]), (3, &[2])], 3);
        let outcome = tabulate(&b, &mut TimeOut::never()).unwrap();
        let mut winners = outcome.possible_winners.clone();
        winners.sort_unstable_by_key(|c| c.0);
        assert_eq!(vec![CandidateId(0), CandidateId(1)], winners);
        // only the first depth first trace is recorded: candidate 0 out
        // first, then 2 loses to the strengthened candidate 1
        assert_eq!(vec![CandidateId(0), CandidateId(2), CandidateId(1)], outcome.elimination_order);
    }

    #[test]
    fn ties_that_cannot_change_the_winner_are_harmless() {
        let b = ballots(&[(1, &[0]), (1, &[1]), (5, &[2])], 3);
        let outcome = tabulate(&b, &mut TimeOut::never()).unwrap();
        assert_eq!(vec![CandidateId(2)], outcome.possible_winners);
    }

    #[test]
    fn timeout_while_tabulating_is_reported() {
        let b = ballots(&[(1, &[0]), (2, &[1]), (4, &[2])], 3);
        let mut timeout = TimeOut::new(Some(2), None);
        assert!(matches!(tabulate(&b, &mut timeout), Err(AuditError::TimeoutCheckingWinner)));
    }
}
