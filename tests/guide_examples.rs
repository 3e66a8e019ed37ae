// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! Test the worked example in "A Guide to RAIRE", chapter 6.

use serde_json::json;
use irv_rla::assertions::{Assertion, NotEliminatedBefore, NotEliminatedNext};
use irv_rla::audit::{Audit, OneOnDilutedMargin};
use irv_rla::ballots::{BallotCount, Ballots, CandidateId, Vote};
use irv_rla::search::generate_assertions;
use irv_rla::tabulation::tabulate;
use irv_rla::timeout::TimeOut;
use irv_rla::trim::{sort_and_trim, TrimAlgorithm};
use irv_rla::{AuditProblem, AuditSolution};

const A: CandidateId = CandidateId(0); // Alice
const B: CandidateId = CandidateId(1); // Bob
const C: CandidateId = CandidateId(2); // Chuan
const D: CandidateId = CandidateId(3); // Diego

/// The votes in the guide's example 10, used throughout its chapter 6.
fn guide_votes() -> Vec<Vote> {
    vec![
        Vote { n: BallotCount(5000), prefs: vec![C, B, A] },
        Vote { n: BallotCount(1000), prefs: vec![B, C, D] },
        Vote { n: BallotCount(1500), prefs: vec![D, A] },
        Vote { n: BallotCount(4000), prefs: vec![A, D] },
        Vote { n: BallotCount(2000), prefs: vec![D] },
    ]
}

fn guide_ballots() -> Ballots {
    Ballots::new(guide_votes(), 4).unwrap()
}

/// The audit model used in the guide's examples.
const AUDIT: OneOnDilutedMargin = OneOnDilutedMargin { total_auditable_ballots: BallotCount(13500) };

fn guide_problem(trim_algorithm: TrimAlgorithm) -> AuditProblem {
    AuditProblem {
        metadata: json!({"candidates": ["Alice", "Bob", "Chuan", "Diego"]}),
        num_candidates: 4,
        votes: guide_votes(),
        winner: Some(C),
        audit: Audit::OneOnMargin(AUDIT),
        trim_algorithm: Some(trim_algorithm),
        difficulty_estimate: None,
        time_limit_seconds: None,
    }
}

#[test]
/// Check the tallies and the tabulation of the guide's contest.
fn test_votes_structure() {
    let ballots = guide_ballots();
    assert_eq!(AUDIT.total_auditable_ballots, ballots.total_votes());
    assert_eq!(BallotCount(4000), ballots.first_preference_tally(A));
    assert_eq!(BallotCount(1000), ballots.first_preference_tally(B));
    assert_eq!(BallotCount(5000), ballots.first_preference_tally(C));
    assert_eq!(BallotCount(3500), ballots.first_preference_tally(D));
    assert_eq!(vec![BallotCount(4000), BallotCount(6000), BallotCount(3500)], ballots.restricted_tallies(&[A, C, D]));
    assert_eq!(vec![BallotCount(5500), BallotCount(6000)], ballots.restricted_tallies(&[A, C]));
    let outcome = tabulate(&ballots, &mut TimeOut::never()).unwrap();
    assert_eq!(vec![C], outcome.possible_winners);
    assert_eq!(vec![B, D, A, C], outcome.elimination_order);
}

#[test]
/// The NEB assertions of table 6.1: who can never catch up to whom.
fn test_neb_assertions() {
    let ballots = guide_ballots();
    let test_neb = |winner: CandidateId, loser: CandidateId| {
        NotEliminatedBefore { winner, loser }.difficulty(&ballots, &AUDIT)
    };
    assert!(test_neb(B, A).difficulty.is_infinite());
    assert!(test_neb(C, A).difficulty.is_infinite());
    assert!(test_neb(D, A).difficulty.is_infinite());
    assert!(test_neb(A, B).difficulty.is_infinite());
    assert!((test_neb(C, B).difficulty - 3.375).abs() < 0.001);
    assert_eq!(BallotCount(4000), test_neb(C, B).margin);
    assert!(test_neb(D, B).difficulty.is_infinite());
    assert!(test_neb(A, D).difficulty.is_infinite());
    assert!(test_neb(B, D).difficulty.is_infinite());
    assert!(test_neb(C, D).difficulty.is_infinite());
}

/// The retained assertions when minimizing the number of assertions, in
/// canonical order.
fn expected_when_minimizing_assertions() -> Vec<Assertion> {
    vec![
        Assertion::NEB(NotEliminatedBefore { winner: C, loser: B }),
        Assertion::NEN(NotEliminatedNext { winner: C, loser: A, continuing: vec![A, C] }),
        Assertion::NEN(NotEliminatedNext { winner: A, loser: D, continuing: vec![A, C, D] }),
        Assertion::NEN(NotEliminatedNext { winner: C, loser: D, continuing: vec![A, C, D] }),
        Assertion::NEN(NotEliminatedNext { winner: A, loser: B, continuing: vec![A, B, C, D] }),
    ]
}

/// The retained assertions when minimizing the tree: one more, ruling out
/// Diego surviving to the final two directly.
fn expected_when_minimizing_tree() -> Vec<Assertion> {
    vec![
        Assertion::NEB(NotEliminatedBefore { winner: C, loser: B }),
        Assertion::NEN(NotEliminatedNext { winner: A, loser: D, continuing: vec![A, D] }),
        Assertion::NEN(NotEliminatedNext { winner: C, loser: A, continuing: vec![A, C] }),
        Assertion::NEN(NotEliminatedNext { winner: A, loser: D, continuing: vec![A, C, D] }),
        Assertion::NEN(NotEliminatedNext { winner: C, loser: D, continuing: vec![A, C, D] }),
        Assertion::NEN(NotEliminatedNext { winner: A, loser: B, continuing: vec![A, B, C, D] }),
    ]
}

#[test]
/// Generate and trim, minimizing the number of assertions.
fn test_minimize_assertions() {
    let solution = guide_problem(TrimAlgorithm::MinimizeAssertions).solve();
    let result = solution.solution.unwrap();
    assert_eq!(C, result.winner);
    assert_eq!(5, result.assertions.len());
    assert_eq!(27.0, result.difficulty);
    assert_eq!(BallotCount(500), result.margin);
    let got: Vec<Assertion> = result.assertions.iter().map(|ad| ad.assertion.clone()).collect();
    assert_eq!(expected_when_minimizing_assertions(), got);
    result.verify_result_does_prove_winner(&mut TimeOut::never()).unwrap();
}

#[test]
/// Generate and trim, minimizing the size of the tree to verify.
fn test_minimize_tree() {
    let solution = guide_problem(TrimAlgorithm::MinimizeTree).solve();
    let result = solution.solution.unwrap();
    assert_eq!(C, result.winner);
    assert_eq!(6, result.assertions.len());
    assert_eq!(27.0, result.difficulty);
    assert_eq!(BallotCount(500), result.margin);
    let got: Vec<Assertion> = result.assertions.iter().map(|ad| ad.assertion.clone()).collect();
    assert_eq!(expected_when_minimizing_tree(), got);
    result.verify_result_does_prove_winner(&mut TimeOut::never()).unwrap();
    let allowed = result.allowed_elimination_orders();
    assert_ne!(0, allowed.len());
    for order in allowed {
        assert_eq!(Some(&C), order.last());
    }
}

#[test]
/// The minimax bookkeeping: difficulty is the max over the retained
/// assertions and margin the min, and no assertion appears twice.
fn test_minimax_and_no_duplicates() {
    let result = guide_problem(TrimAlgorithm::MinimizeTree).solve().solution.unwrap();
    let max_difficulty = result.assertions.iter().map(|a| a.difficulty).fold(0.0, f64::max);
    let min_margin = result.assertions.iter().map(|a| a.margin).min().unwrap();
    assert_eq!(result.difficulty, max_difficulty);
    assert_eq!(result.margin, min_margin);
    for (i, a) in result.assertions.iter().enumerate() {
        for b in &result.assertions[i + 1..] {
            assert_ne!(a.assertion, b.assertion);
        }
    }
}

#[test]
/// Solving with no claimed winner gives the same answer as solving with the
/// correct claimed winner.
fn test_winner_agreement() {
    let mut unclaimed = guide_problem(TrimAlgorithm::MinimizeAssertions);
    unclaimed.winner = None;
    let with_claim = guide_problem(TrimAlgorithm::MinimizeAssertions).solve().solution.unwrap();
    let without_claim = unclaimed.solve().solution.unwrap();
    assert_eq!(with_claim.winner, without_claim.winner);
    assert_eq!(with_claim.difficulty, without_claim.difficulty);
    assert_eq!(with_claim.margin, without_claim.margin);
    assert_eq!(with_claim.assertions, without_claim.assertions);
}

#[test]
/// Trimming an already trimmed set changes nothing.
fn test_trim_is_idempotent() {
    for trim_algorithm in [TrimAlgorithm::MinimizeTree, TrimAlgorithm::MinimizeAssertions] {
        let result = guide_problem(trim_algorithm).solve().solution.unwrap();
        let mut again = result.assertions.clone();
        sort_and_trim(&mut again, result.winner, result.num_candidates, trim_algorithm, &mut TimeOut::never()).unwrap();
        assert_eq!(result.assertions, again);
    }
}

#[test]
/// Problems and solutions survive a trip through JSON unchanged.
fn test_serialization_round_trip() {
    let problem = guide_problem(TrimAlgorithm::MinimizeAssertions);
    let problem_json = serde_json::to_string(&problem).unwrap();
    let reparsed: AuditProblem = serde_json::from_str(&problem_json).unwrap();
    assert_eq!(serde_json::to_value(&problem).unwrap(), serde_json::to_value(&reparsed).unwrap());
    let solution = reparsed.solve();
    let solution_json = serde_json::to_string(&solution).unwrap();
    let reparsed_solution: AuditSolution = serde_json::from_str(&solution_json).unwrap();
    assert_eq!(serde_json::to_value(&solution).unwrap(), serde_json::to_value(&reparsed_solution).unwrap());
}

#[test]
/// The JSON surface: internally tagged assertions, ascending continuing
/// sets, and a problem written out by hand parses and solves.
fn test_json_surface() {
    let text = r#"{
        "metadata": {"candidates": ["Alice", "Bob", "Chuan", "Diego"]},
        "num_candidates": 4,
        "votes": [
            {"n": 5000, "prefs": [2, 1, 0]},
            {"n": 1000, "prefs": [1, 2, 3]},
            {"n": 1500, "prefs": [3, 0]},
            {"n": 4000, "prefs": [0, 3]},
            {"n": 2000, "prefs": [3]}
        ],
        "winner": 2,
        "audit": {"type": "OneOnMargin", "total_auditable_ballots": 13500},
        "trim_algorithm": "MinimizeAssertions"
    }"#;
    let problem: AuditProblem = serde_json::from_str(text).unwrap();
    let result = problem.solve().solution.unwrap();
    assert_eq!(5, result.assertions.len());
    assert_eq!(27.0, result.difficulty);
    let first = serde_json::to_value(&result.assertions[0]).unwrap();
    assert_eq!("NEB", first["assertion"]["type"]);
    assert_eq!(2, first["assertion"]["winner"]);
    assert_eq!(1, first["assertion"]["loser"]);
    let last = serde_json::to_value(&result.assertions[4]).unwrap();
    assert_eq!("NEN", last["assertion"]["type"]);
    assert_eq!(serde_json::json!([0, 1, 2, 3]), last["assertion"]["continuing"]);
}

#[test]
/// A generous difficulty estimate speeds the search up at the cost of a
/// worse, but still sufficient, assertion set.
fn test_difficulty_estimate_still_sufficient() {
    let ballots = guide_ballots();
    let result = generate_assertions(&ballots, Some(C), &AUDIT, TrimAlgorithm::MinimizeTree, Some(30.0), &mut TimeOut::never()).unwrap();
    assert!(result.difficulty <= 30.0);
    result.verify_result_does_prove_winner(&mut TimeOut::never()).unwrap();
}
