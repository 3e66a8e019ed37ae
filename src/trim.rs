// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! Working out which of the generated assertions are actually needed.
//!
//! The search can emit redundant assertions: one assertion is found to cut
//! off some elimination order, and an assertion added later for a different
//! order happens to cut off the first one too. Which redundancy to remove
//! depends on what the auditor wants small: the number of assertions, or the
//! tree of eliminated orders a human has to walk to convince themselves.

use std::cmp::Ordering;
use serde::Deserialize;
use serde::Serialize;
use crate::assertions::{Assertion, AssertionAndDifficulty, SuffixEffect};
use crate::ballots::CandidateId;
use crate::timeout::TimeOut;
use crate::AuditError;

/// What to minimize when removing redundant assertions.
///
/// In the simple contest worked through in "A Guide to RAIRE" the search
/// emits six assertions, one of which (Alice beats Diego when only the two
/// of them remain) is implied elsewhere: every order it cuts is also cut by
/// some other assertion, just deeper in the tree. `MinimizeAssertions`
/// removes it; `MinimizeTree` (and `None`) keeps it, because without it the
/// tree a human must check grows. A larger assertion set has a slightly
/// higher chance of forcing an escalation, a larger tree takes longer to
/// verify; neither choice dominates, so both are offered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum TrimAlgorithm {
    /// Keep everything the search produced, canonically sorted.
    None,
    /// Stop expanding a branch at the first assertion that prunes it.
    /// Smallest tree to verify, possibly some unnecessary assertions.
    MinimizeTree,
    /// Keep expanding pruned branches to see whether their descendants are
    /// cut anyway. Fewest assertions, possibly a larger tree.
    MinimizeAssertions,
}

/// How far to keep descending once some assertion already prunes a node.
#[derive(Copy, Clone, Debug)]
pub enum TreeContinuation {
    /// Not at all; the tree stays as small as possible.
    StopImmediately,
    /// One extra level, whose children then stop immediately.
    ContinueOnce,
    /// Until no unresolved assertion is left.
    Forever,
    /// Like `Forever`, except stop wherever an NEB prunes. NEBs are almost
    /// never redundant in practice but their subtrees are huge.
    StopOnNEB,
}

impl TreeContinuation {
    fn descend_through_pruned(self, pruned_by_neb: bool) -> bool {
        match self {
            TreeContinuation::StopImmediately => false,
            TreeContinuation::StopOnNEB => !pruned_by_neb,
            _ => true,
        }
    }
    fn after_pruned(self) -> Self {
        match self {
            TreeContinuation::ContinueOnce => TreeContinuation::StopImmediately,
            other => other,
        }
    }
}

/// A node in the tree of reverse elimination orders rooted at one
/// non-winning candidate, labelled with the assertions that rule it out.
pub struct PruneTreeNode {
    /// The candidate whose elimination this node prepends.
    pub candidate: CandidateId,
    /// The path from here back to the root, this node's candidate first.
    pub elimination_order_suffix: Vec<CandidateId>,
    /// Indices (into the full assertion list) of assertions contradicting
    /// this suffix.
    pub pruning_assertions: Vec<usize>,
    pub children: Vec<PruneTreeNode>,
    /// True if this node or some descendant is ruled out by nothing.
    pub valid: bool,
}

impl PruneTreeNode {
    pub fn new(parent_suffix: &[CandidateId], candidate: CandidateId, relevant_assertions: &[usize], all_assertions: &[Assertion], num_candidates: u32, continuation: TreeContinuation, timeout: &mut TimeOut) -> Result<PruneTreeNode, AuditError> {
        if timeout.quick_check() { return Err(AuditError::TimeoutTrimmingAssertions); }
        let mut suffix = vec![candidate];
        suffix.extend_from_slice(parent_suffix);
        let mut pruning_assertions: Vec<usize> = vec![];
        let mut still_relevant: Vec<usize> = vec![];
        for &index in relevant_assertions {
            match all_assertions[index].effect(&suffix) {
                SuffixEffect::Contradiction => pruning_assertions.push(index),
                SuffixEffect::Ok => {} // resolved; drop it from the children
                SuffixEffect::NeedsMoreDetail => still_relevant.push(index),
            }
        }
        let mut children: Vec<PruneTreeNode> = vec![];
        let mut valid = pruning_assertions.is_empty() && still_relevant.is_empty();
        let pruned_by_neb = pruning_assertions.iter().any(|&i| all_assertions[i].is_neb());
        if (pruning_assertions.is_empty() || continuation.descend_through_pruned(pruned_by_neb)) && !still_relevant.is_empty() {
            let child_continuation = if pruning_assertions.is_empty() { continuation } else { continuation.after_pruned() };
            for c in 0..num_candidates {
                let c = CandidateId(c);
                if suffix.contains(&c) { continue; }
                let child = PruneTreeNode::new(&suffix, c, &still_relevant, all_assertions, num_candidates, child_continuation, timeout)?;
                if child.valid {
                    if pruning_assertions.is_empty() {
                        valid = true;
                    } else {
                        // this node is already pruned; a surviving child just
                        // means the extra descent bought nothing, so the node
                        // stands on its own assertions
                        children.clear();
                        break;
                    }
                }
                children.push(child);
            }
        }
        Ok(PruneTreeNode { candidate, elimination_order_suffix: suffix, pruning_assertions, children, valid })
    }
}

fn canonical_order(a: &Assertion, b: &Assertion) -> Ordering {
    match (a, b) {
        (Assertion::NEB(_), Assertion::NEN(_)) => Ordering::Less,
        (Assertion::NEN(_), Assertion::NEB(_)) => Ordering::Greater,
        (Assertion::NEB(a), Assertion::NEB(b)) => {
            a.winner.0.cmp(&b.winner.0).then_with(|| a.loser.0.cmp(&b.loser.0))
        }
        (Assertion::NEN(a), Assertion::NEN(b)) => {
            a.continuing.len().cmp(&b.continuing.len())
                .then_with(|| a.winner.0.cmp(&b.winner.0))
                .then_with(|| a.loser.0.cmp(&b.loser.0))
                .then_with(|| a.continuing.iter().map(|c| c.0).cmp(b.continuing.iter().map(|c| c.0)))
        }
    }
}

/// Sort the assertions canonically (NEBs first, then by field order) and
/// drop the ones nothing depends on.
///
/// If a timeout fires during trimming the assertion list is left sorted but
/// otherwise unchanged, so the caller can still use it.
pub fn sort_and_trim(assertions: &mut Vec<AssertionAndDifficulty>, winner: CandidateId, num_candidates: u32, trim_algorithm: TrimAlgorithm, timeout: &mut TimeOut) -> Result<(), AuditError> {
    assertions.sort_unstable_by(|a, b| canonical_order(&a.assertion, &b.assertion));
    let continuation = match trim_algorithm {
        TrimAlgorithm::None => return Ok(()),
        TrimAlgorithm::MinimizeTree => TreeContinuation::StopImmediately,
        TrimAlgorithm::MinimizeAssertions => TreeContinuation::StopOnNEB,
    };
    let all_assertions: Vec<Assertion> = assertions.iter().map(|ad| ad.assertion.clone()).collect();
    let all_indices: Vec<usize> = (0..all_assertions.len()).collect();
    let mut usage = UsageTracker::new(all_assertions.len());
    let mut trees = vec![];
    for candidate in 0..num_candidates {
        let candidate = CandidateId(candidate);
        // the winner's own tree proves nothing about the losers and is by
        // far the most expensive one to build, so it is skipped here; the
        // result can still be checked with verify_result_does_prove_winner
        if candidate == winner { continue; }
        let tree = PruneTreeNode::new(&[], candidate, &all_indices, &all_assertions, num_candidates, continuation, timeout)?;
        if tree.valid { return Err(AuditError::InternalErrorDidntRuleOutLoser); }
        usage.mark_forced(&tree);
        trees.push(tree);
    }
    for tree in &trees {
        usage.mark_sufficient(tree, timeout)?;
    }
    let mut kept = vec![];
    for (index, a) in assertions.drain(..).enumerate() {
        if usage.is_used(index) { kept.push(a); }
    }
    *assertions = kept;
    Ok(())
}

/// A two pass heuristic for choosing which assertions to keep. The general
/// problem is a set cover; the heuristic first takes every assertion some
/// node leaves no choice about, then walks again taking the first option
/// wherever the forced picks have not already settled a node. Not provably
/// minimal, but fast, and it has been minimal on every contest tried.
struct UsageTracker {
    used: Vec<bool>,
}

impl UsageTracker {
    fn new(len: usize) -> Self { UsageTracker { used: vec![false; len] } }

    fn is_used(&self, index: usize) -> bool { self.used[index] }

    /// First pass: a node with exactly one pruning assertion and no
    /// children below it leaves no choice.
    fn mark_forced(&mut self, node: &PruneTreeNode) {
        if !node.pruning_assertions.is_empty() {
            if node.children.is_empty() && node.pruning_assertions.len() == 1 {
                self.used[node.pruning_assertions[0]] = true;
            }
        } else {
            for child in &node.children {
                self.mark_forced(child);
            }
        }
    }

    /// Whether a node is already dealt with: one of its pruning assertions
    /// is kept, or every child recursively is.
    fn already_eliminated(&self, node: &PruneTreeNode) -> bool {
        node.pruning_assertions.iter().any(|&i| self.used[i])
            || (!node.children.is_empty() && node.children.iter().all(|c| self.already_eliminated(c)))
    }

    /// Second pass: wherever the forced picks do not already rule a node
    /// out, arbitrarily keep the first option.
    fn mark_sufficient(&mut self, node: &PruneTreeNode, timeout: &mut TimeOut) -> Result<(), AuditError> {
        if timeout.quick_check() { return Err(AuditError::TimeoutTrimmingAssertions); }
        if !node.pruning_assertions.is_empty() {
            if !self.already_eliminated(node) {
                self.used[node.pruning_assertions[0]] = true;
            }
        } else {
            for child in &node.children {
                self.mark_sufficient(child, timeout)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::assertions::{Assertion, NotEliminatedBefore, NotEliminatedNext};
    use crate::ballots::CandidateId;
    use crate::timeout::TimeOut;
    use crate::trim::{PruneTreeNode, TreeContinuation};

    /// The six assertions listed in "A Guide to RAIRE" for its worked
    /// example: winner Chuan (2), with Alice (0), Bob (1) and Diego (3).
    fn guide_assertions() -> Vec<Assertion> {
        let c = |i: u32| CandidateId(i);
        vec![
            Assertion::NEN(NotEliminatedNext { winner: c(0), loser: c(1), continuing: vec![c(0), c(1), c(2), c(3)] }),
            Assertion::NEN(NotEliminatedNext { winner: c(0), loser: c(3), continuing: vec![c(0), c(2), c(3)] }),
            Assertion::NEN(NotEliminatedNext { winner: c(2), loser: c(0), continuing: vec![c(0), c(2)] }),
            Assertion::NEN(NotEliminatedNext { winner: c(2), loser: c(3), continuing: vec![c(0), c(2), c(3)] }),
            Assertion::NEB(NotEliminatedBefore { winner: c(2), loser: c(1) }),
            Assertion::NEN(NotEliminatedNext { winner: c(0), loser: c(3), continuing: vec![c(0), c(3)] }),
        ]
    }

    #[test]
    fn guide_pruning_trees() {
        let all = guide_assertions();
        let relevant: Vec<usize> = (0..all.len()).collect();
        let mut timeout = TimeOut::new(Some(1000), None);
        let mut timeout_instantly = TimeOut::new(Some(1), None);
        assert!(PruneTreeNode::new(&[], CandidateId(0), &relevant, &all, 4, TreeContinuation::StopImmediately, &mut timeout_instantly).is_err());
        let tree0 = PruneTreeNode::new(&[], CandidateId(0), &relevant, &all, 4, TreeContinuation::StopImmediately, &mut timeout).unwrap();
        let tree1 = PruneTreeNode::new(&[], CandidateId(1), &relevant, &all, 4, TreeContinuation::StopImmediately, &mut timeout).unwrap();
        let tree2 = PruneTreeNode::new(&[], CandidateId(2), &relevant, &all, 4, TreeContinuation::StopImmediately, &mut timeout).unwrap();
        let tree3 = PruneTreeNode::new(&[], CandidateId(3), &relevant, &all, 4, TreeContinuation::StopImmediately, &mut timeout).unwrap();
        // Alice cannot be the first eliminated of the last remaining field
        assert_eq!(false, tree0.valid);
        assert_eq!(3, tree0.children.len());
        assert_eq!(vec![4], tree0.children[0].pruning_assertions);
        assert_eq!(vec![2], tree0.children[1].pruning_assertions);
        assert_eq!(0, tree0.children[2].pruning_assertions.len());
        assert_eq!(2, tree0.children[2].children.len());
        assert_eq!(vec![4], tree0.children[2].children[0].pruning_assertions);
        assert_eq!(vec![3], tree0.children[2].children[1].pruning_assertions);
        assert_eq!(vec![CandidateId(3), CandidateId(0)], tree0.children[2].elimination_order_suffix);
        // Bob is cut off at the root by the NEB
        assert_eq!(false, tree1.valid);
        assert_eq!(vec![4], tree1.pruning_assertions);
        // Chuan actually won
        assert_eq!(true, tree2.valid);
        // Diego
        assert_eq!(false, tree3.valid);
        assert_eq!(3, tree3.children.len());
        assert_eq!(vec![5], tree3.children[0].pruning_assertions);
        assert_eq!(vec![4], tree3.children[1].pruning_assertions);
        assert_eq!(0, tree3.children[2].pruning_assertions.len());
        assert_eq!(2, tree3.children[2].children.len());
        assert_eq!(vec![1], tree3.children[2].children[0].pruning_assertions);
        assert_eq!(0, tree3.children[2].children[1].pruning_assertions.len());
        assert_eq!(vec![0], tree3.children[2].children[1].children[0].pruning_assertions);
    }
}
