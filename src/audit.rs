// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

//! Models of how much auditing effort a comparison of two tallies needs.

use serde::Deserialize;
use serde::Serialize;
use crate::ballots::BallotCount;

/// An audit model maps a pair of asserted tallies to a difficulty: higher
/// means more auditing effort, infinite means unauditable. The number is
/// often an expected sample size, but the search only relies on it being
/// monotonically decreasing in the margin.
pub trait AuditModel {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64;
}

/// A BRAVO ballot polling audit as described in the original paper.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BallotPollingBravo {
    /// The desired confidence α, strictly between 0 and 1, bounding the
    /// probability of not rejecting a false result.
    pub confidence: f64,
    pub total_auditable_ballots: BallotCount,
}

impl AuditModel for BallotPollingBravo {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64 {
        if lowest_tally_winner <= highest_tally_loser { return f64::INFINITY; }
        let w = lowest_tally_winner.0 as f64;
        let l = highest_tally_loser.0 as f64;
        let s = w / (w + l);
        let ln2s = (2.0 * s).ln();
        let numerator = 0.5 * ln2s - self.confidence.ln();
        let denominator = (w * ln2s + l * (2.0 - 2.0 * s).ln()) / self.total_auditable_ballots.0 as f64;
        numerator / denominator
    }
}

/// A MACRO ballot level comparison audit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BallotComparisonMacro {
    /// The desired confidence α, strictly between 0 and 1.
    pub confidence: f64,
    /// γ ≥ 1
    pub error_inflation_factor: f64,
    pub total_auditable_ballots: BallotCount,
}

impl AuditModel for BallotComparisonMacro {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64 {
        if lowest_tally_winner <= highest_tally_loser { return f64::INFINITY; }
        let margin = (lowest_tally_winner - highest_tally_loser).0 as f64;
        let u = 2.0 * self.error_inflation_factor * self.total_auditable_ballots.0 as f64 / margin;
        -self.confidence.ln() * u
    }
}

/// Difficulty = 1 / diluted margin. Useful for ballot comparison audits.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OneOnDilutedMargin {
    pub total_auditable_ballots: BallotCount,
}

impl AuditModel for OneOnDilutedMargin {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64 {
        if lowest_tally_winner <= highest_tally_loser { return f64::INFINITY; }
        self.total_auditable_ballots.0 as f64 / (lowest_tally_winner - highest_tally_loser).0 as f64
    }
}

/// Difficulty = 1 / diluted margin². Useful for ballot polling audits.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OneOnDilutedMarginSquared {
    pub total_auditable_ballots: BallotCount,
}

impl AuditModel for OneOnDilutedMarginSquared {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64 {
        if lowest_tally_winner <= highest_tally_loser { return f64::INFINITY; }
        let reciprocal = self.total_auditable_ballots.0 as f64 / (lowest_tally_winner - highest_tally_loser).0 as f64;
        reciprocal * reciprocal
    }
}

/// The audit models a problem may ask for.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Audit {
    BRAVO(BallotPollingBravo),
    MACRO(BallotComparisonMacro),
    OneOnMargin(OneOnDilutedMargin),
    OneOnMarginSquared(OneOnDilutedMarginSquared),
}

impl AuditModel for Audit {
    fn difficulty(&self, lowest_tally_winner: BallotCount, highest_tally_loser: BallotCount) -> f64 {
        match self {
            Audit::BRAVO(audit) => audit.difficulty(lowest_tally_winner, highest_tally_loser),
            Audit::MACRO(audit) => audit.difficulty(lowest_tally_winner, highest_tally_loser),
            Audit::OneOnMargin(audit) => audit.difficulty(lowest_tally_winner, highest_tally_loser),
            Audit::OneOnMarginSquared(audit) => audit.difficulty(lowest_tally_winner, highest_tally_loser),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_outpolled_winner_is_unauditable() {
        let audit = Audit::OneOnMargin(OneOnDilutedMargin { total_auditable_ballots: BallotCount(100) });
        assert!(audit.difficulty(BallotCount(10), BallotCount(10)).is_infinite());
        assert!(audit.difficulty(BallotCount(9), BallotCount(10)).is_infinite());
    }

    #[test]
    fn margin_based_difficulties() {
        let linear = OneOnDilutedMargin { total_auditable_ballots: BallotCount(13500) };
        assert_eq!(3.375, linear.difficulty(BallotCount(5000), BallotCount(1000)));
        let squared = OneOnDilutedMarginSquared { total_auditable_ballots: BallotCount(13500) };
        assert_eq!(3.375 * 3.375, squared.difficulty(BallotCount(5000), BallotCount(1000)));
    }

    #[test]
    fn sample_size_difficulties_match_the_paper() {
        let bravo = BallotPollingBravo { confidence: 0.05, total_auditable_ballots: BallotCount(21999) };
        assert!((bravo.difficulty(BallotCount(10000), BallotCount(6000)) - 135.3).abs() < 0.1);
        let comparison = BallotComparisonMacro { confidence: 0.05, error_inflation_factor: 1.1, total_auditable_ballots: BallotCount(21999) };
        assert!((comparison.difficulty(BallotCount(10000), BallotCount(6000)) - 36.2).abs() < 0.1);
    }
}
