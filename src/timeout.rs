// Copyright 2023 Andrew Conway.
// Based on software (c) Michelle Blom in C++ https://github.com/michelleblom/audit-irv-cp/tree/raire-branch
// documented in https://arxiv.org/pdf/1903.08804.pdf
//
// This file is part of irv-rla.
// irv-rla is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// irv-rla is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with irv-rla.  If not, see <https://www.gnu.org/licenses/>.

use std::ops::Sub;
use std::time::{Duration, Instant};
use serde::Deserialize;
use serde::Serialize;

/// A check that an algorithm is not taking too long, measured in either
/// wall clock time or abstract units of work done.
///
/// Returning `true` from [`TimeOut::quick_check`] obliges the caller to stop
/// promptly and surface the typed timeout error for its stage.
pub struct TimeOut {
    start_time: Instant,
    work_done: u64,
    work_limit: Option<u64>,
    duration_limit: Option<Duration>,
}

impl TimeOut {
    pub fn new(work_limit: Option<u64>, duration_limit: Option<Duration>) -> Self {
        TimeOut { start_time: Instant::now(), work_done: 0, work_limit, duration_limit }
    }

    /// A timer that never goes off.
    pub fn never() -> Self { Self::new(None, None) }

    pub fn clock_time_taken_since_start(&self) -> Duration { self.start_time.elapsed() }

    pub fn work_done(&self) -> u64 { self.work_done }

    pub fn time_taken(&self) -> TimeTaken {
        TimeTaken { work: self.work_done, seconds: self.clock_time_taken_since_start().as_secs_f64() }
    }

    /// Increment the work counter by one and see whether a limit has been hit.
    /// The work quota is tested every call; the clock only every hundredth call,
    /// as `Instant::now` is not free.
    pub fn quick_check(&mut self) -> bool {
        self.work_done += 1;
        if let Some(work_limit) = self.work_limit {
            if self.work_done > work_limit { return true; }
        }
        if self.work_done % 100 == 0 {
            if let Some(duration_limit) = self.duration_limit {
                if self.clock_time_taken_since_start() > duration_limit { return true; }
            }
        }
        false
    }
}

/// How much work and wall clock time some stage of a solve consumed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimeTaken {
    pub work: u64,
    pub seconds: f64,
}

impl Sub for TimeTaken {
    type Output = TimeTaken;

    fn sub(self, rhs: Self) -> Self::Output {
        TimeTaken { work: self.work - rhs.work, seconds: self.seconds - rhs.seconds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_quota_is_exact() {
        let mut timeout = TimeOut::new(Some(3), None);
        assert!(!timeout.quick_check());
        assert!(!timeout.quick_check());
        assert!(!timeout.quick_check());
        assert!(timeout.quick_check());
        assert_eq!(4, timeout.work_done());
    }

    #[test]
    fn never_means_never() {
        let mut timeout = TimeOut::never();
        for _ in 0..1000 {
            assert!(!timeout.quick_check());
        }
    }

    #[test]
    fn time_taken_subtracts_stagewise() {
        let mut timeout = TimeOut::never();
        for _ in 0..5 { timeout.quick_check(); }
        let first = timeout.time_taken();
        for _ in 0..7 { timeout.quick_check(); }
        let second = timeout.time_taken() - first;
        assert_eq!(5, first.work);
        assert_eq!(7, second.work);
        assert!(second.seconds >= 0.0);
    }
}
