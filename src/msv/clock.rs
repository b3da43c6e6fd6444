//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Msvindex.
//
// Msvindex is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Msvindex is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Msvindex. If not, see <http://www.gnu.org/licenses/>.

use chrono::prelude::*;

/// Source of wall-clock time for entry timestamps.
pub trait Clock {
    /// Microseconds since the UNIX epoch.
    fn now_micros(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        Utc::now().timestamp_micros().max(0) as u64
    }
}

/// A clock stuck at one instant.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_micros(&self) -> u64 {
        self.0
    }
}
