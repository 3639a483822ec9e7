// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Battery tags and their execution families.
//!
//! A battery is a named suite of statistical tests. Each `jobs` row carries
//! one battery tag; the `batteries` result table is keyed by a human-readable
//! rollup name instead. Both spellings live here so the mapping cannot drift.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Execution family of a battery.
///
/// The two families run through different binaries and tolerate different
/// runtimes: boolean-test batteries are slower and get a longer deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Classic statistical batteries driven by the main test-runner binary.
    Rtt,
    /// Boolean-function batteries driven by the booltest runner.
    BoolTest,
}

impl Family {
    /// Per-job deadline multiplier applied to `max_sec_per_test`.
    pub fn deadline_multiplier(&self) -> f64 {
        match self {
            Family::Rtt => 1.0,
            Family::BoolTest => 2.2,
        }
    }
}

/// A test battery, the unit a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Battery {
    NistSts,
    Dieharder,
    Tu01SmallCrush,
    Tu01Crush,
    Tu01BigCrush,
    Tu01Rabbit,
    Tu01Alphabit,
    Tu01BlockAlphabit,
    Booltest1,
    Booltest2,
}

/// Unknown battery tag in a `jobs` row.
#[derive(Debug, Clone, Error)]
#[error("unknown battery tag: {0}")]
pub struct BatteryParseError(pub String);

impl Battery {
    /// Every battery in tag order.
    pub const ALL: [Battery; 10] = [
        Battery::NistSts,
        Battery::Dieharder,
        Battery::Tu01SmallCrush,
        Battery::Tu01Crush,
        Battery::Tu01BigCrush,
        Battery::Tu01Rabbit,
        Battery::Tu01Alphabit,
        Battery::Tu01BlockAlphabit,
        Battery::Booltest1,
        Battery::Booltest2,
    ];

    /// The tag stored in `jobs.battery` and passed to the runner via `-b`.
    pub fn tag(&self) -> &'static str {
        match self {
            Battery::NistSts => "nist_sts",
            Battery::Dieharder => "dieharder",
            Battery::Tu01SmallCrush => "tu01_smallcrush",
            Battery::Tu01Crush => "tu01_crush",
            Battery::Tu01BigCrush => "tu01_bigcrush",
            Battery::Tu01Rabbit => "tu01_rabbit",
            Battery::Tu01Alphabit => "tu01_alphabit",
            Battery::Tu01BlockAlphabit => "tu01_blockalphabit",
            Battery::Booltest1 => "booltest_1",
            Battery::Booltest2 => "booltest_2",
        }
    }

    /// The display name under which results are rolled up in `batteries`.
    ///
    /// The reaper deletes rollup rows by this name when it resets a job, so
    /// it must match what the test runner writes.
    pub fn rollup_name(&self) -> &'static str {
        match self {
            Battery::NistSts => "NIST Statistical Testing Suite",
            Battery::Dieharder => "Dieharder",
            Battery::Tu01SmallCrush => "TestU01 Small Crush",
            Battery::Tu01Crush => "TestU01 Crush",
            Battery::Tu01BigCrush => "TestU01 Big Crush",
            Battery::Tu01Rabbit => "TestU01 Rabbit",
            Battery::Tu01Alphabit => "TestU01 Alphabit",
            Battery::Tu01BlockAlphabit => "TestU01 Block Alphabit",
            Battery::Booltest1 => "BoolTest 1",
            Battery::Booltest2 => "BoolTest 2",
        }
    }

    /// Which runner binary and deadline policy this battery uses.
    pub fn family(&self) -> Family {
        match self {
            Battery::Booltest1 | Battery::Booltest2 => Family::BoolTest,
            _ => Family::Rtt,
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Battery {
    type Err = BatteryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Battery::ALL
            .iter()
            .find(|b| b.tag() == s)
            .copied()
            .ok_or_else(|| BatteryParseError(s.to_string()))
    }
}

#[cfg(test)]
#[path = "battery_tests.rs"]
mod tests;
