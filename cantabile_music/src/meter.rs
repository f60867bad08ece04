// Meter description and beat-group layout.
//
// A meter is a numerator/denominator pair plus a grouping of denominator
// units into beat groups (4/4 as 2+2 half-note groups, 6/8 as 3+3, 7/8 as an
// explicit 2+2+3). Beat groups are the rhythmic frame: no duration may cross
// a group boundary, and group starts are the metrically strong positions.
//
// Durations throughout the crate are integer ticks of a thirty-second note,
// so every value the rhythm builder and motif engine produce is exact.
//
// Regular meters get a default grouping; amalgam meters (5/8, 7/8, 11/16...)
// must say how they group, and a malformed grouping is a configuration
// error rather than something to guess around.

use crate::error::{MelodyError, Result};
use serde::{Deserialize, Serialize};

/// Duration unit: one thirty-second note.
pub type Ticks = u32;

/// Ticks in a whole note.
pub const TICKS_PER_WHOLE: Ticks = 32;

/// Ticks in a quarter note.
pub const TICKS_PER_QUARTER: Ticks = TICKS_PER_WHOLE / 4;

/// Longest beat group, in denominator units. Longer spans must be split.
const MAX_GROUP_UNITS: u8 = 3;

/// Metric accent of a position within a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricWeight {
    /// Start of a beat group (the downbeat is always one).
    Strong,
    /// Start of a denominator unit inside a group.
    Secondary,
    /// Anything finer.
    Weak,
}

/// Meter as configured: numerator, denominator and an optional grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterSpec {
    pub numerator: u8,
    pub denominator: u8,
    /// Beat grouping in denominator units, e.g. `[2, 2, 3]` for 7/8.
    #[serde(default)]
    pub subdivisions: Option<Vec<u8>>,
}

impl Default for MeterSpec {
    fn default() -> Self {
        MeterSpec {
            numerator: 4,
            denominator: 4,
            subdivisions: None,
        }
    }
}

impl MeterSpec {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        MeterSpec {
            numerator,
            denominator,
            subdivisions: None,
        }
    }

    pub fn with_subdivisions(mut self, groups: Vec<u8>) -> Self {
        self.subdivisions = Some(groups);
        self
    }
}

/// A validated meter with its beat groups resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub numerator: u8,
    pub denominator: u8,
    /// Beat groups in denominator units; sums to `numerator`.
    pub groups: Vec<u8>,
}

impl Meter {
    /// Validate a spec and resolve its grouping.
    pub fn from_spec(spec: &MeterSpec) -> Result<Self> {
        let (n, d) = (spec.numerator, spec.denominator);
        let fail = |reason: String| MelodyError::InvalidMeter {
            numerator: n,
            denominator: d,
            reason,
        };

        if ![2, 4, 8, 16].contains(&d) {
            return Err(fail("denominator must be 2, 4, 8 or 16".into()));
        }
        if n == 0 || n > 32 {
            return Err(fail("numerator must be between 1 and 32".into()));
        }

        let groups = match &spec.subdivisions {
            Some(groups) => {
                if groups.is_empty() {
                    return Err(fail("subdivision list is empty".into()));
                }
                if groups.iter().any(|&g| g == 0 || g > MAX_GROUP_UNITS) {
                    return Err(fail(format!(
                        "beat groups must span 1 to {MAX_GROUP_UNITS} units, got {groups:?}"
                    )));
                }
                let sum: u32 = groups.iter().map(|&g| g as u32).sum();
                if sum != n as u32 {
                    return Err(fail(format!(
                        "subdivisions {groups:?} sum to {sum}, expected {n}"
                    )));
                }
                groups.clone()
            }
            None => default_grouping(n, d).ok_or_else(|| {
                fail("amalgam meter needs an explicit subdivision list".into())
            })?,
        };

        Ok(Meter {
            numerator: n,
            denominator: d,
            groups,
        })
    }

    /// Ticks in one denominator unit (a quarter in x/4, an eighth in x/8).
    pub fn unit_ticks(&self) -> Ticks {
        TICKS_PER_WHOLE / self.denominator as Ticks
    }

    /// Total ticks in one measure.
    pub fn measure_ticks(&self) -> Ticks {
        self.unit_ticks() * self.numerator as Ticks
    }

    /// Group lengths in ticks.
    pub fn group_ticks(&self) -> Vec<Ticks> {
        self.groups
            .iter()
            .map(|&g| g as Ticks * self.unit_ticks())
            .collect()
    }

    /// Onsets (in ticks) of every beat group.
    pub fn group_starts(&self) -> Vec<Ticks> {
        let mut starts = Vec::with_capacity(self.groups.len());
        let mut at = 0;
        for len in self.group_ticks() {
            starts.push(at);
            at += len;
        }
        starts
    }

    /// Metric weight of an onset inside the measure.
    pub fn weight_at(&self, onset: Ticks) -> MetricWeight {
        if self.group_starts().contains(&onset) {
            MetricWeight::Strong
        } else if onset % self.unit_ticks() == 0 {
            MetricWeight::Secondary
        } else {
            MetricWeight::Weak
        }
    }

    /// Index of the group containing `onset`, and that group's end tick.
    pub fn group_containing(&self, onset: Ticks) -> (usize, Ticks) {
        let mut end = 0;
        for (i, len) in self.group_ticks().into_iter().enumerate() {
            end += len;
            if onset < end {
                return (i, end);
            }
        }
        (self.groups.len().saturating_sub(1), self.measure_ticks())
    }
}

/// Grouping for regular meters, or `None` for amalgam meters that must be
/// grouped explicitly.
fn default_grouping(n: u8, d: u8) -> Option<Vec<u8>> {
    let threes = |n: u8| vec![3; (n / 3) as usize];
    match d {
        2 | 4 => Some(match n {
            4 => vec![2, 2],
            n if n > 3 && n % 3 == 0 => threes(n),
            n => vec![1; n as usize],
        }),
        _ => match n {
            n if n % 3 == 0 => Some(threes(n)),
            2 => Some(vec![2]),
            4 => Some(vec![2, 2]),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_time_groups_in_halves() {
        let m = Meter::from_spec(&MeterSpec::new(4, 4)).unwrap();
        assert_eq!(m.groups, vec![2, 2]);
        assert_eq!(m.measure_ticks(), 32);
        assert_eq!(m.group_starts(), vec![0, 16]);
        assert_eq!(m.weight_at(0), MetricWeight::Strong);
        assert_eq!(m.weight_at(8), MetricWeight::Secondary);
        assert_eq!(m.weight_at(16), MetricWeight::Strong);
        assert_eq!(m.weight_at(4), MetricWeight::Weak);
    }

    #[test]
    fn test_compound_meter_groups_in_threes() {
        let m = Meter::from_spec(&MeterSpec::new(6, 8)).unwrap();
        assert_eq!(m.groups, vec![3, 3]);
        assert_eq!(m.measure_ticks(), 24);
        let m = Meter::from_spec(&MeterSpec::new(3, 4)).unwrap();
        assert_eq!(m.groups, vec![1, 1, 1]);
    }

    #[test]
    fn test_amalgam_requires_explicit_grouping() {
        let err = Meter::from_spec(&MeterSpec::new(7, 8)).unwrap_err();
        assert!(err.is_configuration());

        let m = Meter::from_spec(&MeterSpec::new(7, 8).with_subdivisions(vec![2, 2, 3])).unwrap();
        // Eighth positions 0, 2, 4 in ticks of 4.
        assert_eq!(m.group_starts(), vec![0, 8, 16]);
    }

    #[test]
    fn test_malformed_subdivisions_rejected() {
        for groups in [vec![], vec![2, 2], vec![4, 3], vec![0, 7], vec![2, 2, 2, 2]] {
            let spec = MeterSpec::new(7, 8).with_subdivisions(groups.clone());
            assert!(
                Meter::from_spec(&spec).is_err(),
                "grouping {groups:?} should be rejected for 7/8"
            );
        }
    }

    #[test]
    fn test_bad_denominator_rejected() {
        assert!(Meter::from_spec(&MeterSpec::new(3, 3)).is_err());
        assert!(Meter::from_spec(&MeterSpec::new(0, 4)).is_err());
    }

    #[test]
    fn test_group_containing() {
        let m = Meter::from_spec(&MeterSpec::new(7, 8).with_subdivisions(vec![2, 2, 3])).unwrap();
        assert_eq!(m.group_containing(0), (0, 8));
        assert_eq!(m.group_containing(9), (1, 16));
        assert_eq!(m.group_containing(27), (2, 28));
    }
}
