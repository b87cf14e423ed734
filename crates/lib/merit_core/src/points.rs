//! Competition level classification by points.
//!
//! Boundary policy: a single inclusive-upper-bound ladder. `points <= 25` is
//! local, `<= 50` regional, `<= 75` national, everything above international.
//! The same ladder is used everywhere points are classified so that report
//! and award paths cannot drift apart.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Local,
    Regional,
    National,
    International,
}

impl CompetitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionLevel::Local => "local",
            CompetitionLevel::Regional => "regional",
            CompetitionLevel::National => "national",
            CompetitionLevel::International => "international",
        }
    }

    /// Nominal point award for an achievement at this level.
    pub fn award_points(&self) -> i32 {
        match self {
            CompetitionLevel::Local => 25,
            CompetitionLevel::Regional => 50,
            CompetitionLevel::National => 75,
            CompetitionLevel::International => 100,
        }
    }
}

/// Classify a point total into a competition level.
pub fn competition_level(points: i32) -> CompetitionLevel {
    if points <= 25 {
        CompetitionLevel::Local
    } else if points <= 50 {
        CompetitionLevel::Regional
    } else if points <= 75 {
        CompetitionLevel::National
    } else {
        CompetitionLevel::International
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_boundaries_are_inclusive_upper_bounds() {
        assert_eq!(competition_level(1), CompetitionLevel::Local);
        assert_eq!(competition_level(25), CompetitionLevel::Local);
        assert_eq!(competition_level(26), CompetitionLevel::Regional);
        assert_eq!(competition_level(50), CompetitionLevel::Regional);
        assert_eq!(competition_level(51), CompetitionLevel::National);
        assert_eq!(competition_level(75), CompetitionLevel::National);
        assert_eq!(competition_level(76), CompetitionLevel::International);
        assert_eq!(competition_level(500), CompetitionLevel::International);
    }

    #[test]
    fn award_points_land_inside_their_own_level() {
        for level in [
            CompetitionLevel::Local,
            CompetitionLevel::Regional,
            CompetitionLevel::National,
            CompetitionLevel::International,
        ] {
            assert_eq!(competition_level(level.award_points()), level);
        }
    }
}
