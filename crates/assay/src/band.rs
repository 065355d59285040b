use serde::{Deserialize, Serialize};

/// Display grouping of a 0 to 100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// 80 and above.
    Pass,
    /// 60 to 79.
    Warn,
    Fail,
}

impl ScoreBand {
    pub const fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Pass,
            60..=79 => Self::Warn,
            _ => Self::Fail,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        assert_eq!(ScoreBand::from_score(100), ScoreBand::Pass);
        assert_eq!(ScoreBand::from_score(80), ScoreBand::Pass);
        assert_eq!(ScoreBand::from_score(79), ScoreBand::Warn);
        assert_eq!(ScoreBand::from_score(60), ScoreBand::Warn);
        assert_eq!(ScoreBand::from_score(59), ScoreBand::Fail);
        assert_eq!(ScoreBand::from_score(0).label(), "fail");
    }
}
