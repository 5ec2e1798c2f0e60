/// Every bet type the pipeline can recommend.
///
/// The first block has live bookmaker prices in the odds feed; the rest
/// are model-only markets priced against fixed reference odds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BetType {
    HomeWin,
    Draw,
    AwayWin,
    Over15,
    Under15,
    Over25,
    Under25,
    Over35,
    Under35,
    BttsYes,
    BttsNo,
    CleanSheetHome,
    CleanSheetAway,
    OddGoals,
    EvenGoals,
    HtHome,
    HtDraw,
    HtAway,
    HtOver05,
    LateGoal,
}

/// Market category a bet type belongs to; diversification takes at most
/// one candidate per category before backfilling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketCategory {
    OneXTwo,
    Totals,
    Btts,
    CleanSheet,
    OddEven,
    HalfTime,
    LateGoal,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::OneXTwo => "1x2",
            MarketCategory::Totals => "totals",
            MarketCategory::Btts => "btts",
            MarketCategory::CleanSheet => "clean_sheet",
            MarketCategory::OddEven => "odd_even",
            MarketCategory::HalfTime => "half_time",
            MarketCategory::LateGoal => "late_goal",
        }
    }
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::HomeWin => "HOME_WIN",
            BetType::Draw => "DRAW",
            BetType::AwayWin => "AWAY_WIN",
            BetType::Over15 => "OVER_1.5",
            BetType::Under15 => "UNDER_1.5",
            BetType::Over25 => "OVER_2.5",
            BetType::Under25 => "UNDER_2.5",
            BetType::Over35 => "OVER_3.5",
            BetType::Under35 => "UNDER_3.5",
            BetType::BttsYes => "BTTS_YES",
            BetType::BttsNo => "BTTS_NO",
            BetType::CleanSheetHome => "CLEAN_SHEET_HOME",
            BetType::CleanSheetAway => "CLEAN_SHEET_AWAY",
            BetType::OddGoals => "ODD_GOALS",
            BetType::EvenGoals => "EVEN_GOALS",
            BetType::HtHome => "HT_HOME",
            BetType::HtDraw => "HT_DRAW",
            BetType::HtAway => "HT_AWAY",
            BetType::HtOver05 => "HT_OVER_0.5",
            BetType::LateGoal => "LATE_GOAL",
        }
    }

    /// Inverse of [`as_str`](Self::as_str); used when settling persisted
    /// signals. Unknown keys return `None` rather than panicking so a
    /// hand-edited row cannot take the settlement sweep down.
    pub fn parse(s: &str) -> Option<BetType> {
        let bet = match s {
            "HOME_WIN" => BetType::HomeWin,
            "DRAW" => BetType::Draw,
            "AWAY_WIN" => BetType::AwayWin,
            "OVER_1.5" => BetType::Over15,
            "UNDER_1.5" => BetType::Under15,
            "OVER_2.5" => BetType::Over25,
            "UNDER_2.5" => BetType::Under25,
            "OVER_3.5" => BetType::Over35,
            "UNDER_3.5" => BetType::Under35,
            "BTTS_YES" => BetType::BttsYes,
            "BTTS_NO" => BetType::BttsNo,
            "CLEAN_SHEET_HOME" => BetType::CleanSheetHome,
            "CLEAN_SHEET_AWAY" => BetType::CleanSheetAway,
            "ODD_GOALS" => BetType::OddGoals,
            "EVEN_GOALS" => BetType::EvenGoals,
            "HT_HOME" => BetType::HtHome,
            "HT_DRAW" => BetType::HtDraw,
            "HT_AWAY" => BetType::HtAway,
            "HT_OVER_0.5" => BetType::HtOver05,
            "LATE_GOAL" => BetType::LateGoal,
            _ => return None,
        };
        Some(bet)
    }

    pub fn category(&self) -> MarketCategory {
        match self {
            BetType::HomeWin | BetType::Draw | BetType::AwayWin => MarketCategory::OneXTwo,
            BetType::Over15
            | BetType::Under15
            | BetType::Over25
            | BetType::Under25
            | BetType::Over35
            | BetType::Under35 => MarketCategory::Totals,
            BetType::BttsYes | BetType::BttsNo => MarketCategory::Btts,
            BetType::CleanSheetHome | BetType::CleanSheetAway => MarketCategory::CleanSheet,
            BetType::OddGoals | BetType::EvenGoals => MarketCategory::OddEven,
            BetType::HtHome | BetType::HtDraw | BetType::HtAway | BetType::HtOver05 => {
                MarketCategory::HalfTime
            }
            BetType::LateGoal => MarketCategory::LateGoal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_bet_type() {
        let all = [
            BetType::HomeWin,
            BetType::Draw,
            BetType::AwayWin,
            BetType::Over15,
            BetType::Under15,
            BetType::Over25,
            BetType::Under25,
            BetType::Over35,
            BetType::Under35,
            BetType::BttsYes,
            BetType::BttsNo,
            BetType::CleanSheetHome,
            BetType::CleanSheetAway,
            BetType::OddGoals,
            BetType::EvenGoals,
            BetType::HtHome,
            BetType::HtDraw,
            BetType::HtAway,
            BetType::HtOver05,
            BetType::LateGoal,
        ];
        for bet in all {
            assert_eq!(BetType::parse(bet.as_str()), Some(bet));
        }
        assert_eq!(BetType::parse("CORNERS_OVER_9.5"), None);
    }

    #[test]
    fn categories_partition_the_markets() {
        assert_eq!(BetType::HomeWin.category(), MarketCategory::OneXTwo);
        assert_eq!(BetType::Under35.category(), MarketCategory::Totals);
        assert_eq!(BetType::BttsNo.category(), MarketCategory::Btts);
        assert_eq!(BetType::HtOver05.category(), MarketCategory::HalfTime);
        assert_eq!(BetType::LateGoal.category(), MarketCategory::LateGoal);
    }
}
