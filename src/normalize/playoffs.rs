//! Playoff-result derivation.
//!
//! Providers expose postseason results in three distinct shapes; each shape
//! has exactly one derivation function here so bracket fragility stays behind
//! a single tested seam per shape.

use crate::models::season::PlayoffOutcome;
use std::collections::HashMap;

/// One match from a flagged bracket (Sleeper winners bracket).
#[derive(Debug, Clone)]
pub struct BracketMatch {
    pub round: i32,
    pub match_id: i32,
    pub winner: Option<String>,
    pub loser: Option<String>,
    /// Placement decided by this match: 1 for the championship, 3 for the
    /// third-place game. Absent on ordinary matches.
    pub placement: Option<i32>,
}

impl BracketMatch {
    fn participants(&self) -> impl Iterator<Item = &String> {
        self.winner.iter().chain(self.loser.iter())
    }
}

/// Flagged-bracket shape.
///
/// The match flagged as deciding first place assigns champion/runner-up; when
/// no match carries the flag, the lowest-index match of the final round is
/// taken as the championship. A separately flagged third-place match assigns
/// third place to teams not already assigned. Teams appearing anywhere in the
/// bracket without an assignment made the playoffs; everyone else missed.
#[must_use]
pub fn derive_flagged_bracket(
    matches: &[BracketMatch],
    all_teams: &[String],
) -> HashMap<String, PlayoffOutcome> {
    let mut results: HashMap<String, PlayoffOutcome> = HashMap::new();

    let championship = matches
        .iter()
        .find(|m| m.placement == Some(1))
        .or_else(|| {
            let final_round = matches.iter().map(|m| m.round).max()?;
            matches
                .iter()
                .filter(|m| m.round == final_round)
                .min_by_key(|m| m.match_id)
        });

    if let Some(game) = championship {
        if let Some(winner) = &game.winner {
            results.insert(winner.clone(), PlayoffOutcome::Champion);
        }
        if let Some(loser) = &game.loser {
            results.insert(loser.clone(), PlayoffOutcome::RunnerUp);
        }
    }

    if let Some(third) = matches.iter().find(|m| m.placement == Some(3))
        && let Some(winner) = &third.winner
        && !results.contains_key(winner)
    {
        results.insert(winner.clone(), PlayoffOutcome::ThirdPlace);
    }

    for game in matches {
        for team in game.participants() {
            results
                .entry(team.clone())
                .or_insert(PlayoffOutcome::Playoffs);
        }
    }

    for team in all_teams {
        results
            .entry(team.clone())
            .or_insert(PlayoffOutcome::Missed);
    }

    results
}

/// Bracket membership tag carried on schedule entries (ESPN playoffTierType).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameTier {
    None,
    Winners,
    Consolation,
}

/// One tier-labelled game, in schedule order.
#[derive(Debug, Clone)]
pub struct TieredGame {
    pub week: i32,
    pub tier: GameTier,
    pub winner: Option<String>,
    pub participants: Vec<String>,
}

/// Tier-label shape.
///
/// The winner of the last winners-bracket game is champion; every other
/// participant of any tiered game was eliminated somewhere along the way;
/// teams in no tiered game missed the playoffs.
#[must_use]
pub fn derive_tiered(
    games: &[TieredGame],
    all_teams: &[String],
) -> HashMap<String, PlayoffOutcome> {
    let mut results: HashMap<String, PlayoffOutcome> = HashMap::new();

    let tiered: Vec<&TieredGame> = games.iter().filter(|g| g.tier != GameTier::None).collect();

    let final_game = tiered
        .iter()
        .filter(|g| g.tier == GameTier::Winners)
        .max_by_key(|g| g.week);

    if let Some(game) = final_game
        && let Some(winner) = &game.winner
    {
        results.insert(winner.clone(), PlayoffOutcome::Champion);
    }

    for game in &tiered {
        for team in &game.participants {
            results
                .entry(team.clone())
                .or_insert(PlayoffOutcome::Eliminated);
        }
    }

    for team in all_teams {
        results
            .entry(team.clone())
            .or_insert(PlayoffOutcome::Missed);
    }

    results
}

/// A team's final rank plus whether it held a playoff seed.
#[derive(Debug, Clone)]
pub struct RankedTeam {
    pub team_id: String,
    pub rank: Option<i32>,
    pub seeded: bool,
}

/// Rank-only shape, for providers exposing no bracket data at all.
#[must_use]
pub fn derive_rank_only(teams: &[RankedTeam]) -> HashMap<String, PlayoffOutcome> {
    let mut results = HashMap::new();
    for team in teams {
        let outcome = match (team.rank, team.seeded) {
            (Some(1), _) => PlayoffOutcome::Champion,
            (Some(2), _) => PlayoffOutcome::RunnerUp,
            (Some(r), true) if r > 2 => PlayoffOutcome::Eliminated,
            _ => PlayoffOutcome::Missed,
        };
        results.insert(team.team_id.clone(), outcome);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(
        round: i32,
        match_id: i32,
        winner: &str,
        loser: &str,
        placement: Option<i32>,
    ) -> BracketMatch {
        BracketMatch {
            round,
            match_id,
            winner: Some(winner.to_string()),
            loser: Some(loser.to_string()),
            placement,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn flagged_championship_assigns_champion_and_runner_up() {
        let matches = vec![
            m(1, 1, "1", "4", None),
            m(1, 2, "2", "3", None),
            m(2, 3, "1", "2", Some(1)),
            m(2, 4, "3", "4", Some(3)),
        ];
        let teams = ids(&["1", "2", "3", "4", "5", "6"]);
        let results = derive_flagged_bracket(&matches, &teams);

        assert_eq!(results["1"], PlayoffOutcome::Champion);
        assert_eq!(results["2"], PlayoffOutcome::RunnerUp);
        assert_eq!(results["3"], PlayoffOutcome::ThirdPlace);
        assert_eq!(results["4"], PlayoffOutcome::Playoffs);
        assert_eq!(results["5"], PlayoffOutcome::Missed);
        assert_eq!(results["6"], PlayoffOutcome::Missed);
    }

    #[test]
    fn flag_missing_falls_back_to_lowest_index_final_round_match() {
        let matches = vec![
            m(1, 10, "1", "4", None),
            m(2, 21, "1", "2", None),
            m(2, 22, "4", "3", None),
        ];
        let results = derive_flagged_bracket(&matches, &ids(&["1", "2", "3", "4"]));

        assert_eq!(results["1"], PlayoffOutcome::Champion);
        assert_eq!(results["2"], PlayoffOutcome::RunnerUp);
        // Lost the other final-round match, never flagged third.
        assert_eq!(results["3"], PlayoffOutcome::Playoffs);
    }

    #[test]
    fn tiered_final_winner_is_champion_others_eliminated() {
        let games = vec![
            TieredGame {
                week: 14,
                tier: GameTier::Winners,
                winner: Some("a".into()),
                participants: ids(&["a", "d"]),
            },
            TieredGame {
                week: 15,
                tier: GameTier::Winners,
                winner: Some("a".into()),
                participants: ids(&["a", "b"]),
            },
            TieredGame {
                week: 15,
                tier: GameTier::Consolation,
                winner: Some("c".into()),
                participants: ids(&["c", "d"]),
            },
            TieredGame {
                week: 15,
                tier: GameTier::None,
                winner: Some("e".into()),
                participants: ids(&["e", "f"]),
            },
        ];
        let results = derive_tiered(&games, &ids(&["a", "b", "c", "d", "e", "f"]));

        assert_eq!(results["a"], PlayoffOutcome::Champion);
        assert_eq!(results["b"], PlayoffOutcome::Eliminated);
        assert_eq!(results["c"], PlayoffOutcome::Eliminated);
        assert_eq!(results["d"], PlayoffOutcome::Eliminated);
        // Untired games confer no playoff standing.
        assert_eq!(results["e"], PlayoffOutcome::Missed);
        assert_eq!(results["f"], PlayoffOutcome::Missed);
    }

    #[test]
    fn rank_only_maps_ranks_and_seeds() {
        let teams = vec![
            RankedTeam {
                team_id: "1".into(),
                rank: Some(1),
                seeded: true,
            },
            RankedTeam {
                team_id: "2".into(),
                rank: Some(2),
                seeded: true,
            },
            RankedTeam {
                team_id: "3".into(),
                rank: Some(3),
                seeded: true,
            },
            RankedTeam {
                team_id: "4".into(),
                rank: Some(7),
                seeded: false,
            },
            RankedTeam {
                team_id: "5".into(),
                rank: None,
                seeded: false,
            },
        ];
        let results = derive_rank_only(&teams);

        assert_eq!(results["1"], PlayoffOutcome::Champion);
        assert_eq!(results["2"], PlayoffOutcome::RunnerUp);
        assert_eq!(results["3"], PlayoffOutcome::Eliminated);
        assert_eq!(results["4"], PlayoffOutcome::Missed);
        assert_eq!(results["5"], PlayoffOutcome::Missed);
    }
}
