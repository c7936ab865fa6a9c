//! Belt, stripe, XP and technique-mastery arithmetic.
//!
//! Everything here is a pure function over rows that were already fetched.
//! Services load the rows, call into this module and serialize the result.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use strsim::jaro_winkler;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub const DEFAULT_MAX_STRIPES: u32 = 4;
/// Minimum Jaro-Winkler similarity for a stored belt name to match a ladder entry.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.85;
/// Curriculum mastery (percent) required before a promotion is suggested.
pub const DEFAULT_MIN_MASTERY: f64 = 80.0;

/// One rung of the belt ladder, detached from the database row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeltStep {
    pub id: i32,
    pub name: String,
    pub min_xp: i64,
    pub order_index: i32,
}

/// Order a ladder by `order_index`, breaking ties by `min_xp`.
pub fn sort_ladder(mut belts: Vec<BeltStep>) -> Vec<BeltStep> {
    belts.sort_by(|a, b| {
        a.order_index
            .cmp(&b.order_index)
            .then(a.min_xp.cmp(&b.min_xp))
    });
    belts
}

/// Fold a belt name for comparison: accents stripped, lowercase, and the
/// decorative "faixa"/"belt" words removed ("Faixa Azul" == "azul").
pub fn normalize_belt_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let words: Vec<&str> = folded.split_whitespace().collect();
    let mut slice = &words[..];
    if let Some((first, rest)) = slice.split_first()
        && (*first == "faixa" || *first == "belt")
        && !rest.is_empty()
    {
        slice = rest;
    }
    if let Some((last, rest)) = slice.split_last()
        && *last == "belt"
        && !rest.is_empty()
    {
        slice = rest;
    }
    slice.join(" ")
}

/// Index of the ladder entry whose name matches `name`.
///
/// An exact match after normalization wins; otherwise the most similar name
/// above [`FUZZY_MATCH_THRESHOLD`] is returned.
pub fn match_belt(ladder: &[BeltStep], name: &str) -> Option<usize> {
    let wanted = normalize_belt_name(name);
    if wanted.is_empty() {
        return None;
    }

    if let Some(i) = ladder
        .iter()
        .position(|b| normalize_belt_name(&b.name) == wanted)
    {
        return Some(i);
    }

    ladder
        .iter()
        .enumerate()
        .map(|(i, b)| (i, jaro_winkler(&wanted, &normalize_belt_name(&b.name))))
        .filter(|(_, score)| *score >= FUZZY_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Whether two belt names refer to the same belt, tolerating spelling drift.
pub fn same_belt(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_belt_name(a), normalize_belt_name(b));
    !a.is_empty() && (a == b || jaro_winkler(&a, &b) >= FUZZY_MATCH_THRESHOLD)
}

/// Index of the highest belt whose threshold `xp` reaches. Falls back to the
/// first belt when `xp` is below every threshold.
pub fn belt_for_xp(ladder: &[BeltStep], xp: i64) -> Option<usize> {
    if ladder.is_empty() {
        return None;
    }
    Some(ladder.iter().rposition(|b| b.min_xp <= xp).unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeltProgress {
    pub current: Option<BeltStep>,
    pub next: Option<BeltStep>,
    pub xp: i64,
    /// Progress toward `next`, 0..=100, one decimal.
    pub percent: f64,
    pub xp_to_next: i64,
    pub stripes: u32,
    /// False when the stored belt name matched nothing and the XP fallback was used.
    pub matched_by_name: bool,
}

/// Where a member stands on a sorted ladder.
pub fn belt_progress(
    ladder: &[BeltStep],
    belt_name: &str,
    xp: i64,
    max_stripes: u32,
) -> BeltProgress {
    let by_name = match_belt(ladder, belt_name);
    let matched_by_name = by_name.is_some();
    let Some(idx) = by_name.or_else(|| belt_for_xp(ladder, xp)) else {
        return BeltProgress {
            current: None,
            next: None,
            xp,
            percent: 0.0,
            xp_to_next: 0,
            stripes: 0,
            matched_by_name,
        };
    };

    let current = ladder[idx].clone();
    let next = ladder.get(idx + 1).cloned();

    let (percent, xp_to_next) = match &next {
        None => (100.0, 0),
        Some(next) => {
            let span = next.min_xp - current.min_xp;
            let percent = if span <= 0 {
                0.0
            } else {
                let raw = (xp - current.min_xp) as f64 / span as f64 * 100.0;
                round1(raw.clamp(0.0, 100.0))
            };
            (percent, (next.min_xp - xp).max(0))
        }
    };

    BeltProgress {
        current: Some(current),
        next,
        xp,
        percent,
        xp_to_next,
        stripes: stripe_count(percent, max_stripes),
        matched_by_name,
    }
}

/// Stripes earned for a given progress percentage.
pub fn stripe_count(percent: f64, max_stripes: u32) -> u32 {
    if max_stripes == 0 {
        return 0;
    }
    let earned = (percent.clamp(0.0, 100.0) / 100.0 * max_stripes as f64).floor() as u32;
    earned.min(max_stripes)
}

/// Curriculum checklist state of one technique for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueStatus {
    #[default]
    NotSeen,
    Introduced,
    Practicing,
    Proficient,
    Mastered,
}

impl TechniqueStatus {
    pub const ALL: [TechniqueStatus; 5] = [
        TechniqueStatus::NotSeen,
        TechniqueStatus::Introduced,
        TechniqueStatus::Practicing,
        TechniqueStatus::Proficient,
        TechniqueStatus::Mastered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TechniqueStatus::NotSeen => "not_seen",
            TechniqueStatus::Introduced => "introduced",
            TechniqueStatus::Practicing => "practicing",
            TechniqueStatus::Proficient => "proficient",
            TechniqueStatus::Mastered => "mastered",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            TechniqueStatus::NotSeen => 0.0,
            TechniqueStatus::Introduced => 0.25,
            TechniqueStatus::Practicing => 0.5,
            TechniqueStatus::Proficient => 0.75,
            TechniqueStatus::Mastered => 1.0,
        }
    }
}

impl fmt::Display for TechniqueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TechniqueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TechniqueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown technique status '{}'", s))
    }
}

/// Weighted mastery percentage over a belt's `total` techniques.
/// Techniques without a recorded status count as not seen.
pub fn technique_mastery(statuses: &[TechniqueStatus], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = statuses.iter().take(total).map(|s| s.weight()).sum();
    round1((sum / total as f64 * 100.0).min(100.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

/// Whether a member may be promoted to the next belt.
///
/// A belt without curriculum (`curriculum_size == 0`) does not gate on mastery.
pub fn promotion_eligibility(
    progress: &BeltProgress,
    mastery: f64,
    curriculum_size: usize,
    min_mastery: f64,
) -> Eligibility {
    let mut reasons = Vec::new();

    match &progress.next {
        None => reasons.push("Already at the highest belt".to_string()),
        Some(next) => {
            if progress.xp < next.min_xp {
                reasons.push(format!(
                    "Needs {} more XP for {}",
                    next.min_xp - progress.xp,
                    next.name
                ));
            }
            if curriculum_size > 0 && mastery < min_mastery {
                reasons.push(format!(
                    "Technique mastery {:.1}% is below {:.1}%",
                    mastery, min_mastery
                ));
            }
        }
    }

    Eligibility {
        eligible: reasons.is_empty(),
        reasons,
    }
}

/// XP amounts granted by attendance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpRules {
    pub attendance_xp: i64,
    pub on_time_bonus: i64,
    pub good_behavior_bonus: i64,
    pub max_stripes: u32,
}

impl Default for XpRules {
    fn default() -> Self {
        Self {
            attendance_xp: 10,
            on_time_bonus: 5,
            good_behavior_bonus: 5,
            max_stripes: DEFAULT_MAX_STRIPES,
        }
    }
}

pub fn attendance_xp(rules: &XpRules, on_time: bool, good_behavior: bool) -> i64 {
    let mut xp = rules.attendance_xp;
    if on_time {
        xp += rules.on_time_bonus;
    }
    if good_behavior {
        xp += rules.good_behavior_bonus;
    }
    xp
}

/// New XP total after applying `delta`; never negative.
pub fn apply_xp_delta(current: i64, delta: i64) -> i64 {
    current.saturating_add(delta).max(0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub member_id: i32,
    pub name: String,
    pub belt: String,
    pub score: i64,
    pub rank: u32,
}

/// Sort by score descending (name as tie-break) and assign standard
/// competition ranks: equal scores share a rank, the next rank skips.
pub fn rank_leaderboard(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let mut prev: Option<(i64, u32)> = None;
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = match prev {
            Some((score, rank)) if score == entry.score => rank,
            _ => i as u32 + 1,
        };
        prev = Some((entry.score, entry.rank));
    }
    entries
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<BeltStep> {
        sort_ladder(vec![
            step(3, "Roxa", 1500, 2),
            step(1, "Branca", 0, 0),
            step(2, "Azul", 500, 1),
            step(4, "Marrom", 3000, 3),
            step(5, "Preta", 5000, 4),
        ])
    }

    fn step(id: i32, name: &str, min_xp: i64, order_index: i32) -> BeltStep {
        BeltStep {
            id,
            name: name.to_string(),
            min_xp,
            order_index,
        }
    }

    fn entry(id: i32, name: &str, score: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            member_id: id,
            name: name.to_string(),
            belt: "Branca".to_string(),
            score,
            rank: 0,
        }
    }

    #[test]
    fn test_sort_ladder_orders_by_index() {
        let names: Vec<String> = ladder().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Branca", "Azul", "Roxa", "Marrom", "Preta"]);
    }

    #[test]
    fn test_normalize_strips_accents_and_decoration() {
        assert_eq!(normalize_belt_name("Faixa Azul"), "azul");
        assert_eq!(normalize_belt_name("  Blue Belt "), "blue");
        assert_eq!(normalize_belt_name("Laranjá"), "laranja");
        // A lone "belt" is a name, not decoration
        assert_eq!(normalize_belt_name("Belt"), "belt");
    }

    #[test]
    fn test_match_belt_exact_and_fuzzy() {
        let ladder = ladder();
        assert_eq!(match_belt(&ladder, "faixa roxa"), Some(2));
        assert_eq!(match_belt(&ladder, "Marron"), Some(3));
        assert_eq!(match_belt(&ladder, "Verde"), None);
        assert_eq!(match_belt(&ladder, ""), None);
    }

    #[test]
    fn test_same_belt() {
        assert!(same_belt("Faixa Marrom", "marron"));
        assert!(same_belt("Blue Belt", "blue"));
        assert!(!same_belt("Blue", "Black"));
        assert!(!same_belt("", ""));
    }

    #[test]
    fn test_belt_for_xp() {
        let ladder = ladder();
        assert_eq!(belt_for_xp(&ladder, 0), Some(0));
        assert_eq!(belt_for_xp(&ladder, 499), Some(0));
        assert_eq!(belt_for_xp(&ladder, 500), Some(1));
        assert_eq!(belt_for_xp(&ladder, 99_999), Some(4));
        assert_eq!(belt_for_xp(&[], 10), None);
    }

    #[test]
    fn test_progress_midway() {
        let progress = belt_progress(&ladder(), "Azul", 1000, 4);
        assert_eq!(progress.current.as_ref().map(|b| b.name.as_str()), Some("Azul"));
        assert_eq!(progress.next.as_ref().map(|b| b.name.as_str()), Some("Roxa"));
        assert_eq!(progress.percent, 50.0);
        assert_eq!(progress.xp_to_next, 500);
        assert_eq!(progress.stripes, 2);
        assert!(progress.matched_by_name);
    }

    #[test]
    fn test_progress_clamps_and_top_belt() {
        // Stored belt lags behind XP: progress caps at 100
        let over = belt_progress(&ladder(), "Branca", 800, 4);
        assert_eq!(over.percent, 100.0);
        assert_eq!(over.xp_to_next, 0);
        assert_eq!(over.stripes, 4);

        let top = belt_progress(&ladder(), "Preta", 6000, 4);
        assert!(top.next.is_none());
        assert_eq!(top.percent, 100.0);
    }

    #[test]
    fn test_progress_falls_back_to_xp_and_handles_empty_ladder() {
        let fallback = belt_progress(&ladder(), "unknown", 1600, 4);
        assert!(!fallback.matched_by_name);
        assert_eq!(fallback.current.map(|b| b.name), Some("Roxa".to_string()));

        let empty = belt_progress(&[], "Azul", 100, 4);
        assert!(empty.current.is_none());
        assert_eq!(empty.percent, 0.0);
        assert_eq!(empty.stripes, 0);
    }

    #[test]
    fn test_progress_zero_span_does_not_divide() {
        let flat = vec![step(1, "A", 100, 0), step(2, "B", 100, 1)];
        let progress = belt_progress(&flat, "A", 100, 4);
        assert_eq!(progress.percent, 0.0);
        assert_eq!(progress.stripes, 0);
    }

    #[test]
    fn test_stripe_count() {
        assert_eq!(stripe_count(0.0, 4), 0);
        assert_eq!(stripe_count(24.9, 4), 0);
        assert_eq!(stripe_count(25.0, 4), 1);
        assert_eq!(stripe_count(99.9, 4), 3);
        assert_eq!(stripe_count(100.0, 4), 4);
        assert_eq!(stripe_count(150.0, 4), 4);
        assert_eq!(stripe_count(80.0, 0), 0);
    }

    #[test]
    fn test_technique_status_parse() {
        assert_eq!(
            "mastered".parse::<TechniqueStatus>(),
            Ok(TechniqueStatus::Mastered)
        );
        assert!("expert".parse::<TechniqueStatus>().is_err());
        assert_eq!(TechniqueStatus::Practicing.to_string(), "practicing");
    }

    #[test]
    fn test_technique_mastery_weighted() {
        use TechniqueStatus::*;
        assert_eq!(technique_mastery(&[], 0), 0.0);
        assert_eq!(technique_mastery(&[Mastered, Mastered], 2), 100.0);
        // Two of four techniques have no row at all
        assert_eq!(technique_mastery(&[Mastered, Practicing], 4), 37.5);
        assert_eq!(technique_mastery(&[Introduced, NotSeen, Proficient], 3), 33.3);
    }

    #[test]
    fn test_promotion_eligibility() {
        let ladder = ladder();

        let ready = belt_progress(&ladder, "Azul", 1500, 4);
        let result = promotion_eligibility(&ready, 85.0, 10, DEFAULT_MIN_MASTERY);
        assert!(result.eligible);

        let short = belt_progress(&ladder, "Azul", 1200, 4);
        let result = promotion_eligibility(&short, 40.0, 10, DEFAULT_MIN_MASTERY);
        assert!(!result.eligible);
        assert_eq!(result.reasons.len(), 2);
        assert!(result.reasons[0].contains("300 more XP"));

        // No curriculum for the belt: XP alone decides
        let result = promotion_eligibility(&ready, 0.0, 0, DEFAULT_MIN_MASTERY);
        assert!(result.eligible);

        let top = belt_progress(&ladder, "Preta", 9000, 4);
        assert!(!promotion_eligibility(&top, 100.0, 1, DEFAULT_MIN_MASTERY).eligible);
    }

    #[test]
    fn test_attendance_xp_and_delta() {
        let rules = XpRules::default();
        assert_eq!(attendance_xp(&rules, false, false), 10);
        assert_eq!(attendance_xp(&rules, true, true), 20);
        assert_eq!(apply_xp_delta(30, -50), 0);
        assert_eq!(apply_xp_delta(30, 20), 50);
    }

    #[test]
    fn test_rank_leaderboard_competition_ranking() {
        let ranked = rank_leaderboard(vec![
            entry(1, "Carla", 50),
            entry(2, "ana", 80),
            entry(3, "Bruno", 80),
            entry(4, "Davi", 10),
        ]);
        let view: Vec<(&str, u32)> = ranked.iter().map(|e| (e.name.as_str(), e.rank)).collect();
        assert_eq!(
            view,
            vec![("ana", 1), ("Bruno", 1), ("Carla", 3), ("Davi", 4)]
        );
    }
}
