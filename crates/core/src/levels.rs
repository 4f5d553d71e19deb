//! Static level table and pure lookups
//!
//! Levels are a function of cumulative points only. Ranges are contiguous,
//! sorted ascending by `min_points`, and the last one has no upper bound.

use serde::Serialize;

/// One row of the level table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDefinition {
    pub level: u32,
    pub name: &'static str,
    /// Inclusive lower bound
    pub min_points: i64,
    /// Inclusive upper bound (`i64::MAX` for the top level)
    pub max_points: i64,
    pub icon: &'static str,
    pub color: &'static str,
}

pub const LEVELS: &[LevelDefinition] = &[
    LevelDefinition { level: 1, name: "Novato", min_points: 0, max_points: 199, icon: "🌱", color: "#9ca3af" },
    LevelDefinition { level: 2, name: "Aprendiz", min_points: 200, max_points: 399, icon: "📘", color: "#60a5fa" },
    LevelDefinition { level: 3, name: "Competente", min_points: 400, max_points: 699, icon: "🛠️", color: "#34d399" },
    LevelDefinition { level: 4, name: "Profesional", min_points: 700, max_points: 1099, icon: "💼", color: "#fbbf24" },
    LevelDefinition { level: 5, name: "Experto", min_points: 1100, max_points: 1599, icon: "🚀", color: "#f97316" },
    LevelDefinition { level: 6, name: "Maestro", min_points: 1600, max_points: 2199, icon: "🏆", color: "#a855f7" },
    LevelDefinition { level: 7, name: "Leyenda", min_points: 2200, max_points: i64::MAX, icon: "👑", color: "#ef4444" },
];

/// Level reached with `points`, scanning from the top.
///
/// Negative totals never occur in the ledger; they clamp to the first level.
pub fn calculate_level(points: i64) -> &'static LevelDefinition {
    LEVELS
        .iter()
        .rev()
        .find(|l| l.min_points <= points)
        .unwrap_or(&LEVELS[0])
}

/// Look up a level by its number
pub fn level_info(level: u32) -> Option<&'static LevelDefinition> {
    LEVELS.iter().find(|l| l.level == level)
}

/// The level after `level`, if any
pub fn next_level(level: u32) -> Option<&'static LevelDefinition> {
    LEVELS.iter().find(|l| l.level == level + 1)
}

/// Progress snapshot for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current: LevelDefinition,
    pub next: Option<LevelDefinition>,
    pub points: i64,
    /// Points still missing for the next level (0 at the top)
    pub points_to_next: i64,
    /// 0-100 within the current range
    pub percent: u8,
}

pub fn level_progress(points: i64) -> LevelProgress {
    let current = calculate_level(points);
    let next = next_level(current.level);

    let (points_to_next, percent) = match next {
        Some(n) => {
            let span = (n.min_points - current.min_points).max(1);
            let done = (points - current.min_points).clamp(0, span);
            (n.min_points - points, ((done * 100) / span) as u8)
        }
        None => (0, 100),
    };

    LevelProgress {
        current: *current,
        next: next.copied(),
        points,
        points_to_next,
        percent,
    }
}
