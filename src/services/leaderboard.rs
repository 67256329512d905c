//! Static leaderboard fixture. Every time filter shows the same rows rotated
//! by the filter's position, with ranks renumbered.

use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardView {
    Fighters,
    Trainers,
    Activity,
}

impl LeaderboardView {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fighters" | "fighter" | "fighter-rank" => Ok(Self::Fighters),
            "trainers" | "trainer" | "trainer-rank" => Ok(Self::Trainers),
            "activity" => Ok(Self::Activity),
            other => Err(AppError::BadRequest(format!(
                "unknown leaderboard view '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeFilter {
    Total,
    Cycle,
    Week,
    Day,
}

impl TimeFilter {
    pub const ALL: [TimeFilter; 4] = [Self::Total, Self::Cycle, Self::Week, Self::Day];

    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::Total);
        };
        Self::ALL
            .into_iter()
            .find(|filter| filter.label().eq_ignore_ascii_case(raw))
            .ok_or_else(|| AppError::BadRequest(format!("unknown time filter '{}'", raw)))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Total => "Total",
            Self::Cycle => "Cycle",
            Self::Week => "Week",
            Self::Day => "Day",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FighterRow {
    pub rank: u32,
    pub token_id: String,
    pub name: String,
    pub image: String,
    pub endurance: u32,
    pub endurance_delta: String,
    pub agility: u32,
    pub agility_delta: String,
    pub mental: u32,
    pub mental_delta: String,
    pub leadership: u32,
    pub leadership_delta: String,
    pub distance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainerRow {
    pub rank: u32,
    pub trainer: String,
    pub total_progress: String,
    pub endurance: String,
    pub agility: String,
    pub mental: String,
    pub leadership: String,
    pub distance: String,
    pub fighters_trained: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub rank: u32,
    pub wallet_address: String,
    pub total_distance: String,
    pub yoga_sessions: u32,
    pub meditation_sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", content = "rows", rename_all = "snake_case")]
pub enum LeaderboardRows {
    Fighters(Vec<FighterRow>),
    Trainers(Vec<TrainerRow>),
    Activity(Vec<ActivityRow>),
}

const FIGHTER_IMAGES: [(&str, &str); 12] = [
    ("ERNEST", "48"),
    ("SILVAA", "34"),
    ("ATHENA", "49"),
    ("DASHA", "39"),
    ("YOON", "41"),
    ("MARGOT", "10"),
    ("DEATH PUNCH", "05"),
    ("VIKTOR R.", "42"),
    ("KAT", "02"),
    ("BLAZIN", "08"),
    ("XIA", "12"),
    ("HADES", "28"),
];

/// Leaderboard portrait for a fighter name such as `"YOON #41"`.
pub fn fighter_image(full_name: &str) -> String {
    let name = full_name.split(" #").next().unwrap_or_default().trim();
    let number = FIGHTER_IMAGES
        .iter()
        .find(|(fighter, _)| *fighter == name)
        .map(|(_, number)| *number)
        .unwrap_or("01");
    format!("/assets/leaderboard/{:0>2}.jpg", number)
}

fn fighter(
    rank: u32,
    token_id: &str,
    name: &str,
    stats: [(u32, &str); 4],
    distance: &str,
) -> FighterRow {
    let [endurance, agility, mental, leadership] = stats;
    FighterRow {
        rank,
        token_id: token_id.to_string(),
        name: name.to_string(),
        image: fighter_image(name),
        endurance: endurance.0,
        endurance_delta: endurance.1.to_string(),
        agility: agility.0,
        agility_delta: agility.1.to_string(),
        mental: mental.0,
        mental_delta: mental.1.to_string(),
        leadership: leadership.0,
        leadership_delta: leadership.1.to_string(),
        distance: distance.to_string(),
    }
}

fn fighter_base() -> Vec<FighterRow> {
    vec![
        fighter(1, "48", "ERNEST #48", [(97, "+4"), (88, "+1"), (84, "+0"), (91, "+2")], "142.6 km"),
        fighter(2, "34", "SILVAA #34", [(95, "+3"), (90, "+2"), (86, "+1"), (87, "+0")], "131.0 km"),
        fighter(3, "49", "ATHENA #49", [(93, "+2"), (92, "+3"), (89, "+2"), (85, "+1")], "118.4 km"),
        fighter(4, "39", "DASHA #39", [(90, "+1"), (86, "+0"), (91, "+3"), (83, "+0")], "102.9 km"),
        fighter(5, "41", "YOON #41", [(88, "+2"), (84, "+1"), (82, "+0"), (90, "+2")], "96.3 km"),
        fighter(6, "10", "MARGOT #10", [(86, "+0"), (89, "+2"), (80, "+1"), (84, "+0")], "88.7 km"),
    ]
}

fn trainer(rank: u32, trainer: &str, progress: [&str; 6], fighters_trained: u32) -> TrainerRow {
    let [total_progress, endurance, agility, mental, leadership, distance] = progress;
    TrainerRow {
        rank,
        trainer: trainer.to_string(),
        total_progress: total_progress.to_string(),
        endurance: endurance.to_string(),
        agility: agility.to_string(),
        mental: mental.to_string(),
        leadership: leadership.to_string(),
        distance: distance.to_string(),
        fighters_trained,
    }
}

fn trainer_base() -> Vec<TrainerRow> {
    vec![
        trainer(1, "0x7a3f...c21e", ["+38", "+14", "+9", "+8", "+7", "212.4 km"], 4),
        trainer(2, "0x19bd...04fa", ["+31", "+12", "+6", "+7", "+6", "188.0 km"], 3),
        trainer(3, "0xe5c0...9b17", ["+27", "+10", "+7", "+5", "+5", "164.2 km"], 3),
        trainer(4, "0x42aa...d3e8", ["+22", "+9", "+4", "+5", "+4", "139.9 km"], 2),
        trainer(5, "0x8c11...7f60", ["+18", "+7", "+4", "+4", "+3", "117.5 km"], 2),
    ]
}

fn activity(rank: u32, wallet: &str, total_distance: &str, yoga: u32, meditation: u32) -> ActivityRow {
    ActivityRow {
        rank,
        wallet_address: wallet.to_string(),
        total_distance: total_distance.to_string(),
        yoga_sessions: yoga,
        meditation_sessions: meditation,
    }
}

fn activity_base() -> Vec<ActivityRow> {
    vec![
        activity(1, "0x7a3f...c21e", "212.4 km", 6, 14),
        activity(2, "0x19bd...04fa", "188.0 km", 9, 11),
        activity(3, "0xe5c0...9b17", "164.2 km", 3, 17),
        activity(4, "0x42aa...d3e8", "139.9 km", 12, 5),
        activity(5, "0x8c11...7f60", "117.5 km", 4, 8),
    ]
}

// The first filter keeps the base ranks; later filters rotate and renumber.
fn rotate_for<T>(rows: Vec<T>, filter: TimeFilter, set_rank: impl Fn(&mut T, u32)) -> Vec<T> {
    let shift = filter.index();
    if shift == 0 || rows.is_empty() {
        return rows;
    }
    let len = rows.len();
    let mut rows = rows;
    rows.rotate_left(shift % len);
    for (idx, row) in rows.iter_mut().enumerate() {
        set_rank(row, idx as u32 + 1);
    }
    rows
}

pub fn leaderboard(view: LeaderboardView, filter: TimeFilter) -> LeaderboardRows {
    match view {
        LeaderboardView::Fighters => LeaderboardRows::Fighters(rotate_for(
            fighter_base(),
            filter,
            |row, rank| row.rank = rank,
        )),
        LeaderboardView::Trainers => LeaderboardRows::Trainers(rotate_for(
            trainer_base(),
            filter,
            |row, rank| row.rank = rank,
        )),
        LeaderboardView::Activity => LeaderboardRows::Activity(rotate_for(
            activity_base(),
            filter,
            |row, rank| row.rank = rank,
        )),
    }
}
