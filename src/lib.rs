pub mod bgg;
pub mod core;
pub mod export;
pub mod stats;

pub type GameId = u32;

/// Inclusive player-count range suggested by the community poll.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PlayerRange {
    pub min: u32,
    pub max: u32
}

/// Rank of a game inside one of the types/families it belongs to.
#[derive(Debug, PartialEq, Clone)]
pub struct TypeRank {
    pub name: String,
    pub rank: u32
}

/// Everything the XML API tells about a single game.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct GameStats {
    pub id: GameId,
    pub name: String,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub weight: Option<f64>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub age: Option<u32>,
    pub community_age: Option<u32>,
    pub designers: Vec<String>,
    pub artists: Vec<String>,
    pub categories: Vec<String>,
    pub recommended_players: Option<PlayerRange>,
    pub best_players: Option<PlayerRange>,
    pub playing_time_min: Option<u32>,
    pub playing_time_max: Option<u32>,
    pub types: Vec<TypeRank>
}

#[derive(Debug, PartialEq, Clone)]
pub struct RankedGameRow {
    pub rank: u32,
    pub game: GameStats
}

pub const COLUMNS: [&str; 19] = [
    "Rank", "Name", "Year", "Rating", "Weight",
    "Min Players", "Max Players", "Age", "Community Age",
    "Designers", "Artists", "Categories",
    "Community Players Min", "Community Players Max",
    "Best Players Min", "Best Players Max",
    "Playing Time Min", "Playing Time Max", "Type"
];

impl RankedGameRow {
    pub fn new(rank: u32, game: GameStats) -> RankedGameRow {
        RankedGameRow { rank, game }
    }

    /// Cells in `COLUMNS` order. Unknown values become empty cells.
    pub fn to_record(&self) -> Vec<String> {
        let g = &self.game;
        let (rec_min, rec_max) = split_range(g.recommended_players);
        let (best_min, best_max) = split_range(g.best_players);
        vec![
            self.rank.to_string(),
            g.name.clone(),
            cell(g.year),
            cell(g.rating),
            cell(g.weight),
            cell(g.min_players),
            cell(g.max_players),
            cell(g.age),
            cell(g.community_age),
            g.designers.join("; "),
            g.artists.join("; "),
            g.categories.join("; "),
            cell(rec_min),
            cell(rec_max),
            cell(best_min),
            cell(best_max),
            cell(g.playing_time_min),
            cell(g.playing_time_max),
            g.type_list()
        ]
    }
}

impl GameStats {
    /// "Strategy Game(291), Family(340)"
    pub fn type_list(&self) -> String {
        self.types.iter()
            .map(|t| format!("{}({})", t.name, t.rank))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn split_range(range: Option<PlayerRange>) -> (Option<u32>, Option<u32>) {
    match range {
        Some(r) => (Some(r.min), Some(r.max)),
        None => (None, None)
    }
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
