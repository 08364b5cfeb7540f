//! ClickHouse-backed document store.
//!
//! Games live in a `ReplacingMergeTree` ordered by `id` and versioned by
//! `archived_at`, so inserting a game that already exists replaces it once
//! parts merge. Reads use `FINAL` to see the deduplicated view immediately.
//!
//! # Table Layout
//!
//! One flat row per game. Player sub-records are spread into `white_*` /
//! `black_*` columns and optional sub-records become `Nullable` columns.

use super::DocumentStore;
use crate::config::ClickHouseConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chess_archive_core::{
    Analysis, Game, Opening, Player, Players, SourceKind, UserResult, Winner,
};
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};

/// Row structure matching the games table.
#[derive(Debug, Clone, PartialEq, Row, Serialize, Deserialize)]
pub struct GameRow {
    pub id: String,
    pub source: String,
    pub speed: String,
    pub duration: u32,
    pub status: String,
    pub user_result: String,
    pub played_at: i64,
    pub winner: String,
    pub pgn: String,
    pub opening_name: Option<String>,
    pub opening_eco: Option<String>,
    pub white_id: String,
    pub white_name: String,
    pub white_rating: u16,
    pub white_inaccuracy: Option<u16>,
    pub white_mistake: Option<u16>,
    pub white_blunder: Option<u16>,
    pub white_acpl: Option<u16>,
    pub black_id: String,
    pub black_name: String,
    pub black_rating: u16,
    pub black_inaccuracy: Option<u16>,
    pub black_mistake: Option<u16>,
    pub black_blunder: Option<u16>,
    pub black_acpl: Option<u16>,
    /// Version column for ReplacingMergeTree (Unix ms of the write).
    pub archived_at: u64,
}

type AnalysisColumns = (Option<u16>, Option<u16>, Option<u16>, Option<u16>);

fn analysis_columns(analysis: Option<Analysis>) -> AnalysisColumns {
    match analysis {
        Some(a) => (
            Some(a.inaccuracy),
            Some(a.mistake),
            Some(a.blunder),
            Some(a.acpl),
        ),
        None => (None, None, None, None),
    }
}

fn analysis_from_columns(columns: AnalysisColumns) -> Option<Analysis> {
    match columns {
        (Some(inaccuracy), Some(mistake), Some(blunder), Some(acpl)) => Some(Analysis {
            inaccuracy,
            mistake,
            blunder,
            acpl,
        }),
        _ => None,
    }
}

impl GameRow {
    /// Flatten a game into a row stamped with `archived_at`.
    pub fn from_game(game: &Game, archived_at: u64) -> Self {
        let (white_inaccuracy, white_mistake, white_blunder, white_acpl) =
            analysis_columns(game.players.white.analysis);
        let (black_inaccuracy, black_mistake, black_blunder, black_acpl) =
            analysis_columns(game.players.black.analysis);

        Self {
            id: game.id.clone(),
            source: game.source.to_string(),
            speed: game.speed.clone(),
            duration: game.duration,
            status: game.status.clone(),
            user_result: game.user_result.to_string(),
            played_at: game.played_at,
            winner: game.winner.as_str().to_string(),
            pgn: game.pgn.clone(),
            opening_name: game.opening.as_ref().map(|o| o.name.clone()),
            opening_eco: game.opening.as_ref().map(|o| o.eco.clone()),
            white_id: game.players.white.id.clone(),
            white_name: game.players.white.name.clone(),
            white_rating: game.players.white.rating,
            white_inaccuracy,
            white_mistake,
            white_blunder,
            white_acpl,
            black_id: game.players.black.id.clone(),
            black_name: game.players.black.name.clone(),
            black_rating: game.players.black.rating,
            black_inaccuracy,
            black_mistake,
            black_blunder,
            black_acpl,
            archived_at,
        }
    }

    /// Rebuild the canonical game from a stored row.
    pub fn into_game(self) -> Result<Game> {
        let source = match self.source.as_str() {
            "lichess" => SourceKind::Lichess,
            other => return Err(Error::Corrupt(format!("game {}: source '{}'", self.id, other))),
        };
        let user_result = match self.user_result.as_str() {
            "win" => UserResult::Win,
            "lose" => UserResult::Lose,
            "draw" => UserResult::Draw,
            other => {
                return Err(Error::Corrupt(format!(
                    "game {}: user_result '{}'",
                    self.id, other
                )));
            }
        };
        let opening = match (self.opening_name, self.opening_eco) {
            (Some(name), Some(eco)) => Some(Opening { name, eco }),
            _ => None,
        };

        Ok(Game {
            source,
            user_result,
            speed: self.speed,
            duration: self.duration,
            status: self.status,
            played_at: self.played_at,
            winner: Winner::from_label(&self.winner),
            pgn: self.pgn,
            opening,
            players: Players {
                white: Player {
                    id: self.white_id,
                    name: self.white_name,
                    rating: self.white_rating,
                    analysis: analysis_from_columns((
                        self.white_inaccuracy,
                        self.white_mistake,
                        self.white_blunder,
                        self.white_acpl,
                    )),
                },
                black: Player {
                    id: self.black_id,
                    name: self.black_name,
                    rating: self.black_rating,
                    analysis: analysis_from_columns((
                        self.black_inaccuracy,
                        self.black_mistake,
                        self.black_blunder,
                        self.black_acpl,
                    )),
                },
            },
            id: self.id,
        })
    }
}

/// DDL for the games table.
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
    id String,
    source LowCardinality(String),
    speed LowCardinality(String),
    duration UInt32,
    status LowCardinality(String),
    user_result LowCardinality(String),
    played_at Int64,
    winner LowCardinality(String),
    pgn String,
    opening_name Nullable(String),
    opening_eco Nullable(String),
    white_id String,
    white_name String,
    white_rating UInt16,
    white_inaccuracy Nullable(UInt16),
    white_mistake Nullable(UInt16),
    white_blunder Nullable(UInt16),
    white_acpl Nullable(UInt16),
    black_id String,
    black_name String,
    black_rating UInt16,
    black_inaccuracy Nullable(UInt16),
    black_mistake Nullable(UInt16),
    black_blunder Nullable(UInt16),
    black_acpl Nullable(UInt16),
    archived_at UInt64
) ENGINE = ReplacingMergeTree(archived_at)
ORDER BY id"#
    )
}

/// Document store on a ClickHouse table.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    table: String,
}

impl ClickHouseStore {
    /// Create a new store. Does not touch the network.
    pub fn new(config: &ClickHouseConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);
        if let Some(user) = &config.user {
            client = client.with_user(user);
        }
        if let Some(password) = &config.password {
            client = client.with_password(password);
        }

        tracing::info!(
            "ClickHouse store initialized: url={}, database={}, table={}",
            config.url,
            config.database,
            config.table
        );

        Self {
            client,
            table: config.table.clone(),
        }
    }

    /// Create the games table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client
            .query(&create_table_sql(&self.table))
            .execute()
            .await?;
        Ok(())
    }

    /// Round-trip a trivial query so an unreachable server fails the run
    /// before anything is fetched.
    pub async fn health_check(&self) -> Result<()> {
        let one: u8 = self.client.query("SELECT 1").fetch_one().await?;
        if one != 1 {
            return Err(Error::Corrupt(format!("SELECT 1 returned {}", one)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ClickHouseStore {
    async fn upsert(&self, game: &Game) -> Result<String> {
        let archived_at = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let row = GameRow::from_game(game, archived_at);

        let mut insert = self.client.insert::<GameRow>(&self.table)?;
        insert.write(&row).await?;
        insert.end().await?;

        Ok(game.id.clone())
    }

    async fn latest(&self) -> Result<Option<Game>> {
        let sql = format!(
            "SELECT ?fields FROM {} FINAL ORDER BY played_at DESC LIMIT 1",
            self.table
        );
        let row = self
            .client
            .query(&sql)
            .fetch_optional::<GameRow>()
            .await?;

        row.map(GameRow::into_game).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(analysis: Option<Analysis>, opening: Option<Opening>) -> Game {
        Game {
            id: "lichess:q7ZvsdUF".to_string(),
            source: SourceKind::Lichess,
            speed: "rapid".to_string(),
            duration: 900,
            status: "outoftime".to_string(),
            user_result: UserResult::Lose,
            played_at: 1_700_000_000_000,
            winner: Winner::Black,
            pgn: "1. d4 Nf6".to_string(),
            opening,
            players: Players {
                white: Player {
                    id: "alice".to_string(),
                    name: "Alice".to_string(),
                    rating: 1850,
                    analysis,
                },
                black: Player {
                    id: "bob".to_string(),
                    name: "Bob".to_string(),
                    rating: 1910,
                    analysis: None,
                },
            },
        }
    }

    #[test]
    fn test_row_flattens_optional_records() {
        let analysis = Analysis {
            inaccuracy: 4,
            mistake: 2,
            blunder: 1,
            acpl: 55,
        };
        let row = GameRow::from_game(&game(Some(analysis), None), 42);

        assert_eq!(row.winner, "black");
        assert_eq!(row.user_result, "lose");
        assert_eq!(row.white_acpl, Some(55));
        assert_eq!(row.black_acpl, None);
        assert_eq!(row.opening_eco, None);
        assert_eq!(row.archived_at, 42);
    }

    #[test]
    fn test_row_restores_game() {
        let original = game(
            Some(Analysis {
                inaccuracy: 1,
                mistake: 0,
                blunder: 0,
                acpl: 12,
            }),
            Some(Opening {
                name: "Indian Defense".to_string(),
                eco: "A45".to_string(),
            }),
        );
        let restored = GameRow::from_game(&original, 1).into_game().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_partial_analysis_columns_are_absent() {
        let mut row = GameRow::from_game(&game(None, None), 1);
        row.white_acpl = Some(10);
        let restored = row.into_game().unwrap();
        assert!(restored.players.white.analysis.is_none());
    }

    #[test]
    fn test_unknown_source_is_corrupt() {
        let mut row = GameRow::from_game(&game(None, None), 1);
        row.source = "fics".to_string();
        assert!(matches!(row.into_game(), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("games");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS games"));
        assert!(sql.contains("ReplacingMergeTree(archived_at)"));
        assert!(sql.contains("ORDER BY id"));
    }
}
