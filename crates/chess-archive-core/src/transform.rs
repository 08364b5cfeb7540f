//! Source-to-canonical transformation.
//!
//! [`Transformer::transform`] maps one [`RawGame`] into a [`Game`]. It is a
//! pure function of its input and the tracked user: no clock, no I/O, so two
//! calls on the same record always yield identical games.

use crate::game::{Analysis, Game, Opening, Player, Players, Side, SourceKind, UserResult, Winner};
use crate::raw::{LichessAnalysis, LichessGame, LichessPlayer, RawGame};
use crate::{Error, PLAYED_AT_FORMAT, Result};
use chrono::FixedOffset;
use std::collections::BTreeMap;

/// A file artifact derived from a game, ready for a file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFile {
    /// Display name: `"<played_at> | <score> | <white> - <black>.pgn"`.
    pub name: String,
    pub description: String,
    /// PGN body.
    pub content: String,
}

/// Maps provider records into canonical games for one tracked user.
#[derive(Debug, Clone)]
pub struct Transformer {
    tracked_user_id: String,
    display_offset: FixedOffset,
}

impl Transformer {
    /// Create a transformer for the given tracked user.
    ///
    /// # Arguments
    ///
    /// * `tracked_user_id` - Provider user ID whose perspective `UserResult` takes
    /// * `display_offset` - UTC offset used when rendering artifact names
    pub fn new(tracked_user_id: impl Into<String>, display_offset: FixedOffset) -> Self {
        Self {
            tracked_user_id: tracked_user_id.into().to_lowercase(),
            display_offset,
        }
    }

    pub fn tracked_user_id(&self) -> &str {
        &self.tracked_user_id
    }

    /// Transform one raw record into a canonical game.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedSourceKind`] for records from an unknown provider
    /// - [`Error::NilRecord`] for records without an identity
    /// - [`Error::MissingPlayerName`] when a player name cannot be resolved
    /// - [`Error::InvalidField`] when a numeric field overflows its canonical type
    pub fn transform(&self, raw: &RawGame) -> Result<Game> {
        match raw {
            RawGame::Lichess(game) => self.transform_lichess(game),
            RawGame::Unsupported { kind, .. } => Err(Error::UnsupportedSourceKind(kind.clone())),
        }
    }

    fn transform_lichess(&self, lg: &LichessGame) -> Result<Game> {
        if lg.id.is_empty() {
            return Err(Error::NilRecord);
        }

        let white = lichess_player(&lg.players.white, Side::White)?;
        let black = lichess_player(&lg.players.black, Side::Black)?;

        let winner = match lg.winner.as_deref() {
            Some("white") => Winner::White,
            Some("black") => Winner::Black,
            Some("") | None => Winner::None,
            Some(other) => {
                return Err(Error::InvalidField {
                    field: "winner",
                    reason: format!("unexpected value '{}'", other),
                });
            }
        };

        let players = Players { white, black };
        let user_result = self.user_result(winner, &players);

        // Non-standard variants are more telling than the speed bucket.
        let speed = if !lg.variant.is_empty() && lg.variant != "standard" {
            lg.variant.clone()
        } else {
            lg.speed.clone()
        };

        let duration = lg
            .last_move_at
            .map(|last| last.saturating_sub(lg.created_at).max(0) / 1000)
            .map(|secs| u32::try_from(secs).unwrap_or(u32::MAX))
            .unwrap_or(0);

        let opening = lg.opening.as_ref().map(|o| Opening {
            name: o.name.clone(),
            eco: o.eco.clone(),
        });

        Ok(Game {
            id: Game::qualified_id(SourceKind::Lichess, &lg.id),
            source: SourceKind::Lichess,
            speed,
            duration,
            status: lg.status.clone(),
            user_result,
            played_at: lg.created_at,
            winner,
            pgn: lg.pgn.clone().unwrap_or_else(|| lg.moves.clone()),
            opening,
            players,
        })
    }

    /// Derive the result from the tracked user's perspective.
    fn user_result(&self, winner: Winner, players: &Players) -> UserResult {
        match winner.side() {
            None => UserResult::Draw,
            Some(side) if players.get(side).id.eq_ignore_ascii_case(&self.tracked_user_id) => {
                UserResult::Win
            }
            Some(_) => UserResult::Lose,
        }
    }

    /// File projection used by file-store sinks.
    pub fn to_file(&self, game: &Game) -> GameFile {
        let name = format!(
            "{} | {} | {} - {}.pgn",
            game.played_at_time(self.display_offset).format(PLAYED_AT_FORMAT),
            game.score(),
            game.players.white.name,
            game.players.black.name,
        );

        GameFile {
            name,
            description: format!("{} game {}", game.source, game.id),
            content: game.pgn.clone(),
        }
    }

    /// Flat field projection for stores that only take string key/values.
    pub fn to_field_map(&self, game: &Game) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), game.id.clone());
        fields.insert("source".to_string(), game.source.to_string());
        fields.insert("speed".to_string(), game.speed.clone());
        fields.insert("status".to_string(), game.status.clone());
        fields.insert("result".to_string(), game.user_result.to_string());
        fields.insert("played_at".to_string(), game.played_at.to_string());
        fields.insert("winner".to_string(), game.winner.as_str().to_string());
        fields.insert("white".to_string(), game.players.white.name.clone());
        fields.insert(
            "white_rating".to_string(),
            game.players.white.rating.to_string(),
        );
        fields.insert("black".to_string(), game.players.black.name.clone());
        fields.insert(
            "black_rating".to_string(),
            game.players.black.rating.to_string(),
        );
        if let Some(opening) = &game.opening {
            fields.insert("opening".to_string(), opening.name.clone());
            fields.insert("eco".to_string(), opening.eco.clone());
        }
        fields
    }
}

fn lichess_player(p: &LichessPlayer, side: Side) -> Result<Player> {
    let (id, name) = match (&p.user, p.ai_level) {
        (Some(user), _) if !user.name.is_empty() => (user.id.clone(), user.name.clone()),
        (_, Some(level)) => (String::new(), format!("Stockfish level {}", level)),
        _ => return Err(Error::MissingPlayerName(side)),
    };

    Ok(Player {
        id,
        name,
        rating: to_u16("rating", p.rating.unwrap_or(0))?,
        analysis: p.analysis.as_ref().map(lichess_analysis).transpose()?,
    })
}

fn lichess_analysis(a: &LichessAnalysis) -> Result<Analysis> {
    Ok(Analysis {
        inaccuracy: to_u16("analysis.inaccuracy", a.inaccuracy)?,
        mistake: to_u16("analysis.mistake", a.mistake)?,
        blunder: to_u16("analysis.blunder", a.blunder)?,
        acpl: to_u16("analysis.acpl", a.acpl)?,
    })
}

fn to_u16(field: &'static str, value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::InvalidField {
        field,
        reason: format!("{} does not fit in u16", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LICHESS_KIND;
    use crate::raw::{LichessOpening, LichessPlayers, LichessUser};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn user(name: &str) -> LichessPlayer {
        LichessPlayer {
            user: Some(LichessUser {
                name: name.to_string(),
                id: name.to_lowercase(),
            }),
            rating: Some(1800),
            ..Default::default()
        }
    }

    fn lichess(winner: Option<&str>) -> RawGame {
        RawGame::Lichess(LichessGame {
            id: "q7ZvsdUF".to_string(),
            rated: true,
            variant: "standard".to_string(),
            speed: "blitz".to_string(),
            created_at: 1_514_505_150_384,
            last_move_at: Some(1_514_505_592_843),
            status: "resign".to_string(),
            players: LichessPlayers {
                white: user("Alice"),
                black: user("Bob"),
            },
            winner: winner.map(str::to_string),
            opening: Some(LichessOpening {
                eco: "B01".to_string(),
                name: "Scandinavian Defense".to_string(),
                ply: 2,
            }),
            moves: "e4 d5".to_string(),
            pgn: Some("1. e4 d5".to_string()),
            clock: None,
        })
    }

    #[test]
    fn test_transform_fields() {
        let t = Transformer::new("alice", utc());
        let game = t.transform(&lichess(Some("white"))).unwrap();

        assert_eq!(game.id, "lichess:q7ZvsdUF");
        assert_eq!(game.source, SourceKind::Lichess);
        assert_eq!(game.speed, "blitz");
        assert_eq!(game.duration, 442);
        assert_eq!(game.status, "resign");
        assert_eq!(game.played_at, 1_514_505_150_384);
        assert_eq!(game.winner, Winner::White);
        assert_eq!(game.pgn, "1. e4 d5");
        assert_eq!(game.players.white.name, "Alice");
        assert_eq!(game.players.black.rating, 1800);
        assert_eq!(game.opening.unwrap().eco, "B01");
    }

    #[test]
    fn test_black_winner_tracked_black_is_win() {
        let t = Transformer::new("bob", utc());
        let game = t.transform(&lichess(Some("black"))).unwrap();
        assert_eq!(game.user_result, UserResult::Win);
    }

    #[test]
    fn test_no_winner_is_draw() {
        let t = Transformer::new("bob", utc());
        let game = t.transform(&lichess(None)).unwrap();
        assert_eq!(game.user_result, UserResult::Draw);
        assert_eq!(game.winner, Winner::None);
    }

    #[test]
    fn test_white_winner_tracked_black_is_lose() {
        let t = Transformer::new("bob", utc());
        let game = t.transform(&lichess(Some("white"))).unwrap();
        assert_eq!(game.user_result, UserResult::Lose);
    }

    #[test]
    fn test_tracked_user_case_insensitive() {
        let t = Transformer::new("Alice", utc());
        assert_eq!(t.tracked_user_id(), "alice");
        let game = t.transform(&lichess(Some("white"))).unwrap();
        assert_eq!(game.user_result, UserResult::Win);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let t = Transformer::new("alice", utc());
        let raw = lichess(Some("black"));
        assert_eq!(t.transform(&raw).unwrap(), t.transform(&raw).unwrap());
    }

    #[test]
    fn test_unsupported_kind() {
        let t = Transformer::new("alice", utc());
        let raw = RawGame::decode("chesscom", r#"{"uuid":"1"}"#).unwrap();
        match t.transform(&raw) {
            Err(Error::UnsupportedSourceKind(kind)) => assert_eq!(kind, "chesscom"),
            other => panic!("expected UnsupportedSourceKind, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_id_is_nil_record() {
        let t = Transformer::new("alice", utc());
        let raw = RawGame::decode(LICHESS_KIND, "{}").unwrap();
        assert!(matches!(t.transform(&raw), Err(Error::NilRecord)));
    }

    #[test]
    fn test_ai_opponent_name() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(Some("white")) else {
            unreachable!()
        };
        lg.players.black = LichessPlayer {
            ai_level: Some(5),
            ..Default::default()
        };
        let game = t.transform(&RawGame::Lichess(lg)).unwrap();
        assert_eq!(game.players.black.name, "Stockfish level 5");
        assert!(game.players.black.id.is_empty());
        assert_eq!(game.players.black.rating, 0);
    }

    #[test]
    fn test_anonymous_player_rejected() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(Some("white")) else {
            unreachable!()
        };
        lg.players.white = LichessPlayer::default();
        assert!(matches!(
            t.transform(&RawGame::Lichess(lg)),
            Err(Error::MissingPlayerName(Side::White))
        ));
    }

    #[test]
    fn test_analysis_present_only_when_provided() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(Some("white")) else {
            unreachable!()
        };
        lg.players.white.analysis = Some(LichessAnalysis {
            inaccuracy: 3,
            mistake: 1,
            blunder: 2,
            acpl: 41,
        });
        let game = t.transform(&RawGame::Lichess(lg)).unwrap();
        let analysis = game.players.white.analysis.unwrap();
        assert_eq!(analysis.blunder, 2);
        assert_eq!(analysis.acpl, 41);
        assert!(game.players.black.analysis.is_none());
    }

    #[test]
    fn test_rating_overflow() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(Some("white")) else {
            unreachable!()
        };
        lg.players.white.rating = Some(70_000);
        assert!(matches!(
            t.transform(&RawGame::Lichess(lg)),
            Err(Error::InvalidField { field: "rating", .. })
        ));
    }

    #[test]
    fn test_duration_with_extreme_timestamps() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(None) else {
            unreachable!()
        };
        lg.created_at = i64::MIN;
        lg.last_move_at = Some(i64::MAX);
        assert_eq!(t.transform(&RawGame::Lichess(lg.clone())).unwrap().duration, u32::MAX);

        lg.created_at = i64::MAX;
        lg.last_move_at = Some(i64::MIN);
        assert_eq!(t.transform(&RawGame::Lichess(lg)).unwrap().duration, 0);
    }

    #[test]
    fn test_variant_overrides_speed() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(None) else {
            unreachable!()
        };
        lg.variant = "chess960".to_string();
        assert_eq!(t.transform(&RawGame::Lichess(lg)).unwrap().speed, "chess960");
    }

    #[test]
    fn test_missing_pgn_falls_back_to_moves() {
        let t = Transformer::new("alice", utc());
        let RawGame::Lichess(mut lg) = lichess(None) else {
            unreachable!()
        };
        lg.pgn = None;
        lg.last_move_at = None;
        let game = t.transform(&RawGame::Lichess(lg)).unwrap();
        assert_eq!(game.pgn, "e4 d5");
        assert_eq!(game.duration, 0);
    }

    #[test]
    fn test_file_projection() {
        let t = Transformer::new("alice", utc());
        let game = t.transform(&lichess(Some("black"))).unwrap();
        let file = t.to_file(&game);
        assert_eq!(file.name, "2017-12-28 23:52:30 | 0-1 | Alice - Bob.pgn");
        assert_eq!(file.description, "lichess game lichess:q7ZvsdUF");
        assert_eq!(file.content, "1. e4 d5");
    }

    #[test]
    fn test_file_projection_uses_offset() {
        let t = Transformer::new("alice", FixedOffset::east_opt(3600).unwrap());
        let game = t.transform(&lichess(None)).unwrap();
        let file = t.to_file(&game);
        assert!(file.name.starts_with("2017-12-29 00:52:30 | 1/2-1/2 |"));
    }

    #[test]
    fn test_field_map_projection() {
        let t = Transformer::new("alice", utc());
        let game = t.transform(&lichess(Some("white"))).unwrap();
        let fields = t.to_field_map(&game);
        assert_eq!(fields["id"], "lichess:q7ZvsdUF");
        assert_eq!(fields["result"], "win");
        assert_eq!(fields["played_at"], "1514505150384");
        assert_eq!(fields["winner"], "white");
        assert_eq!(fields["eco"], "B01");
        assert_eq!(fields["black_rating"], "1800");
    }
}
