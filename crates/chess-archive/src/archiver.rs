//! Run orchestration.
//!
//! One run moves the archive forward by at most one batch:
//!
//! ```text
//! ┌───────────────────┐  since  ┌────────────┐  raw   ┌─────────────┐
//! │ WatermarkResolver │────────▶│ GameSource │───────▶│ Transformer │
//! └───────────────────┘         └────────────┘        └──────┬──────┘
//!                                                            │ games
//!                                    ┌───────────────────────┘
//!                                    ▼
//!                      JoinSet: one task per (game, sink)
//!                      bounded by a Semaphore (max_in_flight)
//!                      first error aborts the rest
//!                                    │ all other sinks done
//!                                    ▼
//!                      watermark sink, one game at a time
//!                      in play order, stop at first error
//! ```
//!
//! Every step is causal: the watermark read finishes before the listing
//! call, and the whole batch is transformed before any sink is written.
//! A failed run leaves no recovery state; the next run starts again from
//! whatever the watermark store reports. The sink backing the watermark is
//! written last so that it never holds a game some other sink is missing,
//! and never holds a game newer than one it is missing itself.

use crate::sink::Sink;
use crate::source::GameSource;
use crate::watermark::WatermarkResolver;
use crate::{Error, Result};
use chess_archive_core::metrics::{increment, record_run, set_gauge};
use chess_archive_core::{Game, Transformer};
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-run knobs.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Account whose games are listed.
    pub username: String,
    /// Maximum number of games processed in one run.
    pub batch_limit: usize,
    /// Maximum number of (game, sink) writes running at once.
    pub max_in_flight: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Exclusive lower bound passed to the source (Unix ms, 0 on first run).
    pub since: i64,
    /// Records returned by the source.
    pub fetched: usize,
    /// Records beyond the batch limit, left for the next run.
    pub deferred: usize,
    /// Games written to every sink.
    pub archived: usize,
    /// Individual (game, sink) writes.
    pub writes: usize,
    /// `played_at` of the newest game archived by this run.
    pub watermark_after: Option<i64>,
}

/// Incremental sync pipeline over injected collaborators.
pub struct Archiver {
    config: ArchiverConfig,
    source: Arc<dyn GameSource>,
    watermark: Arc<dyn WatermarkResolver>,
    transformer: Arc<Transformer>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Archiver {
    pub fn new(
        config: ArchiverConfig,
        source: Arc<dyn GameSource>,
        watermark: Arc<dyn WatermarkResolver>,
        transformer: Arc<Transformer>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Self {
        Self {
            config,
            source,
            watermark,
            transformer,
            sinks,
        }
    }

    /// Names of the configured sinks, in fan-out order.
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Execute one run.
    pub async fn run(&self) -> Result<RunStats> {
        let started = Instant::now();
        let result = self.run_inner().await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(stats) => {
                record_run("success", elapsed);
                if let Some(mark) = stats.watermark_after {
                    set_gauge("archive_watermark_played_at", mark as f64);
                }
                tracing::info!(
                    since = stats.since,
                    fetched = stats.fetched,
                    deferred = stats.deferred,
                    archived = stats.archived,
                    writes = stats.writes,
                    watermark_after = ?stats.watermark_after,
                    elapsed_secs = elapsed,
                    "archive run complete"
                );
            }
            Err(e) => {
                record_run("failure", elapsed);
                tracing::error!(error = %e, elapsed_secs = elapsed, "archive run failed");
            }
        }

        result
    }

    async fn run_inner(&self) -> Result<RunStats> {
        // 1. Watermark
        let mark = self.watermark.last_known().await?;
        let since = mark.as_ref().map_or(0, |m| m.played_at);
        match &mark {
            Some(m) => tracing::info!(
                resolver = self.watermark.name(),
                game_id = %m.game_id,
                since,
                "resolved watermark"
            ),
            None => tracing::info!(
                resolver = self.watermark.name(),
                "no archived games, fetching from the beginning"
            ),
        }

        // 2. Fetch
        let mut raw = self
            .source
            .list_games(&self.config.username, since, self.config.batch_limit)
            .await
            .map_err(|e| Error::source_fetch(self.source.name(), e))?;

        let fetched = raw.len();
        let deferred = fetched.saturating_sub(self.config.batch_limit);
        raw.truncate(self.config.batch_limit);
        increment("archive_games_fetched_total", fetched as u64);
        if deferred > 0 {
            increment("archive_games_deferred_total", deferred as u64);
            tracing::info!(
                deferred,
                batch_limit = self.config.batch_limit,
                "batch limit reached, remaining games left for the next run"
            );
        }

        // 3. Transform the whole batch before touching any sink
        let games = raw
            .iter()
            .enumerate()
            .map(|(index, record)| {
                self.transformer
                    .transform(record)
                    .map_err(|source| Error::Transform { index, source })
            })
            .collect::<Result<Vec<Game>>>()?;

        let watermark_after = games.iter().map(|g| g.played_at).max();
        let mut stats = RunStats {
            since,
            fetched,
            deferred,
            archived: 0,
            writes: 0,
            watermark_after,
        };

        if games.is_empty() {
            return Ok(stats);
        }

        // 4. Fan out
        let count = games.len();
        stats.writes = self.fan_out(games.into_iter().map(Arc::new).collect()).await?;
        stats.archived = count;
        increment("archive_games_archived_total", stats.archived as u64);

        Ok(stats)
    }

    /// Write every game to every sink. Returns the number of writes.
    ///
    /// Sinks other than the one backing the watermark go first, concurrently.
    /// The watermark sink is only written once all of them have succeeded.
    async fn fan_out(&self, games: Vec<Arc<Game>>) -> Result<usize> {
        let backing = self.watermark.backing_sink();
        let (committing, leading): (Vec<_>, Vec<_>) = self
            .sinks
            .iter()
            .cloned()
            .partition(|sink| Some(sink.name()) == backing);

        let mut writes = self.write_concurrently(&games, &leading).await?;
        if !committing.is_empty() {
            writes += write_in_play_order(&games, &committing).await?;
        }
        Ok(writes)
    }

    /// The first failing unit aborts everything still queued or in flight.
    async fn write_concurrently(&self, games: &[Arc<Game>], sinks: &[Arc<dyn Sink>]) -> Result<usize> {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();

        for game in games {
            for sink in sinks {
                let game = Arc::clone(game);
                let sink = Arc::clone(sink);
                let permits = Arc::clone(&permits);
                tasks.spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Task(e.to_string()))?;
                    write_one(sink.as_ref(), &game).await
                });
            }
        }

        let mut writes = 0;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => {
                    writes += 1;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Error::Task(e.to_string()),
            };

            let abandoned = tasks.len();
            tasks.shutdown().await;
            tracing::warn!(abandoned, "fan-out aborted after first failure");
            return Err(failure);
        }

        Ok(writes)
    }
}

/// Sequential writes, oldest game first. On failure the sink holds exactly
/// the games played before the failing one, so its newest game is still a
/// valid watermark.
async fn write_in_play_order(games: &[Arc<Game>], sinks: &[Arc<dyn Sink>]) -> Result<usize> {
    let mut ordered: Vec<&Arc<Game>> = games.iter().collect();
    ordered.sort_by(|a, b| a.played_at.cmp(&b.played_at).then_with(|| a.id.cmp(&b.id)));

    let mut writes = 0;
    for game in ordered {
        for sink in sinks {
            write_one(sink.as_ref(), game).await?;
            writes += 1;
        }
    }
    Ok(writes)
}

async fn write_one(sink: &dyn Sink, game: &Game) -> Result<()> {
    let started = Instant::now();
    let result = sink.put(game).await;
    histogram!("sink_write_duration_seconds", "sink" => sink.name())
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(written) => {
            counter!("sink_writes_total", "sink" => sink.name()).increment(1);
            tracing::debug!(sink = sink.name(), game_id = %game.id, %written, "archived game");
            Ok(())
        }
        Err(e) => {
            counter!("sink_errors_total", "sink" => sink.name()).increment(1);
            Err(Error::sink_write(sink.name(), game.id.clone(), e))
        }
    }
}
