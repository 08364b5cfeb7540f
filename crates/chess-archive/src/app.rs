//! Wiring from [`Config`] to a ready [`Archiver`].

use crate::archiver::{Archiver, ArchiverConfig};
use crate::config::{Config, SinkKind};
use crate::sink::{
    ClickHouseStore, DocumentSink, DocumentStore, FileSink, FileStore, MemoryDocumentStore,
    MemoryFileStore, S3Store, Sink,
};
use crate::source::{GameSource, LichessClient, RateLimiter};
use crate::watermark::{DocumentWatermark, FileWatermark, WatermarkResolver};
use crate::{Error, Result};
use chess_archive_core::Transformer;
use std::sync::Arc;

/// Backing stores selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stores {
    /// ClickHouse and S3, as configured.
    Remote,
    /// In-process stores; nothing leaves the process except source requests.
    Memory,
}

/// Build the archiver and all of its collaborators.
///
/// `limiter` is shared by every source client built in the process.
pub async fn build_archiver(config: &Config, limiter: RateLimiter, stores: Stores) -> Result<Archiver> {
    let transformer = Arc::new(Transformer::new(
        config.lichess.user_id.clone(),
        config.display_offset,
    ));

    let source: Arc<dyn GameSource> = Arc::new(LichessClient::new(
        &config.lichess,
        config.timeout,
        limiter,
    )?);

    let mut document_store: Option<Arc<dyn DocumentStore>> = None;
    let mut file_store: Option<Arc<dyn FileStore>> = None;
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(config.sinks.len());

    for kind in &config.sinks {
        match kind {
            SinkKind::Document => {
                let store: Arc<dyn DocumentStore> = match stores {
                    Stores::Remote => {
                        let store = ClickHouseStore::new(&config.clickhouse);
                        store.health_check().await?;
                        store.ensure_schema().await?;
                        Arc::new(store)
                    }
                    Stores::Memory => Arc::new(MemoryDocumentStore::new()),
                };
                sinks.push(Arc::new(DocumentSink::new(store.clone())));
                document_store = Some(store);
            }
            SinkKind::File => {
                let store: Arc<dyn FileStore> = match stores {
                    Stores::Remote => {
                        let bucket = config.s3_bucket.clone().ok_or_else(|| {
                            Error::Config("S3_BUCKET is required for the file sink".into())
                        })?;
                        Arc::new(S3Store::from_env(bucket).await)
                    }
                    Stores::Memory => Arc::new(MemoryFileStore::new()),
                };
                sinks.push(Arc::new(FileSink::new(
                    store.clone(),
                    config.archive_folder.clone(),
                    transformer.clone(),
                )));
                file_store = Some(store);
            }
        }
    }

    let watermark: Arc<dyn WatermarkResolver> = match config.watermark_source {
        SinkKind::Document => Arc::new(DocumentWatermark::new(document_store.ok_or_else(
            || Error::Config("watermark source 'document' is not an enabled sink".into()),
        )?)),
        SinkKind::File => Arc::new(FileWatermark::new(
            file_store.ok_or_else(|| {
                Error::Config("watermark source 'file' is not an enabled sink".into())
            })?,
            config.archive_folder.clone(),
        )),
    };

    tracing::info!(
        sinks = ?config.sinks,
        watermark = watermark.name(),
        dry_run = matches!(stores, Stores::Memory),
        "archiver assembled"
    );

    Ok(Archiver::new(
        ArchiverConfig {
            username: config.lichess.username.clone(),
            batch_limit: config.batch_limit,
            max_in_flight: config.max_in_flight,
        },
        source,
        watermark,
        transformer,
        sinks,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClickHouseConfig, Environment, LichessConfig};
    use chrono::FixedOffset;
    use std::time::Duration;

    fn config(sinks: Vec<SinkKind>, watermark_source: SinkKind) -> Config {
        config_with_clickhouse(sinks, watermark_source, ClickHouseConfig::default())
    }

    fn config_with_clickhouse(
        sinks: Vec<SinkKind>,
        watermark_source: SinkKind,
        clickhouse: ClickHouseConfig,
    ) -> Config {
        Config {
            environment: Environment::Local,
            timeout: Duration::from_secs(5),
            lichess: LichessConfig {
                api_key: "k".into(),
                username: "Alice".into(),
                user_id: "alice".into(),
                requests_per_sec: 20,
                base_url: "http://127.0.0.1:9".into(),
            },
            batch_limit: 10,
            max_in_flight: 4,
            display_offset: FixedOffset::east_opt(0).unwrap(),
            sinks,
            watermark_source,
            archive_folder: "archive".into(),
            clickhouse,
            s3_bucket: None,
            metrics_port: 0,
            trigger_bind_addr: "127.0.0.1:0".into(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_wires_every_sink() {
        let cfg = config(vec![SinkKind::Document, SinkKind::File], SinkKind::File);
        let archiver = build_archiver(&cfg, RateLimiter::new(20), Stores::Memory)
            .await
            .unwrap();
        assert_eq!(archiver.sink_names(), vec!["document", "file"]);
    }

    #[tokio::test]
    async fn test_watermark_source_must_be_enabled() {
        let cfg = config(vec![SinkKind::Document], SinkKind::File);
        let result = build_archiver(&cfg, RateLimiter::new(20), Stores::Memory).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_remote_document_store_is_checked_before_use() {
        let cfg = config_with_clickhouse(
            vec![SinkKind::Document],
            SinkKind::Document,
            ClickHouseConfig {
                url: "http://127.0.0.1:9".into(),
                ..ClickHouseConfig::default()
            },
        );
        let result = build_archiver(&cfg, RateLimiter::new(20), Stores::Remote).await;
        assert!(matches!(result, Err(Error::ClickHouse(_))));
    }
}
