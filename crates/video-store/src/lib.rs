//! Upstream Video entity access
//!
//! The pipeline reads the Video entity and writes back only `status`,
//! `description` and `updated_at`. The status field is mutated under a
//! guarded transition so a double-enqueued job observes PROCESSING and
//! becomes a no-op. A PostgreSQL implementation backs deployments; an
//! in-memory implementation backs tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tokio_postgres::NoTls;
use tracing::info;
use videoseek_common::{
    CategoryRef, TimeInterval, VideoId, VideoRecord, VideoSource, VideoStatus,
};

/// Errors from the video store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Video {0} not found")]
    NotFound(VideoId),

    #[error("Database error: {0}")]
    Postgres(String),

    #[error("Corrupt record: {0}")]
    Data(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::Postgres(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Result of the guarded PENDING -> PROCESSING transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingClaim {
    /// The claim succeeded; the video was in `previous` before
    Started { previous: VideoStatus },
    /// Another run already holds the video
    AlreadyProcessing,
}

/// Title and upload timestamp used to decorate search results
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Access to the upstream Video entity
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a video with its category and manual intervals.
    async fn fetch_video(&self, id: VideoId) -> Result<VideoRecord>;

    /// Atomically claim the video for processing.
    ///
    /// A video already in PROCESSING is not re-claimed.
    async fn claim_processing(&self, id: VideoId) -> Result<ProcessingClaim>;

    /// Write a terminal (or re-queued) status.
    async fn mark_status(&self, id: VideoId, status: VideoStatus) -> Result<()>;

    /// Fill in the description when the entity has none.
    async fn backfill_description(&self, id: VideoId, description: &str) -> Result<()>;

    /// Resolve titles and upload timestamps for a set of videos.
    ///
    /// Unknown ids are silently absent from the result.
    async fn fetch_metadata(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMeta>>;
}

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("POSTGRES_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("POSTGRES_DB").unwrap_or_else(|_| "videoseek".to_string()),
            user: std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("POSTGRES_PASSWORD").unwrap_or_default(),
        }
    }
}

impl PostgresConfig {
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

/// PostgreSQL-backed video store
pub struct PostgresVideoStore {
    client: Mutex<tokio_postgres::Client>,
}

impl PostgresVideoStore {
    /// Connect to the database, spawning the connection driver.
    ///
    /// # Errors
    /// Returns a database error when the connection cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let (client, connection) =
            tokio_postgres::connect(&config.connection_string(), NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    /// Returns a database error when schema statements fail.
    pub async fn init_schema(&self) -> Result<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(
                r"
                CREATE TABLE IF NOT EXISTS categories (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS videos (
                    id BIGSERIAL PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    keywords JSONB NOT NULL DEFAULT '[]',
                    category_id BIGINT REFERENCES categories(id),
                    source_type TEXT NOT NULL,
                    video_path TEXT,
                    source_url TEXT,
                    status TEXT NOT NULL DEFAULT 'PENDING',
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS video_intervals (
                    id BIGSERIAL PRIMARY KEY,
                    video_id BIGINT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    ordinal INTEGER NOT NULL DEFAULT 0,
                    start_seconds DOUBLE PRECISION NOT NULL,
                    end_seconds DOUBLE PRECISION NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_video_intervals_video_id
                    ON video_intervals(video_id);
                ",
            )
            .await?;
        info!("Video store schema initialized");
        Ok(())
    }
}

fn row_to_record(row: &tokio_postgres::Row, intervals: Vec<TimeInterval>) -> Result<VideoRecord> {
    let id: VideoId = row.get("id");
    let source_type: String = row.get("source_type");
    let source = match source_type.as_str() {
        "UPLOAD" => {
            let path: Option<String> = row.get("video_path");
            VideoSource::Upload {
                path: PathBuf::from(path.unwrap_or_default()),
            }
        }
        "REMOTE_URL" => {
            let url: Option<String> = row.get("source_url");
            VideoSource::RemoteUrl {
                url: url.unwrap_or_default(),
            }
        }
        other => {
            return Err(StoreError::Data(format!(
                "video {id} has unknown source type '{other}'"
            )))
        }
    };
    let status_raw: String = row.get("status");
    let status = VideoStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Data(format!("video {id} has unknown status '{status_raw}'")))?;
    let keywords: serde_json::Value = row.get("keywords");
    let keywords = keywords
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let category = match (
        row.get::<_, Option<i64>>("category_id"),
        row.get::<_, Option<String>>("category_name"),
    ) {
        (Some(category_id), Some(name)) => Some(CategoryRef {
            id: category_id,
            name,
        }),
        _ => None,
    };

    Ok(VideoRecord {
        id,
        title: row.get("title"),
        description: row.get("description"),
        keywords,
        category,
        source,
        status,
        intervals,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl VideoStore for PostgresVideoStore {
    async fn fetch_video(&self, id: VideoId) -> Result<VideoRecord> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                r"
                SELECT v.id, v.title, v.description, v.keywords, v.category_id,
                       c.name AS category_name, v.source_type, v.video_path,
                       v.source_url, v.status, v.created_at, v.updated_at
                FROM videos v
                LEFT JOIN categories c ON c.id = v.category_id
                WHERE v.id = $1
                ",
                &[&id],
            )
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let interval_rows = client
            .query(
                r"
                SELECT start_seconds, end_seconds
                FROM video_intervals
                WHERE video_id = $1
                ORDER BY ordinal, start_seconds
                ",
                &[&id],
            )
            .await?;
        let intervals = interval_rows
            .iter()
            .map(|row| TimeInterval {
                start_seconds: row.get("start_seconds"),
                end_seconds: row.get("end_seconds"),
            })
            .collect();

        row_to_record(&row, intervals)
    }

    async fn claim_processing(&self, id: VideoId) -> Result<ProcessingClaim> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let row = transaction
            .query_opt("SELECT status FROM videos WHERE id = $1 FOR UPDATE", &[&id])
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let status_raw: String = row.get("status");
        let previous = VideoStatus::parse(&status_raw).ok_or_else(|| {
            StoreError::Data(format!("video {id} has unknown status '{status_raw}'"))
        })?;
        if previous == VideoStatus::Processing {
            return Ok(ProcessingClaim::AlreadyProcessing);
        }
        transaction
            .execute(
                "UPDATE videos SET status = $2, updated_at = now() WHERE id = $1",
                &[&id, &VideoStatus::Processing.as_str()],
            )
            .await?;
        transaction.commit().await?;
        Ok(ProcessingClaim::Started { previous })
    }

    async fn mark_status(&self, id: VideoId, status: VideoStatus) -> Result<()> {
        let client = self.client.lock().await;
        let updated = client
            .execute(
                "UPDATE videos SET status = $2, updated_at = now() WHERE id = $1",
                &[&id, &status.as_str()],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn backfill_description(&self, id: VideoId, description: &str) -> Result<()> {
        let client = self.client.lock().await;
        client
            .execute(
                r"
                UPDATE videos SET description = $2, updated_at = now()
                WHERE id = $1 AND description = ''
                ",
                &[&id, &description],
            )
            .await?;
        Ok(())
    }

    async fn fetch_metadata(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMeta>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, title, created_at FROM videos WHERE id = ANY($1)",
                &[&ids],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<_, VideoId>("id"),
                    VideoMeta {
                        title: row.get("title"),
                        created_at: row.get("created_at"),
                    },
                )
            })
            .collect())
    }
}

/// In-memory video store for tests
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: tokio::sync::RwLock<HashMap<VideoId, VideoRecord>>,
}

impl MemoryVideoStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record: VideoRecord) {
        self.videos.write().await.insert(record.id, record);
    }

    /// Current status of a record, if present.
    pub async fn status(&self, id: VideoId) -> Option<VideoStatus> {
        self.videos.read().await.get(&id).map(|v| v.status)
    }

    /// Current description of a record, if present.
    pub async fn description(&self, id: VideoId) -> Option<String> {
        self.videos
            .read()
            .await
            .get(&id)
            .map(|v| v.description.clone())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn fetch_video(&self, id: VideoId) -> Result<VideoRecord> {
        self.videos
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn claim_processing(&self, id: VideoId) -> Result<ProcessingClaim> {
        let mut videos = self.videos.write().await;
        let video = videos.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if video.status == VideoStatus::Processing {
            return Ok(ProcessingClaim::AlreadyProcessing);
        }
        let previous = video.status;
        video.status = VideoStatus::Processing;
        video.updated_at = Utc::now();
        Ok(ProcessingClaim::Started { previous })
    }

    async fn mark_status(&self, id: VideoId, status: VideoStatus) -> Result<()> {
        let mut videos = self.videos.write().await;
        let video = videos.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        video.status = status;
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn backfill_description(&self, id: VideoId, description: &str) -> Result<()> {
        let mut videos = self.videos.write().await;
        let video = videos.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if video.description.is_empty() {
            video.description = description.to_string();
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fetch_metadata(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMeta>> {
        let videos = self.videos.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                videos.get(id).map(|video| {
                    (
                        *id,
                        VideoMeta {
                            title: video.title.clone(),
                            created_at: video.created_at,
                        },
                    )
                })
            })
            .collect())
    }
}
