#![forbid(unsafe_code)]

use anyhow::{Context, anyhow};

use super::coordinator::VodRecording;

/// Eventually-consistent projection of the in-memory VOD catalog into the
/// external `recordings` table (spec §6, §9: "the in-memory catalog is
/// authoritative for live semantics; any database is a persistent
/// projection"). Disabled when no `DATABASE_URL` is configured.
#[derive(Clone)]
pub struct RecordingProjector {
	backend: Option<ProjectorBackend>,
}

#[derive(Clone)]
enum ProjectorBackend {
	Sqlite(sqlx::SqlitePool),
	Postgres(sqlx::PgPool),
	Mysql(sqlx::MySqlPool),
}

impl RecordingProjector {
	pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
		if database_url.starts_with("sqlite:") {
			let pool = sqlx::SqlitePool::connect(database_url).await.context("connect sqlite")?;
			Self::ensure_schema_sqlite(&pool).await?;
			Ok(Self { backend: Some(ProjectorBackend::Sqlite(pool)) })
		} else if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
			let pool = sqlx::PgPool::connect(database_url).await.context("connect postgres")?;
			Ok(Self { backend: Some(ProjectorBackend::Postgres(pool)) })
		} else if database_url.starts_with("mysql:") || database_url.starts_with("mariadb:") {
			let pool = sqlx::MySqlPool::connect(database_url).await.context("connect mysql")?;
			Ok(Self { backend: Some(ProjectorBackend::Mysql(pool)) })
		} else {
			Err(anyhow!("unsupported DATABASE_URL for recording projector"))
		}
	}

	pub fn disabled() -> Self {
		Self { backend: None }
	}

	async fn ensure_schema_sqlite(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS recordings ( \
				id TEXT PRIMARY KEY, \
				room_name TEXT NOT NULL, \
				streamer_id TEXT NOT NULL, \
				streamer_name TEXT NOT NULL, \
				title TEXT NOT NULL, \
				status TEXT NOT NULL, \
				video_path TEXT NOT NULL, \
				thumbnail_path TEXT, \
				duration INTEGER, \
				file_size INTEGER, \
				created_at INTEGER NOT NULL, \
				updated_at INTEGER NOT NULL \
			)",
		)
		.execute(pool)
		.await
		.context("create recordings table (sqlite)")?;
		Ok(())
	}

	/// Upsert the projection for a single VOD record. Best-effort: failures
	/// are logged by the caller, not propagated, since the in-memory catalog
	/// remains the source of truth.
	pub async fn upsert(&self, record: &VodRecording) -> anyhow::Result<()> {
		let Some(backend) = &self.backend else {
			return Ok(());
		};

		let status = format!("{:?}", record.status).to_lowercase();
		let id = record.id.to_string();

		match backend {
			ProjectorBackend::Sqlite(pool) => {
				sqlx::query(
					"INSERT INTO recordings (id, room_name, streamer_id, streamer_name, title, status, video_path, thumbnail_path, duration, file_size, created_at, updated_at) \
					VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
					ON CONFLICT(id) DO UPDATE SET status=excluded.status, thumbnail_path=excluded.thumbnail_path, duration=excluded.duration, file_size=excluded.file_size, updated_at=excluded.updated_at",
				)
				.bind(&id)
				.bind(record.room.as_str())
				.bind(record.streamer.as_str())
				.bind(&record.streamer_name)
				.bind(&record.title)
				.bind(&status)
				.bind(&record.video_path)
				.bind(&record.thumbnail_path)
				.bind(record.duration_secs.map(|v| v as i64))
				.bind(record.file_size_bytes.map(|v| v as i64))
				.bind(record.created_at_unix as i64)
				.bind(record.updated_at_unix as i64)
				.execute(pool)
				.await
				.context("upsert recordings (sqlite)")?;
			}
			ProjectorBackend::Postgres(pool) => {
				sqlx::query(
					"INSERT INTO recordings (id, room_name, streamer_id, streamer_name, title, status, video_path, thumbnail_path, duration, file_size, created_at, updated_at) \
					VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, to_timestamp($11), to_timestamp($12)) \
					ON CONFLICT (id) DO UPDATE SET status=excluded.status, thumbnail_path=excluded.thumbnail_path, duration=excluded.duration, file_size=excluded.file_size, updated_at=excluded.updated_at",
				)
				.bind(&id)
				.bind(record.room.as_str())
				.bind(record.streamer.as_str())
				.bind(&record.streamer_name)
				.bind(&record.title)
				.bind(&status)
				.bind(&record.video_path)
				.bind(&record.thumbnail_path)
				.bind(record.duration_secs.map(|v| v as i64))
				.bind(record.file_size_bytes.map(|v| v as i64))
				.bind(record.created_at_unix as f64)
				.bind(record.updated_at_unix as f64)
				.execute(pool)
				.await
				.context("upsert recordings (postgres)")?;
			}
			ProjectorBackend::Mysql(pool) => {
				sqlx::query(
					"INSERT INTO recordings (id, room_name, streamer_id, streamer_name, title, status, video_path, thumbnail_path, duration, file_size, created_at, updated_at) \
					VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FROM_UNIXTIME(?), FROM_UNIXTIME(?)) \
					ON DUPLICATE KEY UPDATE status=VALUES(status), thumbnail_path=VALUES(thumbnail_path), duration=VALUES(duration), file_size=VALUES(file_size), updated_at=VALUES(updated_at)",
				)
				.bind(&id)
				.bind(record.room.as_str())
				.bind(record.streamer.as_str())
				.bind(&record.streamer_name)
				.bind(&record.title)
				.bind(&status)
				.bind(&record.video_path)
				.bind(&record.thumbnail_path)
				.bind(record.duration_secs.map(|v| v as i64))
				.bind(record.file_size_bytes.map(|v| v as i64))
				.bind(record.created_at_unix as i64)
				.bind(record.updated_at_unix as i64)
				.execute(pool)
				.await
				.context("upsert recordings (mysql)")?;
			}
		}

		Ok(())
	}
}
