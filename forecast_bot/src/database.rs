use std::str::FromStr;

use chrono::NaiveDate;
pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::{ChatId, UserId};

use crate::types::{ChatSettings, Coordinates};

type Pool = sqlx::Pool<Sqlite>;

pub struct Database {
    pool: Pool,
}

impl Database {
    /// Open (creating if needed) the database at the given `sqlite:` URL.
    pub async fn new(url: &str) -> Result<Self, Error> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(
                SqliteConnectOptions::from_str(url)?
                    .busy_timeout(std::time::Duration::from_secs(60)),
            )
            .await?;

        Self::with_pool(pool).await
    }

    /// A fresh database that lives only in memory.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, Error> {
        // Every connection to ":memory:" is its own database, so only ever have one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool) -> Result<Self, Error> {
        // CHATS:
        // chat_id (unique primary key, i64)
        // latitude, longitude (f64, both NULL or both set)
        // location_name (string, may be NULL)
        // admin_id (i64 because sqlite doesn't support u64; may be NULL)
        // daily_enabled (0 for no, 1 for yes)
        // last_daily_sent (local date in YYYY-MM-DD format, may be NULL)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                chat_id INTEGER PRIMARY KEY NOT NULL,
                latitude REAL NULL,
                longitude REAL NULL,
                location_name TEXT NULL,
                admin_id INTEGER NULL,
                daily_enabled INTEGER NOT NULL DEFAULT 1,
                last_daily_sent TEXT NULL
            ) STRICT;",
        ))
        .await?;

        Ok(Database { pool })
    }

    fn settings_from_row(row: &SqliteRow) -> Result<ChatSettings, Error> {
        let latitude: Option<f64> = row.try_get("latitude")?;
        let longitude: Option<f64> = row.try_get("longitude")?;
        let coordinates = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(
                Coordinates::new(lat, lon).map_err(|e| Error::Decode(Box::new(e)))?,
            ),
            _ => None,
        };

        Ok(ChatSettings {
            chat_id: ChatId(row.try_get("chat_id")?),
            coordinates,
            location_name: row.try_get("location_name")?,
            admin_id: row
                .try_get::<Option<i64>, _>("admin_id")?
                .map(|id| UserId(id as u64)),
            daily_enabled: row.try_get("daily_enabled")?,
            last_daily_sent: row.try_get("last_daily_sent")?,
        })
    }

    /// Get everything stored about a chat, or `None` if it was never configured.
    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Option<ChatSettings>, Error> {
        let row = sqlx::query("SELECT * FROM chats WHERE chat_id=?;")
            .bind(chat_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::settings_from_row).transpose()
    }

    /// Store coordinates for a chat, overwriting the previous ones.
    ///
    /// The location name is replaced with `location_name`; passing `None`
    /// clears it, as it described the previous place.
    pub async fn set_coordinates(
        &self,
        chat_id: ChatId,
        coordinates: Coordinates,
        location_name: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO chats(chat_id, latitude, longitude, location_name)
            VALUES (?, ?, ?, ?)
        ON CONFLICT(chat_id) DO
            UPDATE SET latitude=excluded.latitude,
                longitude=excluded.longitude,
                location_name=excluded.location_name;",
        )
        .bind(chat_id.0)
        .bind(coordinates.latitude())
        .bind(coordinates.longitude())
        .bind(location_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set the location name of a chat that has coordinates.
    /// Returns `false` if there are no coordinates to name.
    pub async fn set_location_name(&self, chat_id: ChatId, name: &str) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE chats SET location_name=? WHERE chat_id=? AND latitude IS NOT NULL;",
        )
        .bind(name)
        .bind(chat_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assign the bot admin of a chat.
    pub async fn set_admin(&self, chat_id: ChatId, admin: UserId) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO chats(chat_id, admin_id)
            VALUES (?, ?)
        ON CONFLICT(chat_id) DO
            UPDATE SET admin_id=excluded.admin_id;",
        )
        .bind(chat_id.0)
        .bind(admin.0 as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Turn the daily forecast on or off for a chat.
    pub async fn set_daily_enabled(&self, chat_id: ChatId, enabled: bool) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO chats(chat_id, daily_enabled)
            VALUES (?, ?)
        ON CONFLICT(chat_id) DO
            UPDATE SET daily_enabled=excluded.daily_enabled;",
        )
        .bind(chat_id.0)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get all chats that should get a daily forecast and didn't get one on `today` yet.
    pub async fn chats_due_daily(&self, today: NaiveDate) -> Result<Vec<ChatSettings>, Error> {
        let rows = sqlx::query(
            "SELECT * FROM chats
            WHERE daily_enabled=1
                AND latitude IS NOT NULL
                AND longitude IS NOT NULL
                AND (last_daily_sent IS NULL OR last_daily_sent < ?)
            ORDER BY chat_id;",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::settings_from_row).collect()
    }

    /// Remember that the daily forecast for `date` was sent to this chat.
    pub async fn mark_daily_sent(&self, chat_id: ChatId, date: NaiveDate) -> Result<(), Error> {
        sqlx::query("UPDATE chats SET last_daily_sent=? WHERE chat_id=?;")
            .bind(date)
            .bind(chat_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
