use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::{CharacterData, StoreError};

/// A character row with its data blob decoded.
#[derive(Clone, Debug)]
pub struct Character {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub class: i16,
    pub level: i16,
    pub data: CharacterData,
}

/// The slice of a character the list screen needs.
#[derive(Clone, Debug, FromRow)]
pub struct CharacterSummary {
    pub name: String,
    pub class: i16,
    pub level: i16,
    pub data: Json<CharacterData>,
}

/// Everything needed to persist a freshly created character.
#[derive(Clone, Debug)]
pub struct NewCharacter {
    pub account_id: u32,
    pub name: String,
    pub class: u8,
    pub data: CharacterData,
}

#[derive(FromRow)]
struct CharacterRow {
    id: i64,
    account_id: i64,
    name: String,
    class: i16,
    level: i16,
    data: Json<CharacterData>,
}

/// Read/write access to the `characters` table. Only `status = 'active'`
/// rows exist from the mesh's point of view.
#[derive(Clone)]
pub struct CharacterRepo {
    pool: PgPool,
}

impl CharacterRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_account(
        &self,
        account_id: u32,
    ) -> Result<Vec<CharacterSummary>, StoreError> {
        Ok(sqlx::query_as::<_, CharacterSummary>(
            "SELECT name, class, level, character_data AS data \
             FROM characters \
             WHERE account_id = $1 AND status = 'active' \
             ORDER BY id",
        )
        .bind(i64::from(account_id))
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_active(&self, account_id: u32) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM characters WHERE account_id = $1 AND status = 'active'",
        )
        .bind(i64::from(account_id))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn name_taken(&self, name: &str) -> Result<bool, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM characters WHERE name = $1 AND status = 'active'")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Inserts the character. The unique-when-active index on `name` makes
    /// concurrent duplicate creations lose here, not at the pre-check.
    pub async fn create(&self, new: &NewCharacter) -> Result<Character, StoreError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            "INSERT INTO characters (account_id, name, class, level, character_data, status) \
             VALUES ($1, $2, $3, $4, $5, 'active') \
             RETURNING id, account_id, name, class, level, character_data AS data",
        )
        .bind(i64::from(new.account_id))
        .bind(&new.name)
        .bind(i16::from(new.class))
        .bind(new.data.stats.level as i16)
        .bind(Json(&new.data))
        .fetch_one(&self.pool)
        .await?;

        Ok(Character {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            class: row.class,
            level: row.level,
            data: row.data.0,
        })
    }

    pub async fn soft_delete(&self, account_id: u32, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE characters SET status = 'deleted' \
             WHERE account_id = $1 AND name = $2 AND status = 'active'",
        )
        .bind(i64::from(account_id))
        .bind(name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    pub async fn get(&self, account_id: u32, name: &str) -> Result<Character, StoreError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            "SELECT id, account_id, name, class, level, character_data AS data \
             FROM characters \
             WHERE account_id = $1 AND name = $2 AND status = 'active'",
        )
        .bind(i64::from(account_id))
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Character {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            class: row.class,
            level: row.level,
            data: row.data.0,
        })
    }

    /// The stored map code for the character, used by the MainServer to
    /// resolve the owning zone.
    pub async fn map_code(&self, account_id: u32, name: &str) -> Result<u16, StoreError> {
        let character = self.get(account_id, name).await?;
        Ok(character.data.location.map_code)
    }

    pub async fn touch_last_login(&self, account_id: u32, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE characters SET last_login = NOW() \
             WHERE account_id = $1 AND name = $2 AND status = 'active'",
        )
        .bind(i64::from(account_id))
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
