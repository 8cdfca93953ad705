use sqlx::{FromRow, PgPool};

use crate::StoreError;

/// Account status strings as stored in the `accounts.status` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Inactive,
    Banned,
    Suspended,
    PendingVerification,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Banned => "banned",
            AccountStatus::Suspended => "suspended",
            AccountStatus::PendingVerification => "pending_verification",
            AccountStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => AccountStatus::Active,
            "inactive" => AccountStatus::Inactive,
            "banned" => AccountStatus::Banned,
            "suspended" => AccountStatus::Suspended,
            "pending_verification" => AccountStatus::PendingVerification,
            _ => AccountStatus::Deleted,
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub status: String,
    pub is_online: bool,
}

impl Account {
    pub fn pc_id(&self) -> u32 {
        self.id as u32
    }

    pub fn status(&self) -> AccountStatus {
        AccountStatus::from_str(&self.status)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

/// Read/write access to the `accounts` table.
#[derive(Clone)]
pub struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Account, StoreError> {
        Ok(sqlx::query_as::<_, Account>(
            "SELECT id, username, password_hash, status, is_online \
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    /// The active account behind a pcId.
    pub async fn get_active(&self, pc_id: u32) -> Result<Account, StoreError> {
        Ok(sqlx::query_as::<_, Account>(
            "SELECT id, username, password_hash, status, is_online \
             FROM accounts WHERE id = $1 AND status = 'active'",
        )
        .bind(i64::from(pc_id))
        .fetch_one(&self.pool)
        .await?)
    }

    /// Test-mode convenience: an unknown username becomes a fresh active
    /// account on the spot.
    pub async fn get_or_create(&self, username: &str, password: &str) -> Result<Account, StoreError> {
        match self.get_by_username(username).await {
            Ok(account) => Ok(account),
            Err(e) if e.is_not_found() => {
                let password_hash =
                    bcrypt::hash(password, bcrypt::DEFAULT_COST).unwrap_or_default();
                Ok(sqlx::query_as::<_, Account>(
                    "INSERT INTO accounts (username, password_hash, status, email) \
                     VALUES ($1, $2, 'active', $3) \
                     RETURNING id, username, password_hash, status, is_online",
                )
                .bind(username)
                .bind(password_hash)
                .bind(format!("{username}@a3agonyl.com"))
                .fetch_one(&self.pool)
                .await?)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn set_online(&self, pc_id: u32) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET is_online = TRUE, last_login = NOW() WHERE id = $1")
            .bind(i64::from(pc_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_offline(&self, pc_id: u32) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET is_online = FALSE, last_logout = NOW() WHERE id = $1")
            .bind(i64::from(pc_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_mapping_round_trips() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Inactive,
            AccountStatus::Banned,
            AccountStatus::Suspended,
            AccountStatus::PendingVerification,
            AccountStatus::Deleted,
        ] {
            assert_eq!(AccountStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn password_verification_rejects_wrong_password() {
        let hash = bcrypt::hash("Pa55word!", 4).unwrap();
        let account = Account {
            id: 1,
            username: "alice".to_owned(),
            password_hash: hash,
            status: "active".to_owned(),
            is_online: false,
        };

        assert!(account.verify_password("Pa55word!"));
        assert!(!account.verify_password("wrong"));
    }
}
