//! Consumed interfaces of the external collaborators: the relational store
//! of accounts and characters, and the key-value cache used for
//! cross-process login state and serial-number batching. The schemas
//! themselves live elsewhere; this crate only reads and mutates them.

mod accounts;
mod cache;
mod character_data;
mod characters;
mod error;
mod serials;

pub use accounts::{Account, AccountRepo, AccountStatus};
pub use cache::CacheService;
pub use character_data::{
    CharacterData, InventoryItem, Location, NpcFavor, PetData, PetInventoryItem, QuestInfo,
    SkillEntry, SocialInfo, Stats, WearItem,
};
pub use characters::{Character, CharacterRepo, CharacterSummary, NewCharacter};
pub use error::StoreError;
pub use serials::{BatchSource, PgBatchSource, SerialAllocator, SERIAL_BATCH_SIZE};

pub type PgPool = sqlx::PgPool;

/// Connects the Postgres pool every service shares.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    Ok(sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?)
}
