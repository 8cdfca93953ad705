use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::StoreError;

const LOGGED_IN_USER_KEY_PREFIX: &str = "agonyl:logged_in_user:";

/// The cross-process cache: login tickets and short distributed locks.
/// Cloning shares the underlying connection manager.
#[derive(Clone)]
pub struct CacheService {
    conn: ConnectionManager,
}

impl CacheService {
    pub async fn connect(
        addr: &str,
        password: &str,
        tls_enabled: bool,
    ) -> Result<Self, StoreError> {
        let scheme = if tls_enabled { "rediss" } else { "redis" };
        let url = if password.is_empty() {
            format!("{scheme}://{addr}")
        } else {
            format!("{scheme}://:{password}@{addr}")
        };

        let client = redis::Client::open(url.as_str())?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    fn ticket_key(username: &str) -> String {
        format!("{LOGGED_IN_USER_KEY_PREFIX}{username}")
    }

    /// Writes the login ticket `username → pcId`. No TTL; logout or
    /// disconnect revokes it.
    pub async fn add_logged_in_user(&self, username: &str, pc_id: u32) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::ticket_key(username), pc_id.to_string())
            .await?;
        Ok(())
    }

    pub async fn remove_logged_in_user(&self, username: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::ticket_key(username)).await?;
        Ok(())
    }

    pub async fn is_logged_in(&self, username: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(Self::ticket_key(username)).await?)
    }

    /// `SET key value NX EX ttl`: the short distributed lock used around
    /// serial batch allocation.
    pub async fn try_lock(&self, key: &str, owner: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(owner)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    pub async fn unlock(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Caches a freshly allocated serial batch for the peer processes of
    /// the same logical server.
    pub async fn cache_serial_batch(
        &self,
        key: &str,
        start: u32,
        end: u32,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .cmd("HSET")
            .arg(key)
            .arg("start")
            .arg(start)
            .arg("end")
            .arg(end)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn cached_serial_batch(&self, key: &str) -> Result<Option<(u32, u32)>, StoreError> {
        let mut conn = self.conn.clone();
        let values: Vec<Option<u32>> = redis::cmd("HMGET")
            .arg(key)
            .arg("start")
            .arg("end")
            .query_async(&mut conn)
            .await?;

        match values.as_slice() {
            [Some(start), Some(end)] => Ok(Some((*start, *end))),
            _ => Ok(None),
        }
    }
}
