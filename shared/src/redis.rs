use anyhow::Result;
use redis::Client;
use tracing::{debug, warn};
use uuid::Uuid;

pub type Redis = Client;

pub fn get_redis_client(redis_url: &str) -> Result<Redis> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Cross-process mutual exclusion over one Redis key.
///
/// Acquire is `SET key token NX PX ttl`; release deletes the key only while it still holds
/// our token, so an expired lock taken over by another process is never removed.
#[derive(Clone)]
pub struct RunLock {
    client: Redis,
    key: String,
    ttl_ms: u64,
}

/// Proof of a held [`RunLock`]
#[derive(Debug)]
pub struct LockGuard {
    token: String,
}

impl RunLock {
    pub fn new(client: Redis, key: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            client,
            key: key.into(),
            ttl_ms,
        }
    }

    /// `None` when another holder owns the key
    pub async fn try_acquire(&self) -> Result<Option<LockGuard>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = Uuid::new_v4().to_string();

        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async(&mut conn)
            .await?;

        if reply.is_some() {
            debug!("Acquired run lock {}", self.key);
            Ok(Some(LockGuard { token }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, guard: LockGuard) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&guard.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!("Run lock {} expired before release", self.key);
        }
        Ok(())
    }
}
