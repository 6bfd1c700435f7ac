//! Redis-backed job queue.
//!
//! ## Layout
//!
//! - **`<prefix>:pending`** (list): encoded payloads; producers `LPUSH`, the
//!   worker takes from the right
//! - **`<prefix>:claimed`** (list): payloads taken by `BLMOVE` and not yet
//!   promoted; normally empty
//! - **`<prefix>:processing`** (hash): job id → payload, jobs being worked on
//!   or left behind by a failure
//! - **`<prefix>:done`** (hash): job id → payload, finished jobs
//! - **`<prefix>:rejected`** (list): payloads that could not be decoded
//!
//! Each transition is a single `BLMOVE`, a `MULTI/EXEC` block or a Lua
//! script, so a payload is never lost between two areas.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use padmigrate_core::{Job, JobId};

use crate::jobs::{ClaimedJob, JobQueue, QueueError, QueueStats};

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "padmigrate:jobs";

/// Move a job from processing back to the worker end of pending.
const REQUEUE_SCRIPT: &str = r#"
local payload = redis.call('HGET', KEYS[1], ARGV[1])
if not payload then
  return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('RPUSH', KEYS[2], payload)
return 1
"#;

/// Key names derived from one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub pending: String,
    pub claimed: String,
    pub processing: String,
    pub done: String,
    pub rejected: String,
}

impl QueueKeys {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches(':');
        Self {
            pending: format!("{prefix}:pending"),
            claimed: format!("{prefix}:claimed"),
            processing: format!("{prefix}:processing"),
            done: format!("{prefix}:done"),
            rejected: format!("{prefix}:rejected"),
        }
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

#[derive(Debug, Clone)]
pub struct RedisJobQueue {
    client: Arc<redis::Client>,
    keys: QueueKeys,
}

impl RedisJobQueue {
    /// Create a queue over `redis_url` using keys under `prefix`.
    ///
    /// No connection is made until the first command.
    pub fn new(redis_url: impl AsRef<str>, prefix: Option<&str>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            keys: prefix.map(QueueKeys::new).unwrap_or_default(),
        })
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    fn connection(&self) -> Result<redis::Connection, QueueError> {
        self.client
            .get_connection()
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    /// Move one payload out of the claim list: into processing when it
    /// decodes, onto the rejected list otherwise.
    fn promote(
        &self,
        conn: &mut redis::Connection,
        raw: String,
    ) -> Result<ClaimedJob, QueueError> {
        match Job::decode(&raw) {
            Ok(job) => {
                redis::pipe()
                    .atomic()
                    .cmd("LREM")
                    .arg(&self.keys.claimed)
                    .arg(1)
                    .arg(&raw)
                    .ignore()
                    .cmd("HSET")
                    .arg(&self.keys.processing)
                    .arg(job.id().as_str())
                    .arg(&raw)
                    .ignore()
                    .query::<()>(conn)
                    .map_err(|e| QueueError::Command(format!("promote failed: {e}")))?;
                Ok(ClaimedJob { job, raw })
            }
            Err(err) => {
                redis::pipe()
                    .atomic()
                    .cmd("LREM")
                    .arg(&self.keys.claimed)
                    .arg(1)
                    .arg(&raw)
                    .ignore()
                    .cmd("RPUSH")
                    .arg(&self.keys.rejected)
                    .arg(&raw)
                    .ignore()
                    .query::<()>(conn)
                    .map_err(|e| QueueError::Command(format!("reject failed: {e}")))?;
                Err(QueueError::Decode {
                    payload: raw,
                    reason: err.to_string(),
                })
            }
        }
    }
}

impl JobQueue for RedisJobQueue {
    fn enqueue(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        let _: usize = redis::cmd("LPUSH")
            .arg(&self.keys.pending)
            .arg(payload)
            .query(&mut conn)
            .map_err(|e| QueueError::Command(format!("LPUSH failed: {e}")))?;
        Ok(())
    }

    fn claim_next(&self, block: Duration) -> Result<Option<ClaimedJob>, QueueError> {
        let mut conn = self.connection()?;

        // A zero timeout means "block forever" to Redis.
        let timeout = block.as_secs_f64().max(0.01);
        let raw: Option<String> = redis::cmd("BLMOVE")
            .arg(&self.keys.pending)
            .arg(&self.keys.claimed)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout)
            .query(&mut conn)
            .map_err(|e| QueueError::Command(format!("BLMOVE failed: {e}")))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let claimed = self.promote(&mut conn, raw)?;
        debug!(job_id = %claimed.job.id(), "job moved to processing");
        Ok(Some(claimed))
    }

    #[instrument(skip_all, fields(job_id = %claimed.job.id()), err)]
    fn complete(&self, claimed: &ClaimedJob) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        redis::pipe()
            .atomic()
            .cmd("HDEL")
            .arg(&self.keys.processing)
            .arg(claimed.job.id().as_str())
            .ignore()
            .cmd("HSET")
            .arg(&self.keys.done)
            .arg(claimed.job.id().as_str())
            .arg(&claimed.raw)
            .ignore()
            .query::<()>(&mut conn)
            .map_err(|e| QueueError::Command(format!("complete failed: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    fn requeue(&self, job_id: &JobId) -> Result<bool, QueueError> {
        let mut conn = self.connection()?;
        let moved: i32 = redis::Script::new(REQUEUE_SCRIPT)
            .key(&self.keys.processing)
            .key(&self.keys.pending)
            .arg(job_id.as_str())
            .invoke(&mut conn)
            .map_err(|e| QueueError::Command(format!("requeue failed: {e}")))?;
        Ok(moved == 1)
    }

    fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection()?;
        let leftovers: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.keys.claimed)
            .arg(0)
            .arg(-1)
            .query(&mut conn)
            .map_err(|e| QueueError::Command(format!("LRANGE failed: {e}")))?;

        let mut promoted = 0;
        for raw in leftovers {
            match self.promote(&mut conn, raw) {
                Ok(claimed) => {
                    info!(job_id = %claimed.job.id(), "recovered claimed job into processing");
                    promoted += 1;
                }
                Err(QueueError::Decode { payload, reason }) => {
                    warn!(%payload, %reason, "recovered payload rejected");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(promoted)
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.connection()?;
        let (pending, claimed, processing, done, rejected): (usize, usize, usize, usize, usize) =
            redis::pipe()
                .cmd("LLEN")
                .arg(&self.keys.pending)
                .cmd("LLEN")
                .arg(&self.keys.claimed)
                .cmd("HLEN")
                .arg(&self.keys.processing)
                .cmd("HLEN")
                .arg(&self.keys.done)
                .cmd("LLEN")
                .arg(&self.keys.rejected)
                .query(&mut conn)
                .map_err(|e| QueueError::Command(format!("stats failed: {e}")))?;

        Ok(QueueStats {
            pending,
            claimed,
            processing,
            done,
            rejected,
        })
    }
}
