//! Chunked uploads reassembled with server-side compose.
//!
//! The store only writes whole objects, so a chunked upload keeps an
//! accumulator object next to the destination and appends each chunk to it:
//!
//! - chunk `1` writes the accumulator `<key>.temporary`
//! - chunk `n >= 2` writes `<key>.temporary-<n>.tmp`, composes it onto the
//!   accumulator and deletes it
//! - chunk `-1` does the same but composes into `<key>` itself, then removes
//!   both temporaries
//!
//! Object names derive from the destination key and chunk index alone, so no
//! session state is needed unless strict ordering is switched on. A failure
//! part-way leaves the temporaries in place.

use super::{
    browser_service::{BrowserError, BrowserResult},
    paths::ParsedPath,
};
use crate::store::ObjectStore;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use tracing::{debug, info, warn};

/// Chunk index that appends the last piece and finalizes the object.
pub const FINAL_CHUNK: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStep {
    Initial,
    Intermediate(i64),
    Final,
}

impl ChunkStep {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            1 => Some(Self::Initial),
            FINAL_CHUNK => Some(Self::Final),
            n if n >= 2 => Some(Self::Intermediate(n)),
            _ => None,
        }
    }
}

/// Accumulator object for an upload into `key`.
pub fn composite_key(key: &str) -> String {
    format!("{}.temporary", key)
}

/// Staging object holding chunk `chunk` of an upload into `key`.
pub fn temp_key(key: &str, chunk: i64) -> String {
    format!("{}.temporary-{}.tmp", key, chunk)
}

/// Apply one chunk of an upload into `dest`.
pub async fn apply_chunk(
    store: &dyn ObjectStore,
    dest: &ParsedPath,
    step: ChunkStep,
    chunk: i64,
    data: Bytes,
    content_type: Option<&str>,
) -> BrowserResult<()> {
    let bucket = dest.bucket.as_str();
    let composite = composite_key(&dest.key);

    if step == ChunkStep::Initial {
        store.put_object(bucket, &composite, data, content_type).await?;
        debug!(dest = %dest, "started chunked upload");
        return Ok(());
    }

    let temp = temp_key(&dest.key, chunk);
    store.put_object(bucket, &temp, data, content_type).await?;

    let target = match step {
        ChunkStep::Final => dest.key.as_str(),
        _ => composite.as_str(),
    };
    store
        .compose_objects(bucket, target, &[composite.clone(), temp.clone()])
        .await?;
    store.delete_object(bucket, &temp).await?;

    if step == ChunkStep::Final {
        store.delete_object(bucket, &composite).await?;
        info!(dest = %dest, "finished chunked upload");
    } else {
        debug!(dest = %dest, chunk, "appended chunk");
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct Session {
    last_chunk: i64,
    /// Chunk accepted by `check` whose backend calls have not finished.
    in_flight: Option<i64>,
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
}

/// Optional bookkeeping that rejects out-of-order or repeated chunks.
///
/// Keyed by destination path. Chunk `1` always (re)starts a session; chunk
/// `n >= 2` needs a live session whose last chunk was `n - 1`; the final chunk
/// needs any live session and closes it. Expired sessions count as absent.
///
/// An accepted chunk stays reserved until it is recorded or released, so a
/// concurrent request for the same session is rejected in the meantime.
pub struct ChunkTracker {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl ChunkTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Check that `chunk` may be applied to `dest` right now, and reserve it.
    pub fn check(&self, dest: &str, step: ChunkStep, now: DateTime<Utc>) -> BrowserResult<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| session.expires > now);

        let reject = |chunk: i64, reason: String| -> BrowserResult<()> {
            warn!(dest, chunk, %reason, "rejected upload chunk");
            Err(BrowserError::InvalidChunk {
                path: dest.to_string(),
                chunk,
                reason,
            })
        };

        let chunk = match step {
            ChunkStep::Initial => return Ok(()),
            ChunkStep::Intermediate(n) => n,
            ChunkStep::Final => FINAL_CHUNK,
        };
        let Some(session) = sessions.get_mut(dest) else {
            return reject(chunk, "no upload in progress".into());
        };
        if let Some(pending) = session.in_flight {
            return reject(chunk, format!("chunk {} is still being applied", pending));
        }
        if step != ChunkStep::Final && session.last_chunk != chunk - 1 {
            return reject(chunk, format!("expected chunk {}", session.last_chunk + 1));
        }
        session.in_flight = Some(chunk);
        Ok(())
    }

    /// Record a successfully applied chunk.
    pub fn record(&self, dest: &str, step: ChunkStep, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match step {
            ChunkStep::Initial => {
                sessions.insert(
                    dest.to_string(),
                    Session {
                        last_chunk: 1,
                        in_flight: None,
                        created: now,
                        expires: now + self.ttl,
                    },
                );
            }
            ChunkStep::Intermediate(n) => {
                if let Some(session) = sessions.get_mut(dest) {
                    session.last_chunk = n;
                    session.in_flight = None;
                    session.expires = now + self.ttl;
                }
            }
            ChunkStep::Final => {
                if let Some(session) = sessions.remove(dest) {
                    debug!(
                        dest,
                        chunks = session.last_chunk + 1,
                        elapsed_ms = (now - session.created).num_milliseconds(),
                        "closed upload session"
                    );
                }
            }
        }
    }

    /// Drop the reservation for a chunk that failed, so it can be retried.
    pub fn release(&self, dest: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get_mut(dest) {
            session.in_flight = None;
        }
    }

    #[cfg(test)]
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
