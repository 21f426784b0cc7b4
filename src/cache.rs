//! Persistent record cache: both the answer cache and the delegation hint
//! store the resolver consults before reaching for the root servers.
//!
//! Schema: `cache(name TEXT, type INT, ttl INT, insertion_time INT, data BLOB, ns TEXT)`.
//! `data` is a self-contained serialized record (no outside compression
//! pointers); `ns` is set only for NS rows, to the decompressed NS target.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

use crate::records::{DnsRecord, RecordType};

pub struct Cache {
    conn: Mutex<Option<Connection>>,
    path: String,
}

impl Cache {
    /// Cache is opened lazily on first use and kept open for the process
    /// lifetime; a missing/unwritable path is not an error here, only when
    /// the first real access is attempted (and even then the resolver just
    /// logs and continues without caching).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(None),
            path: path.into(),
        }
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().expect("cache mutex poisoned");
        if guard.is_none() {
            let conn = Connection::open(&self.path)
                .with_context(|| format!("failed to open cache database at {}", self.path))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("failed to set WAL journal mode")?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS cache (
                    name TEXT NOT NULL,
                    type INTEGER NOT NULL,
                    ttl INTEGER NOT NULL,
                    insertion_time INTEGER NOT NULL,
                    data BLOB NOT NULL,
                    ns TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_cache_name_type ON cache(name, type);
                CREATE INDEX IF NOT EXISTS idx_cache_ns ON cache(ns);",
            )
            .context("failed to create cache table")?;
            info!("record cache opened at {}", self.path);
            *guard = Some(conn);
        }
        let conn = guard.as_ref().expect("cache connection just initialized");
        f(conn).context("cache query failed")
    }

    /// `delete where (now - insertion_time) > ttl`.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = unix_now();
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM cache WHERE (?1 - insertion_time) > ttl",
                params![now],
            )
        })
    }

    /// Deduplicating insert: deletes any existing row with the same
    /// `(name, type, ns)` triple before inserting the fresh one.
    pub fn insert_record(&self, record: &DnsRecord) -> Result<()> {
        let name = record.name.to_lowercase();
        let rtype = record.rtype.to_u16() as i64;
        let ns = record.ns_target().map(|s| s.to_lowercase());
        let data = crate::packet::encode_record_bytes(record);
        let now = unix_now();

        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM cache WHERE name = ?1 AND type = ?2 AND ns IS ?3",
                params![name, rtype, ns],
            )?;
            conn.execute(
                "INSERT INTO cache (name, type, ttl, insertion_time, data, ns)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![name, rtype, record.ttl as i64, now, data, ns],
            )?;
            Ok(())
        })
    }

    /// All rows where `lower(name) = lower(qname)` and `type = qtype`,
    /// decoded back into records. Not `LIMIT 1` — every matching row is
    /// returned as part of the answer set.
    pub fn lookup_answer(&self, name: &str, qtype: RecordType) -> Result<Vec<DnsRecord>> {
        let name = name.to_lowercase();
        let rtype = qtype.to_u16() as i64;
        let rows: Vec<Vec<u8>> = self.with_connection(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT data FROM cache WHERE name = ?1 AND type = ?2")?;
            let rows = stmt
                .query_map(params![name, rtype], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|data| crate::packet::decode_record_bytes(&data).ok())
            .collect())
    }

    /// Closest cached delegation for `suffix`: joins NS rows named `suffix`
    /// against their glue A rows. A-only, deliberately: joining in AAAA glue
    /// too would make the candidate set (and thus which server gets probed
    /// first) depend on which address family happened to be cached.
    /// Ties are broken by `RANDOM()`.
    pub fn lookup_delegation(&self, suffix: &str) -> Result<Vec<(String, std::net::Ipv4Addr)>> {
        let suffix = suffix.to_lowercase();
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT ns_row.ns, a_row.data
                 FROM cache ns_row
                 JOIN cache a_row ON a_row.name = ns_row.ns
                 WHERE ns_row.name = ?1 AND ns_row.type = 2 AND a_row.type = 1
                 ORDER BY RANDOM()",
            )?;
            let rows = stmt
                .query_map(params![suffix], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .map(|rows| {
            rows.into_iter()
                .filter_map(|(ns_name, data)| {
                    crate::packet::decode_record_bytes(&data)
                        .ok()
                        .and_then(|record| match record.rdata {
                            crate::records::RData::A(ip) => Some((ns_name, ip)),
                            _ => None,
                        })
                })
                .collect()
        })
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
