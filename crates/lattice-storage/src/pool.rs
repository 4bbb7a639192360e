//! Connection management: one writer behind a mutex, a round-robin read
//! pool. On-disk stores run in WAL mode so readers never block the writer;
//! in-memory stores use a uniquely named shared-cache database so the pool
//! sees one logical store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};
use uuid::Uuid;

use lattice_core::config::StoreConfig;
use lattice_core::errors::{LatticeError, LatticeResult, StoreError};

use crate::store_err;

/// Reads are idempotent, so transient backend failures retry with
/// exponential backoff. Writes never retry; the orchestrator's orphan
/// handling covers them.
const READ_ATTEMPTS: u32 = 3;

pub mod pragmas {
    use super::*;

    /// Applied to every connection. WAL is a no-op for in-memory databases;
    /// SQLite reports the effective mode instead of erroring.
    pub fn apply_pragmas(conn: &Connection) -> LatticeResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(store_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(store_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(store_err)?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))
            .map_err(store_err)?;
        Ok(())
    }
}

/// The single connection all mutations go through.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> LatticeResult<T>,
    ) -> LatticeResult<T> {
        let guard = self.conn.lock();
        f(&guard)
    }
}

/// Read connections handed out round-robin. FIFO fairness comes from the
/// per-connection mutex; checkout is per operation.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn new(conns: Vec<Connection>) -> Self {
        Self {
            conns: conns.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn with_conn<T>(&self, f: impl Fn(&Connection) -> LatticeResult<T>) -> LatticeResult<T> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let guard = self.conns[i].lock();

        let mut attempt = 0;
        loop {
            match f(&guard) {
                Err(LatticeError::Store(StoreError::Backend { ref message }))
                    if attempt + 1 < READ_ATTEMPTS =>
                {
                    attempt += 1;
                    warn!(attempt, "retrying read after store error: {message}");
                    std::thread::sleep(Duration::from_millis(10 << attempt));
                }
                other => return other,
            }
        }
    }
}

/// Writer plus readers over one logical store.
pub struct StorePool {
    pub writer: Arc<WriteConnection>,
    pub readers: Arc<ReadPool>,
}

impl StorePool {
    /// Open per config. `:memory:` yields an ephemeral store private to this
    /// pool.
    pub fn open(config: &StoreConfig) -> LatticeResult<Self> {
        let pool_size = config.read_pool_size.max(1);
        if config.path == ":memory:" {
            return Self::open_in_memory(pool_size);
        }

        let open_one = || -> LatticeResult<Connection> {
            let conn = Connection::open(&config.path).map_err(store_err)?;
            pragmas::apply_pragmas(&conn)?;
            Ok(conn)
        };

        let writer = open_one()?;
        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            readers.push(open_one()?);
        }
        debug!(path = %config.path, pool_size, "opened graph store");
        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer)),
            readers: Arc::new(ReadPool::new(readers)),
        })
    }

    /// Shared-cache in-memory store with a unique name, so writer and
    /// readers observe the same data and separate pools stay isolated.
    pub fn open_in_memory(pool_size: usize) -> LatticeResult<Self> {
        let uri = format!(
            "file:lattice-{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let flags = OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let open_one = || -> LatticeResult<Connection> {
            let conn = Connection::open_with_flags(&uri, flags).map_err(store_err)?;
            pragmas::apply_pragmas(&conn)?;
            Ok(conn)
        };

        let writer = open_one()?;
        let mut readers = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            readers.push(open_one()?);
        }
        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer)),
            readers: Arc::new(ReadPool::new(readers)),
        })
    }
}
