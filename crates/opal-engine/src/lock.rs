//! Lock manager: two-phase locking over named resources.
//!
//! A single lock table maps each resource name to an ordered request list.
//! Acquisition is non-blocking: an incompatible request is queued
//! non-granted and the caller gets `false` back. Queued requests are
//! promoted FIFO when locks are released. Deadlock detection builds a
//! wait-for graph and reports whether it contains a cycle; victim selection
//! is the caller's responsibility.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Read lock; multiple holders allowed.
    Shared,
    /// Write lock; sole holder.
    Exclusive,
}

impl LockMode {
    /// Lowercase name for messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Exclusive => "exclusive",
        }
    }
}

/// Kind of resource being locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A whole table.
    Table,
    /// A single row.
    Row,
    /// The entire database.
    Database,
}

/// One lock request, granted or queued.
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Owning transaction id.
    pub transaction_id: u64,
    /// Resource name.
    pub resource: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Requested mode.
    pub mode: LockMode,
    /// Whether the request has been granted.
    pub granted: bool,
}

/// The process-wide lock table.
#[derive(Debug, Default)]
pub struct LockManager {
    table: RwLock<HashMap<String, Vec<LockRequest>>>,
}

impl LockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a lock for a transaction.
    ///
    /// Returns true when the lock is granted. Re-acquiring a held mode is
    /// idempotent; a shared holder upgrades to exclusive iff it is the sole
    /// holder; an exclusive holder downgrades to shared. An incompatible
    /// request is queued non-granted and `false` is returned.
    pub fn acquire(
        &self,
        transaction_id: u64,
        resource: &str,
        kind: ResourceKind,
        mode: LockMode,
    ) -> bool {
        let mut table = self.table.write();

        let Some(requests) = table.get_mut(resource) else {
            // No existing locks: grant immediately.
            table.insert(
                resource.to_string(),
                vec![LockRequest {
                    transaction_id,
                    resource: resource.to_string(),
                    kind,
                    mode,
                    granted: true,
                }],
            );
            debug!(transaction_id, resource, mode = mode.as_str(), "lock granted");
            return true;
        };

        // The transaction may already hold a lock on this resource.
        if let Some(position) = requests
            .iter()
            .position(|r| r.transaction_id == transaction_id && r.granted)
        {
            let held = requests[position].mode;
            if held == mode {
                return true;
            }
            if held == LockMode::Shared && mode == LockMode::Exclusive {
                let shared_holders = requests
                    .iter()
                    .filter(|r| r.granted && r.mode == LockMode::Shared)
                    .count();
                if shared_holders == 1 {
                    requests[position].mode = LockMode::Exclusive;
                    debug!(transaction_id, resource, "lock upgraded to exclusive");
                    return true;
                }
                debug!(transaction_id, resource, "lock upgrade rejected");
                return false;
            }
            // Exclusive holder downgrades to shared.
            requests[position].mode = LockMode::Shared;
            debug!(transaction_id, resource, "lock downgraded to shared");
            return true;
        }

        let request = LockRequest {
            transaction_id,
            resource: resource.to_string(),
            kind,
            mode,
            granted: false,
        };

        if is_compatible(mode, requests) {
            let mut request = request;
            request.granted = true;
            requests.push(request);
            debug!(transaction_id, resource, mode = mode.as_str(), "lock granted");
            return true;
        }

        // Incompatible: queue the request for later promotion.
        requests.push(request);
        debug!(transaction_id, resource, mode = mode.as_str(), "lock queued");
        false
    }

    /// Releases every lock owned by the transaction and promotes queued
    /// requests that became compatible, FIFO per resource.
    pub fn release_all(&self, transaction_id: u64) {
        let mut table = self.table.write();

        for requests in table.values_mut() {
            requests.retain(|r| r.transaction_id != transaction_id);

            for i in 0..requests.len() {
                if requests[i].granted {
                    continue;
                }
                let mode = requests[i].mode;
                let compatible = requests
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .all(|(_, r)| match mode {
                        LockMode::Exclusive => !r.granted,
                        LockMode::Shared => !r.granted || r.mode == LockMode::Shared,
                    });
                if compatible {
                    requests[i].granted = true;
                    debug!(
                        transaction_id = requests[i].transaction_id,
                        resource = %requests[i].resource,
                        "queued lock promoted"
                    );
                }
            }
        }

        table.retain(|_, requests| !requests.is_empty());
        debug!(transaction_id, "all locks released");
    }

    /// Returns every request owned by the transaction.
    #[must_use]
    pub fn transaction_locks(&self, transaction_id: u64) -> Vec<LockRequest> {
        self.table
            .read()
            .values()
            .flatten()
            .filter(|r| r.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    /// Reports whether the wait-for graph currently contains a cycle.
    ///
    /// An edge runs from every transaction with a queued request to every
    /// transaction holding a granted lock on the same resource.
    #[must_use]
    pub fn detect_deadlock(&self) -> bool {
        let table = self.table.read();

        let mut wait_for: HashMap<u64, HashSet<u64>> = HashMap::new();
        for requests in table.values() {
            let holders: HashSet<u64> = requests
                .iter()
                .filter(|r| r.granted)
                .map(|r| r.transaction_id)
                .collect();
            for request in requests.iter().filter(|r| !r.granted) {
                let edges = wait_for.entry(request.transaction_id).or_default();
                edges.extend(
                    holders
                        .iter()
                        .filter(|&&h| h != request.transaction_id)
                        .copied(),
                );
            }
        }

        wait_for.keys().any(|&start| {
            let mut visited = HashSet::new();
            let mut stack = HashSet::new();
            has_cycle(&wait_for, start, &mut visited, &mut stack)
        })
    }
}

/// True when a request of `mode` can be granted alongside the given
/// granted entries.
fn is_compatible(mode: LockMode, existing: &[LockRequest]) -> bool {
    match mode {
        LockMode::Exclusive => existing.iter().all(|r| !r.granted),
        LockMode::Shared => existing
            .iter()
            .all(|r| !r.granted || r.mode == LockMode::Shared),
    }
}

/// DFS cycle check with a recursion stack.
fn has_cycle(
    graph: &HashMap<u64, HashSet<u64>>,
    node: u64,
    visited: &mut HashSet<u64>,
    stack: &mut HashSet<u64>,
) -> bool {
    visited.insert(node);
    stack.insert(node);

    if let Some(neighbors) = graph.get(&node) {
        for &next in neighbors {
            if !visited.contains(&next) {
                if has_cycle(graph, next, visited, stack) {
                    return true;
                }
            } else if stack.contains(&next) {
                return true;
            }
        }
    }

    stack.remove(&node);
    false
}
