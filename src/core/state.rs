use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::clock::Stamp;
use crate::error::TraceError;

// VMs are billed in whole hours from their launch time.
pub const BILLING_UNIT_SECS: i64 = 3600;

new_key_type! {
    pub struct VmId;
}

/// The three fixed workload classes. Each owns an independent vm pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    Export,
    Url,
    General,
}

impl Queue {
    pub const ALL: [Queue; 3] = [Queue::Export, Queue::Url, Queue::General];

    pub fn parse(name: &str) -> Result<Queue, TraceError> {
        match name {
            "export" => Ok(Queue::Export),
            "url" => Ok(Queue::Url),
            "general" => Ok(Queue::General),
            _ => Err(TraceError::UnknownQueue {
                name: name.to_owned(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Queue::Export => "export",
            Queue::Url => "url",
            Queue::General => "general",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The job currently bound to a vm. Times are epoch seconds; the end may
/// be fractional since job lengths are.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub uid: String,
    pub started_at: f64,
    pub ends_at: f64,
}

/// One simulated worker. Boots for a fixed delay after launch, then runs
/// at most one job at a time. Running to idle is resolved lazily: a
/// finished assignment is cleared the next time the vm is queried at a
/// later instant.
#[derive(Debug)]
pub struct Vm {
    pub queue: Queue,
    pub created_at: Stamp,
    pub active_from: Stamp,
    assignment: Option<Assignment>,
}

impl Vm {
    fn new(queue: Queue, created_at: Stamp, boot_secs: i64) -> Self {
        Self {
            queue,
            created_at,
            active_from: created_at + boot_secs,
            assignment: None,
        }
    }

    /// Earliest instant the current assignment is out of the way, ignoring
    /// boot. Equals `now` for an unassigned vm.
    pub fn next_free(&mut self, now: Stamp) -> f64 {
        let t = now.epoch() as f64;
        match &self.assignment {
            Some(job) if job.ends_at > t => job.ends_at,
            Some(_) => {
                self.assignment = None;
                t
            }
            None => t,
        }
    }

    /// Earliest time >= `now` at which this vm can start a new job.
    pub fn free_at(&mut self, now: Stamp) -> f64 {
        self.next_free(now).max(self.active_from.epoch() as f64)
    }

    pub fn free_now(&mut self, now: Stamp, ignore_boot: bool) -> bool {
        let unassigned = self.next_free(now) <= now.epoch() as f64;
        unassigned && (ignore_boot || now >= self.active_from)
    }

    /// Whole minutes remaining in the current billing hour, in [1, 60].
    pub fn minutes_left_in_hour(&self, now: Stamp) -> i64 {
        let elapsed = now
            .seconds_since(self.created_at)
            .rem_euclid(BILLING_UNIT_SECS);
        60 - elapsed / 60
    }

    /// Binds a job to this vm. The start is the three-way max of arrival,
    /// boot completion and the end of the previous assignment; returns it.
    pub fn assign(&mut self, now: Stamp, uid: &str, length_secs: f64) -> f64 {
        let started_at = self
            .next_free(now)
            .max(now.epoch() as f64)
            .max(self.active_from.epoch() as f64);
        self.assignment = Some(Assignment {
            uid: uid.to_owned(),
            started_at,
            ends_at: started_at + length_secs,
        });
        started_at
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }
}

/// All live vms, arena-allocated, with one FIFO pool of ids per queue.
/// Pool order is launch order; placement depends on it being stable.
#[derive(Debug)]
pub struct FleetCtx {
    pub vms: SlotMap<VmId, Vm>,
    pools: FxHashMap<Queue, VecDeque<VmId>>,
}

impl FleetCtx {
    pub fn new() -> Self {
        let mut pools = FxHashMap::default();
        for queue in Queue::ALL {
            pools.insert(queue, VecDeque::new());
        }
        Self {
            vms: SlotMap::with_key(),
            pools,
        }
    }

    pub fn launch(&mut self, queue: Queue, at: Stamp, boot_secs: i64) -> VmId {
        let id = self.vms.insert(Vm::new(queue, at, boot_secs));
        self.pools
            .get_mut(&queue)
            .expect("fixed queue set")
            .push_back(id);
        id
    }

    /// Removes a vm from its pool and the arena, returning it.
    pub fn remove(&mut self, queue: Queue, id: VmId) -> Vm {
        let pool = self.pools.get_mut(&queue).expect("fixed queue set");
        let pos = pool.iter().position(|&v| v == id);
        debug_assert!(pos.is_some(), "vm {id:?} not pooled under {queue}");
        if let Some(pos) = pos {
            let _ = pool.remove(pos);
        }
        self.vms.remove(id).expect("vm missing from arena")
    }

    /// Pops the oldest vm of a pool, for shutdown drains.
    pub fn pop_front(&mut self, queue: Queue) -> Option<Vm> {
        let id = self
            .pools
            .get_mut(&queue)
            .expect("fixed queue set")
            .pop_front()?;
        Some(self.vms.remove(id).expect("vm missing from arena"))
    }

    pub fn pool(&self, queue: Queue) -> &VecDeque<VmId> {
        &self.pools[&queue]
    }

    pub fn pool_len(&self, queue: Queue) -> usize {
        self.pools[&queue].len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn vm(&self, id: VmId) -> &Vm {
        &self.vms[id]
    }

    pub fn vm_mut(&mut self, id: VmId) -> &mut Vm {
        &mut self.vms[id]
    }
}

impl Default for FleetCtx {
    fn default() -> Self {
        Self::new()
    }
}
