use rustc_hash::FxHashSet;

use super::clock::Stamp;
use super::driver::Tunables;
use super::state::{FleetCtx, Queue};

/// Debug-build invariant sweep, run after every scheduling step.
#[derive(Debug, Default)]
pub struct Observer {
    last_seen: Option<Stamp>,
}

impl Observer {
    pub fn observe(&mut self, ctx: &FleetCtx, cfg: &Tunables, now: Stamp) {
        if let Some(last) = self.last_seen {
            debug_assert!(last <= now, "time went backwards: {last} -> {now}");
        }
        self.last_seen = Some(now);

        if ctx.is_empty() {
            return;
        }

        let now_f = now.epoch() as f64;
        let mut pooled = 0usize;
        let mut seen: FxHashSet<_> = FxHashSet::default();

        for queue in Queue::ALL {
            let pool = ctx.pool(queue);
            pooled += pool.len();
            debug_assert!(
                pool.len() >= cfg.floor,
                "pool {queue} shrank below the floor: {} < {}",
                pool.len(),
                cfg.floor
            );

            let mut free = 0usize;
            for &id in pool {
                debug_assert!(seen.insert(id), "vm {id:?} pooled twice");
                let vm = ctx.vms.get(id).expect("pooled vm missing from arena");
                debug_assert_eq!(vm.queue, queue, "vm {id:?} pooled under the wrong queue");
                if vm.assignment().is_none_or(|a| a.ends_at <= now_f) {
                    free += 1;
                }
            }

            // The walk runs after the current job took its vm, so the free
            // count may sit one below the floor until the next call.
            debug_assert!(
                free + 1 >= cfg.floor,
                "free vms under {queue} fell below the floor: {free} + placed < {}",
                cfg.floor
            );
        }

        debug_assert_eq!(pooled, ctx.vms.len(), "arena and pools disagree");
    }
}
