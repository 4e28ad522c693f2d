use average::{Estimate, Mean};
use tracing::{debug, warn};

use super::clock::Stamp;
use super::event::Command;
use super::observer::Observer;
use super::state::{BILLING_UNIT_SECS, FleetCtx, Queue, VmId};
use crate::error::ScheduleError;

/// Controller tunables, fixed for a run.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Minimum pool size per queue.
    pub floor: usize,
    /// Launch until at least this fraction of a pool is free.
    pub min_idle_fraction: f64,
    /// Retire once more than this fraction of a pool is free.
    pub max_idle_fraction: f64,
    /// Delay between the launch command and the vm accepting work.
    pub boot_secs: i64,
    /// How long a job may wait for a vm past its arrival.
    pub placement_slack_secs: i64,
    /// Window from the first arrival during which a failed placement is
    /// tolerated instead of fatal.
    pub warmup_grace_secs: i64,
    /// Only vms this close to their next billing hour may retire.
    pub retire_deadline_minutes: i64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            floor: 40,
            min_idle_fraction: 0.4,
            max_idle_fraction: 0.7,
            boot_secs: 120,
            placement_slack_secs: 5,
            warmup_grace_secs: 86_400,
            retire_deadline_minutes: 10,
        }
    }
}

/// Outcome of one scheduling step: the commands to emit, plus the
/// utilization counters for the optional side log.
#[derive(Debug)]
pub struct Scheduled {
    pub commands: Vec<Command>,
    pub pool_size: usize,
    pub free_real: usize,
}

/// Totals reported once a replay finishes cleanly.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    pub jobs: u64,
    pub unplaced: u64,
    pub launched: u64,
    pub retired: u64,
    pub billed_hours: u64,
    pub mean_start_delay: f64,
}

/// The scheduling engine. Owns the three pools, places each arriving job
/// and runs the feedback controller that launches and retires vms.
pub struct Scheduler {
    ctx: FleetCtx,
    cfg: Tunables,
    run_start: Option<Stamp>,
    observer: Observer,
    start_delay: Mean,
    jobs: u64,
    unplaced: u64,
    launched: u64,
    retired: u64,
    billed_hours: u64,
}

impl Scheduler {
    pub fn new(cfg: Tunables) -> Self {
        Self {
            ctx: FleetCtx::new(),
            cfg,
            run_start: None,
            observer: Observer::default(),
            start_delay: Mean::new(),
            jobs: 0,
            unplaced: 0,
            launched: 0,
            retired: 0,
            billed_hours: 0,
        }
    }

    pub fn ctx(&self) -> &FleetCtx {
        &self.ctx
    }

    pub fn config(&self) -> &Tunables {
        &self.cfg
    }

    /// Places one arriving job and rebalances its queue's pool.
    ///
    /// Commands come back in emission order: warm-up launches, surplus
    /// terminations, floor launches, then min-idle launches.
    pub fn schedule(
        &mut self,
        now: Stamp,
        queue: Queue,
        uid: &str,
        length_secs: f64,
    ) -> Result<Scheduled, ScheduleError> {
        let mut commands = Vec::new();
        let run_start = match self.run_start {
            Some(t) => t,
            None => {
                self.run_start = Some(now);
                self.warm_up(now, &mut commands);
                now
            }
        };
        let in_grace = now.seconds_since(run_start) <= self.cfg.warmup_grace_secs;

        // One walk over the pool: utilization counters plus the first vm
        // that can take the job within the slack window. After the grace
        // window the vm must also be done booting, otherwise its start
        // could not stay within the slack.
        let horizon = (now.epoch() + self.cfg.placement_slack_secs) as f64;
        let mut free_ignoring_boot = 0usize;
        let mut free_real = 0usize;
        let mut target: Option<VmId> = None;
        for idx in 0..self.ctx.pool_len(queue) {
            let id = self.ctx.pool(queue)[idx];
            let vm = self.ctx.vm_mut(id);
            if vm.free_now(now, true) {
                free_ignoring_boot += 1;
            }
            if vm.free_now(now, false) {
                free_real += 1;
            }
            if target.is_none()
                && vm.next_free(now) < horizon
                && (in_grace || now >= vm.active_from)
            {
                target = Some(id);
            }
        }

        match target {
            Some(id) => {
                let started = self.ctx.vm_mut(id).assign(now, uid, length_secs);
                self.start_delay.add(started - now.epoch() as f64);
            }
            None if in_grace => {
                self.unplaced += 1;
                warn!(uid, %queue, at = %now, "no vm within slack, tolerated during warm-up");
            }
            None => {
                return Err(ScheduleError::Placement {
                    uid: uid.to_owned(),
                    queue,
                    at: now,
                });
            }
        }
        self.jobs += 1;

        // Controller, in strict order: shed surplus first, then grow back
        // to the floor, then to the minimum idle fraction. The counters
        // are the ones from the walk above; the job just placed is not
        // deducted until the next call.
        let max_allowed = self.cfg.max_idle_fraction * self.ctx.pool_len(queue) as f64;
        if free_ignoring_boot as f64 > max_allowed {
            let n = (free_ignoring_boot as f64 - max_allowed).ceil() as usize;
            if free_ignoring_boot.saturating_sub(n) > self.cfg.floor {
                self.retire_into(now, queue, n, &mut commands);
            }
        }

        let mut free = free_ignoring_boot;
        if free < self.cfg.floor {
            self.launch_n(now, queue, self.cfg.floor - free, &mut commands);
            free = self.cfg.floor;
        }
        let min_needed = self.cfg.min_idle_fraction * self.ctx.pool_len(queue) as f64;
        if (free as f64) < min_needed {
            let n = (min_needed - free as f64).ceil() as usize;
            self.launch_n(now, queue, n, &mut commands);
        }

        self.observer.observe(&self.ctx, &self.cfg, now);
        Ok(Scheduled {
            commands,
            pool_size: self.ctx.pool_len(queue),
            free_real,
        })
    }

    /// Retires up to `n` idle vms of one queue, closest-to-billing first.
    /// Never drops the pool below the floor; retires fewer than `n` (or
    /// none) when not enough vms qualify.
    pub fn retire(&mut self, now: Stamp, queue: Queue, n: usize) -> Vec<Command> {
        let mut commands = Vec::new();
        self.retire_into(now, queue, n, &mut commands);
        commands
    }

    /// Retires every remaining vm in every pool. End-of-stream only.
    pub fn shutdown(&mut self, at: Stamp) -> Vec<Command> {
        let mut commands = Vec::new();
        for queue in Queue::ALL {
            while let Some(vm) = self.ctx.pop_front(queue) {
                self.billed_hours += billed_hours(vm.created_at, at);
                self.retired += 1;
                commands.push(Command::Terminate { at, queue });
            }
        }
        debug!(terminated = commands.len(), at = %at, "shutdown");
        commands
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            jobs: self.jobs,
            unplaced: self.unplaced,
            launched: self.launched,
            retired: self.retired,
            billed_hours: self.billed_hours,
            mean_start_delay: self.start_delay.estimate(),
        }
    }

    // The first arrival seeds every pool with exactly `floor` vms.
    fn warm_up(&mut self, now: Stamp, commands: &mut Vec<Command>) {
        debug_assert!(self.ctx.is_empty(), "warm-up on a non-empty fleet");
        for queue in Queue::ALL {
            self.launch_n(now, queue, self.cfg.floor, commands);
        }
    }

    fn launch_n(&mut self, now: Stamp, queue: Queue, n: usize, commands: &mut Vec<Command>) {
        for _ in 0..n {
            self.ctx.launch(queue, now, self.cfg.boot_secs);
            commands.push(Command::Launch { at: now, queue });
        }
        if n > 0 {
            self.launched += n as u64;
            debug!(%queue, n, at = %now, "launched");
        }
    }

    // Billing is hourly from launch, so a vm that has just rolled into a
    // fresh hour is the worst possible candidate. Bucket the idle vms by
    // whole minutes left in their hour and drain the buckets ascending,
    // launch order within a bucket.
    fn retire_into(&mut self, now: Stamp, queue: Queue, n: usize, commands: &mut Vec<Command>) {
        let stoppable = self.ctx.pool_len(queue).saturating_sub(self.cfg.floor);
        let n = n.min(stoppable);
        if n == 0 {
            return;
        }

        let deadline = self.cfg.retire_deadline_minutes;
        let mut buckets: Vec<Vec<VmId>> = vec![Vec::new(); deadline as usize];
        for idx in 0..self.ctx.pool_len(queue) {
            let id = self.ctx.pool(queue)[idx];
            let vm = self.ctx.vm_mut(id);
            if !vm.free_now(now, true) {
                continue;
            }
            let left = vm.minutes_left_in_hour(now);
            if left < deadline {
                buckets[left as usize].push(id);
            }
        }

        let mut done = 0usize;
        'buckets: for bucket in buckets {
            for id in bucket {
                if done == n {
                    break 'buckets;
                }
                let vm = self.ctx.remove(queue, id);
                self.billed_hours += billed_hours(vm.created_at, now);
                commands.push(Command::Terminate { at: now, queue });
                done += 1;
            }
        }
        if done > 0 {
            self.retired += done as u64;
            debug!(%queue, retired = done, at = %now, "retired");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Tunables::default())
    }
}

fn billed_hours(created: Stamp, stopped: Stamp) -> u64 {
    (stopped.seconds_since(created).max(0) as u64).div_ceil(BILLING_UNIT_SECS as u64)
}
