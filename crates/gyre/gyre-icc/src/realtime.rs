//! Loop threads with optional real-time scheduling.
//!
//! [`spawn_loop`] starts a named thread, applies the requested scheduling
//! class and priority from inside that thread, and only then lets the loop
//! body run. The caller blocks until the thread reports back, so a rejected
//! scheduling request fails startup instead of silently running best-effort.
//!
//! Memory pinning (`mlockall`) is process-wide and advisory: if it fails the
//! loop still starts and a warning is logged.

use crate::error::TransportError;
use crossbeam::channel::bounded;
use gyre_config::{SchedPolicy, ThreadParams};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Cooperative run flag polled by the loop body once per iteration.
#[derive(Clone, Debug)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running loop thread. Stops and joins on drop.
pub struct LoopThread<T> {
    name: String,
    flag: RunFlag,
    handle: Option<JoinHandle<Option<T>>>,
    memory_locked: bool,
}

/// Starts `body` on a new thread named `name`.
///
/// With `params.real_time` set, the priority is checked against the policy's
/// range first, memory is pinned, and the scheduling attributes are applied
/// on the new thread before `body` is entered.
pub fn spawn_loop<T, F>(name: &str, params: &ThreadParams, body: F) -> Result<LoopThread<T>, TransportError>
where
    F: FnOnce(RunFlag) -> T + Send + 'static,
    T: Send + 'static,
{
    let request = if params.real_time {
        Some(SchedRequest::validated(params.policy, params.priority)?)
    } else {
        None
    };

    let memory_locked = request.is_some() && lock_memory();

    let flag = RunFlag::new();
    let thread_flag = flag.clone();
    let (ready_tx, ready_rx) = bounded::<Result<(), TransportError>>(1);

    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        if let Some(request) = request {
            if let Err(e) = request.apply() {
                let _ = ready_tx.send(Err(e));
                return None;
            }
        }
        let _ = ready_tx.send(Ok(()));
        Some(body(thread_flag))
    });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            if memory_locked {
                unlock_memory();
            }
            return Err(TransportError::Spawn(e));
        }
    };

    let started = ready_rx.recv().unwrap_or_else(|_| {
        Err(TransportError::Spawn(io::Error::other(
            "loop thread exited before reporting start",
        )))
    });

    if let Err(e) = started {
        let _ = handle.join();
        if memory_locked {
            unlock_memory();
        }
        return Err(e);
    }

    match request {
        Some(r) => info!(thread = name, policy = %r.policy, priority = r.priority, "real-time loop started"),
        None => info!(thread = name, "loop started"),
    }

    Ok(LoopThread {
        name: name.to_string(),
        flag,
        handle: Some(handle),
        memory_locked,
    })
}

impl<T> LoopThread<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_flag(&self) -> &RunFlag {
        &self.flag
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clears the run flag, joins the thread and hands back what the loop
    /// body returned. Later calls return `None`.
    pub fn stop(&mut self) -> Option<T> {
        self.flag.stop();
        let handle = self.handle.take()?;

        let result = match handle.join() {
            Ok(value) => value,
            Err(_) => {
                error!(thread = %self.name, "loop thread panicked");
                None
            }
        };

        if self.memory_locked {
            self.memory_locked = false;
            unlock_memory();
        }
        info!(thread = %self.name, "loop stopped");
        result
    }
}

impl<T> Drop for LoopThread<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Copy, Debug)]
struct SchedRequest {
    policy: SchedPolicy,
    priority: i32,
}

impl SchedRequest {
    #[cfg(target_os = "linux")]
    fn validated(policy: SchedPolicy, priority: i32) -> Result<Self, TransportError> {
        // Time-sharing threads carry no static priority.
        if policy == SchedPolicy::Other {
            if priority != 0 {
                debug!(priority, "priority ignored for the 'other' policy");
            }
            return Ok(Self { policy, priority: 0 });
        }

        let id = policy_id(policy);
        // SAFETY: plain queries on a valid policy constant
        let (min, max) = unsafe { (libc::sched_get_priority_min(id), libc::sched_get_priority_max(id)) };
        if min < 0 || max < 0 {
            return Err(TransportError::Scheduling {
                policy,
                priority,
                source: io::Error::last_os_error(),
            });
        }
        if !(min..=max).contains(&priority) {
            return Err(TransportError::InvalidPriority {
                policy,
                priority,
                min,
                max,
            });
        }
        Ok(Self { policy, priority })
    }

    #[cfg(not(target_os = "linux"))]
    fn validated(_policy: SchedPolicy, _priority: i32) -> Result<Self, TransportError> {
        Err(TransportError::NotSupported)
    }

    // must run on the thread being configured
    #[cfg(target_os = "linux")]
    fn apply(self) -> Result<(), TransportError> {
        // SAFETY: sched_param is pod, zero-initialization standard
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        param.sched_priority = self.priority;

        // SAFETY: pthread_self is the calling thread, param outlives the call
        let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy_id(self.policy), &param) };
        if rc != 0 {
            return Err(TransportError::Scheduling {
                policy: self.policy,
                priority: self.priority,
                source: io::Error::from_raw_os_error(rc),
            });
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn apply(self) -> Result<(), TransportError> {
        Err(TransportError::NotSupported)
    }
}

#[cfg(target_os = "linux")]
fn policy_id(policy: SchedPolicy) -> libc::c_int {
    match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => libc::SCHED_OTHER,
    }
}

#[cfg(target_os = "linux")]
fn lock_memory() -> bool {
    // SAFETY: mlockall takes only flag bits and touches no caller memory
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc != 0 {
        warn!(error = %io::Error::last_os_error(), "mlockall failed, pages may be swapped");
        return false;
    }
    debug!("process memory locked");
    true
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> bool {
    warn!("memory locking is not supported on this platform");
    false
}

#[cfg(target_os = "linux")]
fn unlock_memory() {
    // SAFETY: munlockall takes no arguments and touches no caller memory
    if unsafe { libc::munlockall() } != 0 {
        warn!(error = %io::Error::last_os_error(), "munlockall failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn unlock_memory() {}
