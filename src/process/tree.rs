//! Tree-aware process termination
//!
//! `ProcessTreeKiller` is the single seam for stopping an app. Windows and
//! Linux terminate the tracked pid directly. macOS does not clean up
//! descendants, so its killer enumerates the process table, resolves each
//! process's parent through `proc_pidinfo` and terminates children before
//! their parents.
//!
//! Every termination runs twice in immediate succession: a watchdog inside an
//! app may respawn a child as soon as it sees it die.

use crate::error::{DartsHubError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Number of termination passes per request
const TERMINATION_PASSES: usize = 2;

/// Snapshot-and-kill view of the OS process table
pub trait ProcessTable: Send + Sync {
    /// All processes as `(pid, parent pid)` pairs
    fn processes(&self) -> Vec<(u32, Option<u32>)>;

    /// Terminate one process; returns whether a kill signal was delivered
    fn kill(&self, pid: u32) -> bool;

    /// Whether the pid currently exists
    fn exists(&self, pid: u32) -> bool {
        self.processes().iter().any(|(p, _)| *p == pid)
    }

    /// Pids of processes whose executable name (without extension) matches
    fn find_by_name(&self, name: &str) -> Vec<u32>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for &T {
    fn processes(&self) -> Vec<(u32, Option<u32>)> {
        (**self).processes()
    }

    fn kill(&self, pid: u32) -> bool {
        (**self).kill(pid)
    }

    fn exists(&self, pid: u32) -> bool {
        (**self).exists(pid)
    }

    fn find_by_name(&self, name: &str) -> Vec<u32> {
        (**self).find_by_name(name)
    }
}

/// Terminates a process and its descendants
pub trait ProcessTreeKiller: Send + Sync {
    /// Terminate `pid` and everything it spawned
    ///
    /// A pid that no longer exists is not an error.
    fn terminate_tree(&self, pid: u32) -> Result<()>;
}

/// Process table backed by `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    fn refreshed() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        system
    }
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Vec<(u32, Option<u32>)> {
        let system = Self::refreshed();
        system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let parent = native_parent_pid(pid).or_else(|| process.parent().map(Pid::as_u32));
                (pid, parent)
            })
            .collect()
    }

    fn kill(&self, pid: u32) -> bool {
        let system = Self::refreshed();
        system
            .process(Pid::from_u32(pid))
            .is_some_and(sysinfo::Process::kill)
    }

    /// Zombies count as gone: they are dead and only wait to be reaped
    fn exists(&self, pid: u32) -> bool {
        Self::refreshed()
            .process(Pid::from_u32(pid))
            .is_some_and(|p| p.status() != ProcessStatus::Zombie)
    }

    fn find_by_name(&self, name: &str) -> Vec<u32> {
        let wanted = normalize_process_name(name);
        let system = Self::refreshed();
        system
            .processes()
            .iter()
            .filter(|(_, p)| normalize_process_name(&p.name().to_string_lossy()) == wanted)
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }
}

/// Resolve the true parent pid through the BSD process info query
///
/// # Safety
///
/// `proc_pidinfo` writes at most `size` bytes into `info`, a zeroed stack value
/// of exactly that size. The return value is checked before `info` is read.
#[cfg(target_os = "macos")]
#[expect(unsafe_code, reason = "FFI call to proc_pidinfo for the parent pid")]
fn native_parent_pid(pid: u32) -> Option<u32> {
    let pid = libc::c_int::try_from(pid).ok()?;
    let mut info: libc::proc_bsdinfo = unsafe { std::mem::zeroed() };
    let size = libc::c_int::try_from(std::mem::size_of::<libc::proc_bsdinfo>()).ok()?;
    let written = unsafe {
        libc::proc_pidinfo(
            pid,
            libc::PROC_PIDTBSDINFO,
            0,
            (&raw mut info).cast::<libc::c_void>(),
            size,
        )
    };
    (written == size).then_some(info.pbi_ppid)
}

#[cfg(not(target_os = "macos"))]
fn native_parent_pid(_pid: u32) -> Option<u32> {
    None
}

/// Lowercase file stem of a process or executable name
///
/// - `"C:\\Apps\\darts-caller.exe"` -> `"darts-caller"`
/// - `"DroidCamApp.EXE"` -> `"droidcamapp"`
pub fn normalize_process_name(name: &str) -> String {
    let file = name.rsplit(['\\', '/']).next().unwrap_or(name);
    let stem = match file.rfind('.') {
        Some(pos) if pos > 0 => &file[..pos],
        _ => file,
    };
    stem.to_lowercase()
}

/// Terminates only the given pid (Windows, Linux)
pub struct DirectKiller<T: ProcessTable> {
    table: T,
}

impl<T: ProcessTable> DirectKiller<T> {
    /// Create a killer over a process table
    pub fn new(table: T) -> Self {
        Self { table }
    }
}

impl<T: ProcessTable> ProcessTreeKiller for DirectKiller<T> {
    fn terminate_tree(&self, pid: u32) -> Result<()> {
        for pass in 0..TERMINATION_PASSES {
            if !self.table.kill(pid) {
                debug!("Pass {pass}: process {pid} already gone");
            }
        }
        Ok(())
    }
}

/// Terminates descendants before their parents (macOS)
pub struct TreeWalkingKiller<T: ProcessTable> {
    table: T,
}

impl<T: ProcessTable> TreeWalkingKiller<T> {
    /// Create a killer over a process table
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Post-order list of `root` and its descendants (deepest first, root last)
    fn termination_order(&self, root: u32) -> Vec<u32> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (pid, parent) in self.table.processes() {
            if let Some(parent) = parent.filter(|p| *p != pid) {
                children.entry(parent).or_default().push(pid);
            }
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        collect_post_order(root, &children, &mut visited, &mut order);
        order
    }
}

fn collect_post_order(
    pid: u32,
    children: &HashMap<u32, Vec<u32>>,
    visited: &mut HashSet<u32>,
    order: &mut Vec<u32>,
) {
    if !visited.insert(pid) {
        return;
    }
    if let Some(kids) = children.get(&pid) {
        for kid in kids {
            collect_post_order(*kid, children, visited, order);
        }
    }
    order.push(pid);
}

impl<T: ProcessTable> ProcessTreeKiller for TreeWalkingKiller<T> {
    fn terminate_tree(&self, pid: u32) -> Result<()> {
        for pass in 0..TERMINATION_PASSES {
            let order = self.termination_order(pid);
            debug!("Pass {pass}: terminating {order:?}");
            for target in order {
                if !self.table.kill(target) {
                    debug!("Process {target} already gone");
                }
            }
        }

        if self.table.exists(pid) {
            warn!("Process {pid} survived termination");
            return Err(DartsHubError::ProcessKill {
                subject: pid.to_string(),
                reason: "process still running after termination".to_string(),
            });
        }
        Ok(())
    }
}

/// Killer appropriate for the running platform
pub fn platform_killer() -> Arc<dyn ProcessTreeKiller> {
    if cfg!(target_os = "macos") {
        Arc::new(TreeWalkingKiller::new(SystemProcessTable))
    } else {
        Arc::new(DirectKiller::new(SystemProcessTable))
    }
}
