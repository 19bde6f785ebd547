//! Spawning app processes with output capture

use crate::process::running::AppRunningState;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Windows process creation flag that suppresses the console window
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Spawn `exe` with `args`, pipe its output into the monitor buffer and track it
///
/// The working directory defaults to the executable's directory. Returns the pid.
pub fn spawn_captured(
    exe: &Path,
    args: &[String],
    cwd: Option<&Path>,
    running: &Arc<AppRunningState>,
) -> std::io::Result<u32> {
    let mut command = Command::new(exe);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = cwd.or_else(|| exe.parent().filter(|p| !p.as_os_str().is_empty())) {
        command.current_dir(dir);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = command.spawn()?;
    let pid = child.id();
    info!("Started {} (pid {pid})", exe.display());

    running.monitor().clear();
    if let Some(stdout) = child.stdout.take() {
        pipe_into_monitor(stdout, Arc::clone(running));
    }
    if let Some(stderr) = child.stderr.take() {
        pipe_into_monitor(stderr, Arc::clone(running));
    }

    running.attach(child);
    Ok(pid)
}

/// Run a command to completion without capture and return its exit code
pub fn run_to_completion(exe: &Path, args: &[String]) -> std::io::Result<Option<i32>> {
    debug!("Running {} {:?}", exe.display(), args);
    let status = Command::new(exe).args(args).status()?;
    Ok(status.code())
}

fn pipe_into_monitor<R: Read + Send + 'static>(stream: R, running: Arc<AppRunningState>) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            match line {
                Ok(line) => running.monitor().push(line),
                Err(e) => {
                    debug!("Output stream closed: {e}");
                    break;
                }
            }
        }
    });
}
