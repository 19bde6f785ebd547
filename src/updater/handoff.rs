//! Installer handoff
//!
//! A running executable cannot overwrite itself on every platform, so the
//! update is finished by a small script: it waits until the manager's pid is
//! gone, copies the staged files over the install directory and starts the
//! manager again. The manager exits right after spawning it.

use crate::error::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// Everything the helper script needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffPlan {
    /// Pid of the manager process to wait for
    pub pid: u32,
    /// Directory holding the extracted update
    pub staging_dir: PathBuf,
    /// Directory the manager runs from
    pub install_dir: PathBuf,
    /// Manager executable to restart
    pub executable: PathBuf,
}

impl HandoffPlan {
    /// Plan for replacing the running manager with the files in `staging_dir`
    pub fn for_current_process(staging_dir: impl Into<PathBuf>) -> Result<Self> {
        let executable = std::env::current_exe()?;
        let install_dir = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            pid: std::process::id(),
            staging_dir: staging_dir.into(),
            install_dir,
            executable,
        })
    }
}

/// Script file name for this platform
pub fn script_name() -> &'static str {
    if cfg!(windows) { "darts-hub-update.bat" } else { "darts-hub-update.sh" }
}

/// Batch script for Windows
pub fn windows_script(plan: &HandoffPlan) -> String {
    let pid = plan.pid;
    let mut script = String::from("@echo off\r\n");
    let _ = write!(
        script,
        ":wait\r\n\
         tasklist /FI \"PID eq {pid}\" 2>NUL | find \"{pid}\" >NUL\r\n\
         if not errorlevel 1 (\r\n\
         \x20 timeout /t 1 /nobreak >NUL\r\n\
         \x20 goto wait\r\n\
         )\r\n\
         xcopy /E /Y /I /Q \"{}\\*\" \"{}\\\" >NUL\r\n\
         start \"\" \"{}\"\r\n\
         del \"%~f0\"\r\n",
        plan.staging_dir.display(),
        plan.install_dir.display(),
        plan.executable.display(),
    );
    script
}

/// POSIX shell script for Linux and macOS
pub fn unix_script(plan: &HandoffPlan) -> String {
    let pid = plan.pid;
    let staging = sh_quote(&format!("{}/.", plan.staging_dir.display()));
    let install = sh_quote(&plan.install_dir.display().to_string());
    let exe = sh_quote(&plan.executable.display().to_string());
    format!(
        "#!/bin/sh\n\
         while kill -0 {pid} 2>/dev/null; do sleep 1; done\n\
         cp -R {staging} {install}\n\
         chmod +x {exe}\n\
         nohup {exe} >/dev/null 2>&1 &\n\
         rm -f \"$0\"\n"
    )
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Write the platform script into `dir` and return its path
pub fn write_script(plan: &HandoffPlan, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(script_name());
    let content = if cfg!(windows) { windows_script(plan) } else { unix_script(plan) };
    std::fs::write(&path, content)?;
    crate::download::extract::make_executable(&path)?;
    Ok(path)
}

/// Start the script detached from the manager
pub fn launch(script: &Path) -> Result<()> {
    #[cfg(windows)]
    let mut command = {
        use std::os::windows::process::CommandExt;
        let mut command = Command::new("cmd");
        command
            .arg("/C")
            .arg(script)
            .creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
        command
    };
    #[cfg(not(windows))]
    let mut command = {
        let mut command = Command::new("sh");
        command.arg(script);
        command
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = command.spawn()?;
    info!("Update helper started (pid {})", child.id());
    Ok(())
}
