use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::process_control;

/// Finds the processes holding a file open and terminates them.
///
/// Errors are reported as strings and treated by callers as "no holders".
pub trait LockResolver: Send + Sync {
    fn find_holders(&self, path: &Path) -> impl Future<Output = Result<Vec<u32>, String>> + Send;

    fn terminate(&self, pid: u32) -> impl Future<Output = bool> + Send;
}

/// Sysinternals `handle.exe`, as found on Windows hosts.
#[derive(Debug, Clone)]
pub struct HandleToolResolver {
    program: String,
    timeout: Duration,
}

impl HandleToolResolver {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("handle.exe", timeout)
    }

    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        HandleToolResolver {
            program: program.into(),
            timeout,
        }
    }
}

impl LockResolver for HandleToolResolver {
    async fn find_holders(&self, path: &Path) -> Result<Vec<u32>, String> {
        let mut command = Command::new(&self.program);
        command
            .arg("-accepteula")
            .arg("-nobanner")
            .arg(path)
            .kill_on_drop(true);
        // handle.exe exits non-zero when nothing matches, so only stdout matters
        let output = run_tool(command, self.timeout, &self.program).await?;
        Ok(parse_handle_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn terminate(&self, pid: u32) -> bool {
        process_control::terminate_blocking(pid).await
    }
}

/// `lsof -t`, available on most Unix hosts.
#[derive(Debug, Clone)]
pub struct LsofResolver {
    timeout: Duration,
}

impl LsofResolver {
    pub fn new(timeout: Duration) -> Self {
        LsofResolver { timeout }
    }
}

impl LockResolver for LsofResolver {
    async fn find_holders(&self, path: &Path) -> Result<Vec<u32>, String> {
        let mut command = Command::new("lsof");
        command.arg("-t").arg("--").arg(path).kill_on_drop(true);
        let output = run_tool(command, self.timeout, "lsof").await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Exit status 1 with no output just means nobody has the file open
        if stdout.trim().is_empty() && !output.status.success() && output.status.code() != Some(1)
        {
            return Err(format!(
                "lsof failed (status {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(parse_lsof_output(&stdout))
    }

    async fn terminate(&self, pid: u32) -> bool {
        process_control::terminate_blocking(pid).await
    }
}

/// For hosts without a handle enumeration tool: nobody ever holds a file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl LockResolver for NoopResolver {
    async fn find_holders(&self, _path: &Path) -> Result<Vec<u32>, String> {
        Ok(Vec::new())
    }

    async fn terminate(&self, _pid: u32) -> bool {
        false
    }
}

/// Whichever resolver the host supports.
#[derive(Debug, Clone)]
pub enum SystemResolver {
    Handle(HandleToolResolver),
    Lsof(LsofResolver),
    Noop(NoopResolver),
}

impl SystemResolver {
    #[cfg_attr(not(any(unix, windows)), allow(unused_variables))]
    pub fn detect(lookup_timeout: Duration) -> Self {
        #[cfg(windows)]
        {
            if tool_available("where", "handle.exe") {
                return SystemResolver::Handle(HandleToolResolver::new(lookup_timeout));
            }
        }

        #[cfg(unix)]
        {
            if tool_available("which", "lsof") {
                return SystemResolver::Lsof(LsofResolver::new(lookup_timeout));
            }
        }

        log::info!("No handle enumeration tool found; locked files cannot be released");
        SystemResolver::Noop(NoopResolver)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemResolver::Handle(_) => "handle.exe",
            SystemResolver::Lsof(_) => "lsof",
            SystemResolver::Noop(_) => "none",
        }
    }
}

impl LockResolver for SystemResolver {
    async fn find_holders(&self, path: &Path) -> Result<Vec<u32>, String> {
        match self {
            SystemResolver::Handle(r) => r.find_holders(path).await,
            SystemResolver::Lsof(r) => r.find_holders(path).await,
            SystemResolver::Noop(r) => r.find_holders(path).await,
        }
    }

    async fn terminate(&self, pid: u32) -> bool {
        match self {
            SystemResolver::Handle(r) => r.terminate(pid).await,
            SystemResolver::Lsof(r) => r.terminate(pid).await,
            SystemResolver::Noop(r) => r.terminate(pid).await,
        }
    }
}

#[cfg(any(windows, unix))]
fn tool_available(locator: &str, tool: &str) -> bool {
    std::process::Command::new(locator)
        .arg(tool)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn run_tool(mut command: Command, limit: Duration, tool: &str) -> Result<Output, String> {
    match timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(format!("Failed to run {}: {}", tool, err)),
        Err(_) => Err(format!("{} timed out after {}s", tool, limit.as_secs())),
    }
}

/// PIDs following each `pid:` marker in `handle.exe` output.
pub fn parse_handle_output(stdout: &str) -> Vec<u32> {
    let mut pids = BTreeSet::new();
    for line in stdout.lines() {
        let lower = line.to_lowercase();
        let mut rest = lower.as_str();
        while let Some(idx) = rest.find("pid:") {
            rest = &rest[idx + "pid:".len()..];
            if let Some(Ok(pid)) = rest.split_whitespace().next().map(str::parse::<u32>) {
                pids.insert(pid);
            }
        }
    }
    pids.into_iter().collect()
}

/// One PID per line, as printed by `lsof -t`.
pub fn parse_lsof_output(stdout: &str) -> Vec<u32> {
    let pids: BTreeSet<u32> = stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.into_iter().collect()
}
