use log::{debug, info, warn};
use sysinfo::{Pid, System};
use tokio::task;

/// Name of a running process, if it still exists.
pub fn process_name(pid: u32) -> Option<String> {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    if !system.refresh_process(target) {
        return None;
    }
    system.process(target).map(|p| p.name().to_string())
}

/// `name (pid N)` for log lines, or just `pid N` once the process is gone.
pub fn describe(pid: u32) -> String {
    match process_name(pid) {
        Some(name) => format!("{} (pid {})", name, pid),
        None => format!("pid {}", pid),
    }
}

/// Forcefully kill `pid`. A process that is already gone counts as
/// terminated; the current process is never killed.
pub fn terminate(pid: u32) -> bool {
    if pid == std::process::id() {
        warn!("Refusing to terminate own process {}", pid);
        return false;
    }

    let mut system = System::new();
    let target = Pid::from_u32(pid);
    if !system.refresh_process(target) {
        debug!("Process {} already exited", pid);
        return true;
    }

    match system.process(target) {
        Some(process) => {
            let name = process.name().to_string();
            if process.kill() {
                info!("Terminated {} (pid {})", name, pid);
                true
            } else {
                warn!("Failed to terminate {} (pid {})", name, pid);
                false
            }
        }
        None => true,
    }
}

pub async fn terminate_blocking(pid: u32) -> bool {
    match task::spawn_blocking(move || terminate(pid)).await {
        Ok(killed) => killed,
        Err(join_err) => {
            debug!("Termination task for pid {} failed: {}", pid, join_err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_terminates_itself() {
        assert!(!terminate(std::process::id()));
    }

    #[test]
    fn own_process_has_a_name() {
        let own = std::process::id();
        assert!(process_name(own).is_some());
        let label = describe(own);
        assert!(label.ends_with(&format!("(pid {})", own)), "{}", label);
    }

    #[test]
    fn vanished_process_is_described_by_pid() {
        assert_eq!(describe(u32::MAX), format!("pid {}", u32::MAX));
    }
}
