use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::shell::error::ExecError;

#[derive(Debug, Clone)]
pub struct Child {
    pub pid: Pid,
    pub program: String,
}

/// Children spawned without waiting, kept until they can be reaped.
#[derive(Debug, Default)]
pub struct ChildTable {
    running: Vec<Child>,
}

impl ChildTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, pid: Pid, program: &str) {
        self.running.push(Child {
            pid,
            program: program.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Blocks until `pid` terminates and returns its exit code. A child
    /// killed by a signal is an error.
    pub fn wait_for(&mut self, pid: Pid, program: &str) -> Result<i32, ExecError> {
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!("{} [{}] exited with {}", program, pid, code);
                    return Ok(code);
                }
                Ok(WaitStatus::Signaled(_, signal, _core_dumped)) => {
                    return Err(ExecError::AbnormalTermination {
                        program: program.to_string(),
                        signal: format!("{:?}", signal),
                    });
                }
                Ok(status) => debug!("{} [{}] changed state: {:?}", program, pid, status),
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(ExecError::Wait {
                        program: program.to_string(),
                        source,
                    })
                }
            }
        }
    }

    /// Collects every tracked child that has terminated, without blocking.
    /// Returns how many were collected.
    pub fn reap(&mut self) -> usize {
        let before = self.running.len();
        self.running.retain(|child| {
            match waitpid(child.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => true,
                Ok(WaitStatus::Exited(pid, code)) => {
                    debug!("reaped {} [{}]: exit code {}", child.program, pid, code);
                    false
                }
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    debug!("reaped {} [{}]: killed by {:?}", child.program, pid, signal);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("waitpid({}) for {} failed: {}", child.pid, child.program, e);
                    false
                }
            }
        });
        before - self.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    #[allow(clippy::unwrap_used)]
    fn spawn(script: &str) -> Pid {
        let child = Command::new("sh").args(["-c", script]).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    #[test]
    fn test_wait_for_exit_code() {
        let mut table = ChildTable::new();
        let pid = spawn("exit 3");
        assert!(matches!(table.wait_for(pid, "sh"), Ok(3)));
    }

    #[test]
    fn test_wait_for_signaled_child() {
        let mut table = ChildTable::new();
        let pid = spawn("kill -9 $$");
        assert!(matches!(
            table.wait_for(pid, "sh"),
            Err(ExecError::AbnormalTermination { .. })
        ));
    }

    #[test]
    fn test_reap_finished_children() {
        let mut table = ChildTable::new();
        table.track(spawn("exit 0"), "sh");
        table.track(spawn("exit 1"), "sh");
        assert_eq!(table.len(), 2);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut reaped = 0;
        while reaped < 2 && Instant::now() < deadline {
            reaped += table.reap();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(reaped, 2);
        assert_eq!(table.len(), 0);
    }
}
