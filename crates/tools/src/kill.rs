//! Port and process termination helpers.
//!
//! `killPort` resolves the PIDs listening on a port (`lsof` on Unix,
//! `netstat -aon` on Windows) and force-kills each one.

use std::time::Duration;
use strata_core::ActionError;
use tokio::process::Command;
use tracing::{debug, warn};

/// `Killed 1 background process` / `Killed 3 background processes`.
pub fn killed_background_message(count: usize) -> String {
    let noun = if count == 1 { "process" } else { "processes" };
    format!("Killed {count} background {noun}")
}

/// Kill every process listening on `port`. Returns the PIDs terminated.
pub async fn kill_port(port: u16, timeout: Duration) -> Result<Vec<u32>, ActionError> {
    let pids = listening_pids(port, timeout).await?;
    debug!(port, ?pids, "Resolved listening processes");

    let mut killed = Vec::new();
    for pid in pids {
        match terminate(pid, timeout).await {
            Ok(true) => killed.push(pid),
            Ok(false) => warn!(pid, "Kill command reported failure"),
            Err(e) => warn!(pid, error = %e, "Failed to run kill command"),
        }
    }
    Ok(killed)
}

async fn output_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<std::process::Output, ActionError> {
    let child = Command::new(program).args(args).kill_on_drop(true).output();
    match tokio::time::timeout(timeout, child).await {
        Ok(result) => result.map_err(|e| ActionError::io(program, e)),
        Err(_) => Err(ActionError::io(
            program,
            std::io::Error::new(std::io::ErrorKind::TimedOut, format!("timed out after {timeout:?}")),
        )),
    }
}

async fn listening_pids(port: u16, timeout: Duration) -> Result<Vec<u32>, ActionError> {
    if cfg!(target_os = "windows") {
        let out = output_with_timeout("netstat", &["-aon"], timeout).await?;
        Ok(parse_netstat_pids(&String::from_utf8_lossy(&out.stdout), port))
    } else {
        // lsof exits 1 when nothing matches; that is an empty result
        let target = format!("-ti:{port}");
        let out = output_with_timeout("lsof", &[target.as_str()], timeout).await?;
        Ok(parse_pid_lines(&String::from_utf8_lossy(&out.stdout)))
    }
}

async fn terminate(pid: u32, timeout: Duration) -> Result<bool, ActionError> {
    let pid_str = pid.to_string();
    let out = if cfg!(target_os = "windows") {
        output_with_timeout("taskkill", &["/F", "/PID", &pid_str], timeout).await?
    } else {
        output_with_timeout("kill", &["-9", &pid_str], timeout).await?
    };
    Ok(out.status.success())
}

/// One PID per line, as printed by `lsof -t`.
pub fn parse_pid_lines(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .filter(|pid| *pid > 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// PIDs from `netstat -aon` rows whose local address ends in `:<port>`.
pub fn parse_netstat_pids(output: &str, port: u16) -> Vec<u32> {
    let suffix = format!(":{port}");
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let local = cols.get(1)?;
            if !local.ends_with(&suffix) {
                return None;
            }
            cols.last()?.parse().ok()
        })
        .filter(|pid| *pid > 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_kill_message() {
        assert_eq!(killed_background_message(1), "Killed 1 background process");
        assert_eq!(killed_background_message(0), "Killed 0 background processes");
        assert_eq!(killed_background_message(2), "Killed 2 background processes");
    }

    #[test]
    fn lsof_output_parsing() {
        assert_eq!(parse_pid_lines("4312\n981\n4312\n\n"), vec![981, 4312]);
        assert!(parse_pid_lines("").is_empty());
    }

    #[test]
    fn netstat_output_parsing() {
        let out = "\
  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:3000           0.0.0.0:0              LISTENING       1234
  TCP    [::]:3000              [::]:0                 LISTENING       1234
  TCP    0.0.0.0:30001          0.0.0.0:0              LISTENING       999
  TCP    127.0.0.1:52000        127.0.0.1:3000         ESTABLISHED     777
";
        assert_eq!(parse_netstat_pids(out, 3000), vec![1234]);
    }
}
