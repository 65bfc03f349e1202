use std::{
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};

use crate::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0 && !self.timed_out && !self.cancelled
    }
}

#[derive(Debug, Clone)]
pub struct RunLimits<'a> {
    pub timeout: Option<Duration>,
    pub max_capture_bytes: usize,
    pub cancel: &'a CancelToken,
}

/// Execute a program in `cwd` and capture stdout/stderr.
///
/// The child is killed once `limits.timeout` elapses or the cancel token
/// fires; the returned output records which of the two happened.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or the I/O streams cannot
/// be read entirely.
pub fn run_command(
    program: &str,
    args: &[String],
    cwd: &Path,
    limits: &RunLimits<'_>,
) -> Result<RunOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so a kill reaches installers' subprocesses too.
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {program}"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("stdout missing for {program}"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("stderr missing for {program}"))?;
    let limit = limits.max_capture_bytes;
    let stdout_handle = thread::spawn(move || read_to_string_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_to_string_limited(stderr, limit));

    let start = Instant::now();
    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to poll {program}"))?
        {
            break Some(status);
        }
        if limits.cancel.is_cancelled() {
            cancelled = true;
        } else if limits.timeout.is_some_and(|timeout| start.elapsed() > timeout) {
            timed_out = true;
        }
        if timed_out || cancelled {
            kill_process_group(&mut child);
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };
    let code = status.and_then(|status| status.code()).unwrap_or(-1);

    let (mut stdout, stdout_truncated) = stdout_handle
        .join()
        .map_err(|_| anyhow::anyhow!("stdout thread panicked"))??;
    let (mut stderr, stderr_truncated) = stderr_handle
        .join()
        .map_err(|_| anyhow::anyhow!("stderr thread panicked"))??;
    if stdout_truncated {
        stdout.push_str("\n[...truncated...]\n");
    }
    if stderr_truncated {
        stderr.push_str("\n[...truncated...]\n");
    }
    Ok(RunOutput {
        code,
        stdout,
        stderr,
        timed_out,
        cancelled,
    })
}

fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes no pointers; a negative pid names the group
        // the child leads.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

fn read_to_string_limited(mut reader: impl Read, limit: usize) -> Result<(String, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        append_limited(&mut buffer, &chunk[..read], limit, &mut truncated);
    }
    Ok((String::from_utf8_lossy(&buffer).to_string(), truncated))
}

// Keeps the tail: the end of a failing installer's output is what explains it.
fn append_limited(buffer: &mut Vec<u8>, chunk: &[u8], limit: usize, truncated: &mut bool) {
    if limit == 0 {
        return;
    }
    if buffer.len().saturating_add(chunk.len()) <= limit {
        buffer.extend_from_slice(chunk);
        return;
    }
    *truncated = true;
    let old_len = buffer.len();
    let excess = old_len.saturating_add(chunk.len()).saturating_sub(limit);
    if excess >= old_len {
        buffer.clear();
        let drop_from_chunk = excess.saturating_sub(old_len).min(chunk.len());
        buffer.extend_from_slice(&chunk[drop_from_chunk..]);
    } else {
        buffer.drain(0..excess);
        buffer.extend_from_slice(chunk);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_CAPTURE_BYTES;

    fn sh(script: &str, limits: &RunLimits<'_>) -> Result<RunOutput> {
        run_command(
            "/bin/sh",
            &["-c".to_string(), script.to_string()],
            Path::new("."),
            limits,
        )
    }

    fn limits(cancel: &CancelToken) -> RunLimits<'_> {
        RunLimits {
            timeout: None,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            cancel,
        }
    }

    #[test]
    fn run_command_captures_output_and_status() -> Result<()> {
        let cancel = CancelToken::new();
        let output = sh("printf out && printf err >&2; exit 7", &limits(&cancel))?;
        assert_eq!(output.code, 7);
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert!(!output.success());
        Ok(())
    }

    #[test]
    fn run_command_uses_the_given_directory() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cwd = std::fs::canonicalize(temp.path())?;
        let cancel = CancelToken::new();
        let output = run_command("pwd", &[], &cwd, &limits(&cancel))?;
        assert!(output.success());
        assert_eq!(output.stdout.trim(), cwd.display().to_string());
        Ok(())
    }

    #[test]
    fn run_command_truncates_large_output() -> Result<()> {
        let cancel = CancelToken::new();
        let limits = RunLimits {
            max_capture_bytes: 1024,
            ..limits(&cancel)
        };
        let output = sh("head -c 8192 /dev/zero | tr '\\0' a", &limits)?;
        assert!(output.stdout.contains("[...truncated...]"));
        assert!(output.stdout.len() <= 1024 + 64);
        Ok(())
    }

    #[test]
    fn run_command_kills_on_timeout() -> Result<()> {
        let cancel = CancelToken::new();
        let limits = RunLimits {
            timeout: Some(Duration::from_millis(200)),
            ..limits(&cancel)
        };
        let start = Instant::now();
        let output = sh("exec sleep 30", &limits)?;
        assert!(output.timed_out);
        assert!(!output.success());
        assert!(start.elapsed() < Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn timeout_also_kills_forked_subprocesses() -> Result<()> {
        let cancel = CancelToken::new();
        let limits = RunLimits {
            timeout: Some(Duration::from_millis(200)),
            ..limits(&cancel)
        };
        let start = Instant::now();
        // The shell forks `sleep`, which inherits the output pipes.
        let output = sh("sleep 5; true", &limits)?;
        assert!(output.timed_out);
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "returned after {:?}",
            start.elapsed()
        );
        Ok(())
    }

    #[test]
    fn cancelling_mid_run_kills_forked_subprocesses() -> Result<()> {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });
        let start = Instant::now();
        let output = sh("sleep 5; true", &limits(&cancel))?;
        canceller.join().expect("canceller thread");
        assert!(output.cancelled);
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "returned after {:?}",
            start.elapsed()
        );
        Ok(())
    }

    #[test]
    fn run_command_stops_when_cancelled() -> Result<()> {
        let cancel = CancelToken::new();
        cancel.cancel();
        let output = sh("exec sleep 30", &limits(&cancel))?;
        assert!(output.cancelled);
        assert!(!output.success());
        Ok(())
    }

    #[test]
    fn missing_program_is_an_error() {
        let cancel = CancelToken::new();
        let result = run_command(
            "/definitely/not/a/program",
            &[],
            Path::new("."),
            &limits(&cancel),
        );
        assert!(result.is_err());
    }
}
