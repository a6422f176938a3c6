//! Child-process runner for the external downloader

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{Invocation, MediaTool, ToolError, ToolOutput};

/// Runs yt-dlp (or any binary with the same contract) as a child process.
///
/// stdout and stderr are captured up to the invocation's output limit each;
/// going over it, or over the deadline, kills the child and everything it
/// spawned.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    binary: PathBuf,
    deadline: Duration,
}

impl ProcessTool {
    pub fn new(binary: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            binary: binary.into(),
            deadline,
        }
    }
}

#[async_trait]
impl MediaTool for ProcessTool {
    fn engine(&self) -> &str {
        "yt-dlp"
    }

    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let mut command = Command::new(&self.binary);
        command
            .args(&invocation.args)
            .env("TMPDIR", &invocation.temp_dir)
            .env("TEMP", &invocation.temp_dir)
            .env("TMP", &invocation.temp_dir)
            .current_dir(&invocation.temp_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // yt-dlp forks ffmpeg; a group of its own lets one signal reach both
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(ToolError::Spawn)?;
        let mut group = ProcessGroup::new(child.id());
        debug!(pid = ?child.id(), binary = %self.binary.display(), "Spawned downloader");

        let limit = invocation.output_limit.as_usize();
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                terminate(&mut child, &mut group).await;
                return Err(ToolError::Io(io::Error::other("child pipes not captured")));
            }
        };

        let mut stdout_buf = BytesMut::with_capacity(8 * 1024);
        let mut stderr_buf = BytesMut::with_capacity(8 * 1024);

        let supervised = async {
            let (_, _, status) = tokio::try_join!(
                read_capped(stdout, &mut stdout_buf, limit),
                read_capped(stderr, &mut stderr_buf, limit),
                async {
                    let status = child.wait().await.map_err(Halt::Io)?;
                    // Strays still in the group would keep the pipes open
                    group.kill();
                    Ok::<_, Halt>(status)
                },
            )?;
            Ok::<_, Halt>(status)
        };

        let outcome = tokio::time::timeout(self.deadline, supervised).await;
        let diagnostics = String::from_utf8_lossy(&stderr_buf).into_owned();

        match outcome {
            Ok(Ok(status)) => Ok(ToolOutput {
                success: status.success(),
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                diagnostics,
            }),
            Ok(Err(halt)) => {
                terminate(&mut child, &mut group).await;
                Err(match halt {
                    Halt::Overflow => ToolError::OutputOverflow { limit, diagnostics },
                    Halt::Io(e) => ToolError::Io(e),
                })
            }
            Err(_) => {
                terminate(&mut child, &mut group).await;
                Err(ToolError::Timeout {
                    deadline: self.deadline,
                    diagnostics,
                })
            }
        }
    }
}

/// Why output capture stopped early
enum Halt {
    Overflow,
    Io(io::Error),
}

/// Process group led by the downloader. Killed at most once, and on drop so
/// an abandoned job takes its grandchildren with it.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(leader) = self.leader.take() else {
            return;
        };
        let Ok(raw) = i32::try_from(leader) else {
            return;
        };

        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            // Group already empty
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid = raw, error = %e, "Failed to kill downloader process group"),
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Kill the whole group, then reap the child
async fn terminate(child: &mut Child, group: &mut ProcessGroup) {
    group.kill();
    if let Err(e) = child.kill().await {
        // Already reaped when the failure came after exit
        debug!(error = %e, "Downloader process already gone");
    }
}

/// Read a pipe to EOF into `buf`, stopping once more than `limit` bytes arrive
async fn read_capped<R>(mut reader: R, buf: &mut BytesMut, limit: usize) -> Result<(), Halt>
where
    R: AsyncRead + Unpin,
{
    loop {
        let n = reader.read_buf(buf).await.map_err(Halt::Io)?;
        if n == 0 {
            return Ok(());
        }
        if buf.len() > limit {
            return Err(Halt::Overflow);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for yt-dlp
    fn fake_binary(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation(dir: &Path, args: &[&str], limit: ByteSize) -> Invocation {
        Invocation {
            args: args.iter().map(|a| a.to_string()).collect(),
            output_limit: limit,
            temp_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_captures_successful_run() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(temp_dir.path(), "echo \"got $#\"; echo warn >&2; exit 0");
        let tool = ProcessTool::new(binary, Duration::from_secs(5));

        let output = tool
            .run(&invocation(temp_dir.path(), &["a", "b"], ByteSize::mib(1)))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "got 2");
        assert_eq!(output.diagnostics.trim(), "warn");
    }

    #[tokio::test]
    async fn test_reports_nonzero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(temp_dir.path(), "echo 'ERROR: unsupported URL' >&2; exit 1");
        let tool = ProcessTool::new(binary, Duration::from_secs(5));

        let output = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.diagnostics.contains("unsupported URL"));
    }

    #[tokio::test]
    async fn test_sets_temp_env() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(temp_dir.path(), "printf '%s' \"$TMPDIR\"");
        let tool = ProcessTool::new(binary, Duration::from_secs(5));

        let output = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await
            .unwrap();

        assert_eq!(output.stdout, temp_dir.path().display().to_string());
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(
            temp_dir.path(),
            "echo '[youtube] starting download' >&2; exec sleep 30",
        );
        let tool = ProcessTool::new(binary, Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await;

        match result {
            Err(ToolError::Timeout {
                deadline,
                diagnostics,
            }) => {
                assert_eq!(deadline, Duration::from_millis(200));
                assert!(diagnostics.contains("starting download"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_deadline_kills_background_children() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("late.txt");
        let binary = fake_binary(
            temp_dir.path(),
            &format!(
                "(sleep 1; echo late > '{}') & exec sleep 30",
                marker.display()
            ),
        );
        let tool = ProcessTool::new(binary, Duration::from_millis(200));

        let result = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_exit_is_not_held_by_background_children() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(temp_dir.path(), "(sleep 30) & echo done");
        let tool = ProcessTool::new(binary, Duration::from_secs(10));

        let started = std::time::Instant::now();
        let output = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "done");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_output_ceiling_kills_process() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_binary(
            temp_dir.path(),
            "echo 'WARNING: throttled' >&2; while true; do echo 'progress line that never ends'; done",
        );
        let tool = ProcessTool::new(binary, Duration::from_secs(10));

        let result = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize(4 * 1024)))
            .await;

        match result {
            Err(ToolError::OutputOverflow { limit, diagnostics }) => {
                assert_eq!(limit, 4096);
                assert!(diagnostics.contains("throttled"));
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let temp_dir = TempDir::new().unwrap();
        let tool = ProcessTool::new(temp_dir.path().join("nope"), Duration::from_secs(1));

        let result = tool
            .run(&invocation(temp_dir.path(), &[], ByteSize::mib(1)))
            .await;

        assert!(matches!(result, Err(ToolError::Spawn(_))));
    }
}
