use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Largest response read back from the formatter.
const MAX_RESPONSE_BYTES: u64 = 4096;

/// One request line in, one raw response out.
#[async_trait]
pub trait FormatGateway: Send + Sync {
    async fn call(&self, request_line: &str) -> Result<String, GatewayError>;
}

/// Used when no formatter is configured. Every call fails immediately.
pub struct DisabledGateway;

#[async_trait]
impl FormatGateway for DisabledGateway {
    async fn call(&self, _request_line: &str) -> Result<String, GatewayError> {
        Err(GatewayError::Disabled)
    }
}

/// Spawns the formatter program once per call.
///
/// The whole exchange (write request, read response until EOF) is bounded
/// by `timeout`. The child is always reaped before `call` returns: waited
/// for after a normal exchange, killed and waited for otherwise.
pub struct ProcessGateway {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessGateway {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl FormatGateway for ProcessGateway {
    async fn call(&self, request_line: &str) -> Result<String, GatewayError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(GatewayError::Spawn)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let request = format!("{}\n", request_line);

        let exchange = async move {
            let mut stdin = stdin.ok_or_else(|| GatewayError::Io(broken_pipe("stdin")))?;
            let stdout = stdout.ok_or_else(|| GatewayError::Io(broken_pipe("stdout")))?;

            // A formatter may answer without reading its input
            if let Err(e) = write_request(&mut stdin, &request).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(GatewayError::Io(e));
                }
                debug!("Formatter closed stdin early: {}", e);
            }
            drop(stdin);

            let mut buf = Vec::new();
            let mut limited = stdout.take(MAX_RESPONSE_BYTES);
            limited.read_to_end(&mut buf).await?;
            Ok::<_, GatewayError>(String::from_utf8_lossy(&buf).into_owned())
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                // Response is in; the child should exit on its own
                match tokio::time::timeout(self.timeout, child.wait()).await {
                    Ok(Ok(status)) => debug!("Formatter exited with {}", status),
                    Ok(Err(e)) => warn!("Formatter wait failed: {}", e),
                    Err(_) => {
                        warn!("Formatter lingered after responding, killing");
                        if let Err(e) = child.kill().await {
                            warn!("Formatter kill failed: {}", e);
                        }
                    }
                }
                result
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Formatter kill failed: {}", e);
                }
                Err(GatewayError::Timeout(self.timeout))
            }
        }
    }
}

async fn write_request(stdin: &mut ChildStdin, request: &str) -> io::Result<()> {
    stdin.write_all(request.as_bytes()).await?;
    stdin.shutdown().await
}

fn broken_pipe(which: &str) -> io::Error {
    io::Error::new(
        ErrorKind::BrokenPipe,
        format!("formatter {} unavailable", which),
    )
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn shell(script: &str, timeout: Duration) -> ProcessGateway {
        ProcessGateway::new("sh", timeout).with_args(["-c", script])
    }

    #[tokio::test]
    async fn exchanges_one_line() {
        let gw = shell(r#"read line; printf 'OK|%s\n' "$line""#, Duration::from_secs(2));
        let response = gw.call("FORMAT|alice|hi|general").await.unwrap();
        assert_eq!(response, "OK|FORMAT|alice|hi|general\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let gw = ProcessGateway::new("/nonexistent/formatter", Duration::from_secs(1));
        assert!(matches!(gw.call("MOTD").await, Err(GatewayError::Spawn(_))));
    }

    #[tokio::test]
    async fn hung_formatter_times_out() {
        let gw = shell("exec sleep 10", Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(gw.call("MOTD").await, Err(GatewayError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timed_out_formatter_is_reaped() {
        let pid_file = std::env::temp_dir().join(format!("murmur-fmt-{}.pid", std::process::id()));
        let script = format!("echo $$ > '{}'; exec sleep 10", pid_file.display());
        let gw = shell(&script, Duration::from_millis(500));

        assert!(matches!(gw.call("MOTD").await, Err(GatewayError::Timeout(_))));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let _ = std::fs::remove_file(&pid_file);
        let pid: u32 = pid.trim().parse().unwrap();
        // Killed and waited for: not even a zombie entry remains
        assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
    }

    #[tokio::test]
    async fn formatter_that_ignores_stdin_still_answers() {
        let gw = shell("echo 'OK|welcome'", Duration::from_secs(2));
        assert_eq!(gw.call("MOTD").await.unwrap(), "OK|welcome\n");
    }

    #[tokio::test]
    async fn closed_stdin_does_not_lose_the_response() {
        let gw = shell("exec 0<&-; sleep 0.2; echo 'OK|welcome'", Duration::from_secs(2));
        for _ in 0..10 {
            assert_eq!(gw.call("MOTD").await.unwrap(), "OK|welcome\n");
        }
    }

    #[tokio::test]
    async fn disabled_gateway_fails_fast() {
        assert!(matches!(DisabledGateway.call("MOTD").await, Err(GatewayError::Disabled)));
    }
}
