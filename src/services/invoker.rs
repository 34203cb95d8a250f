//! External analyzer invocation.
//!
//! Builds the analyzer command line additively from configuration, executes
//! it with a job-scoped log directory and a hard wall-clock timeout, and
//! captures combined stdout/stderr regardless of exit code. A non-zero
//! exit, spawn failure, or timeout is a hard failure; no retries happen at
//! this layer.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::config::AnalyzerConfig;
use crate::errors::AppError;

/// Name of the analyzer entry-point script inside its install directory.
const ANALYZER_BIN: &str = "emba";

/// One successful analyzer run.
#[derive(Debug)]
pub struct AnalysisRun {
    pub log_dir: PathBuf,
    /// Combined stdout/stderr of the analyzer process.
    pub output: String,
}

/// Invoker bound to one analyzer configuration.
#[derive(Debug, Clone)]
pub struct AnalyzerInvoker {
    config: AnalyzerConfig,
}

impl AnalyzerInvoker {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Whether the analyzer entry point exists at the configured path.
    pub fn is_available(&self) -> bool {
        self.config.path.join(ANALYZER_BIN).is_file()
    }

    /// The job-scoped log directory for a given job id.
    pub fn log_dir_for(&self, job_id: &str) -> PathBuf {
        self.config.log_dir.join(job_id)
    }

    /// Build the argument vector. Purely additive: the fixed base set plus
    /// one flag per enabled optional feature; disabled features emit
    /// nothing.
    pub fn command_args(&self, firmware: &Path, log_dir: &Path) -> Vec<String> {
        let profile = self
            .config
            .path
            .join("scan-profiles")
            .join(&self.config.scan_profile);

        let mut args = vec![
            "-l".to_string(),
            log_dir.display().to_string(),
            "-f".to_string(),
            firmware.display().to_string(),
            "-p".to_string(),
            profile.display().to_string(),
            "-W".to_string(),
            "-g".to_string(),
            "-t".to_string(),
            self.config.threads.to_string(),
        ];

        if self.config.enable_emulation {
            args.push("-E".to_string());
        }
        if self.config.enable_cwe_check {
            args.push("-c".to_string());
        }
        if self.config.enable_live_testing {
            args.push("-L".to_string());
        }

        args
    }

    /// Run the analyzer against a firmware image. Creates the log directory
    /// if absent. The returned output is available to callers for the job's
    /// diagnostic metadata whether or not parsing later finds anything.
    pub async fn run(&self, firmware: &Path, job_id: &str) -> Result<AnalysisRun, AppError> {
        if !self.is_available() {
            return Err(AppError::Invocation(format!(
                "analyzer not found at {}",
                self.config.path.join(ANALYZER_BIN).display()
            )));
        }

        let log_dir = self.log_dir_for(job_id);
        tokio::fs::create_dir_all(&log_dir).await?;

        let args = self.command_args(firmware, &log_dir);
        tracing::info!(job_id, args = ?args, "Starting analyzer");

        let mut child = Command::new(self.config.path.join(ANALYZER_BIN))
            .args(&args)
            .current_dir(&self.config.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Invocation(format!("failed to start analyzer: {e}")))?;

        let output_task = capture_output(&mut child);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                status.map_err(|e| AppError::Invocation(format!("analyzer wait failed: {e}")))?
            }
            Err(_) => {
                child.kill().await.ok();
                return Err(AppError::Invocation(format!(
                    "analyzer timed out after {}s and was terminated",
                    self.config.timeout_secs
                )));
            }
        };

        let output = output_task.await.unwrap_or_default();

        if !status.success() {
            return Err(AppError::Invocation(format!(
                "analyzer exited with {status}: {output}"
            )));
        }

        Ok(AnalysisRun { log_dir, output })
    }
}

/// Drain the child's stdout and stderr concurrently so a chatty analyzer
/// never blocks on a full pipe, returning the combined text.
fn capture_output(child: &mut Child) -> tokio::task::JoinHandle<String> {
    async fn drain(pipe: Option<impl AsyncReadExt + Unpin + Send + 'static>) -> String {
        let Some(mut pipe) = pipe else {
            return String::new();
        };
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let (out, err) = tokio::join!(drain(stdout), drain(stderr));
        if err.is_empty() {
            out
        } else if out.is_empty() {
            err
        } else {
            format!("{out}\n{err}")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use std::os::unix::fs::PermissionsExt;

    fn config(path: &Path, log_dir: &Path) -> AnalyzerConfig {
        AnalyzerConfig {
            path: path.to_path_buf(),
            log_dir: log_dir.to_path_buf(),
            scan_profile: "default-scan.emba".to_string(),
            threads: 4,
            enable_emulation: false,
            enable_cwe_check: false,
            enable_live_testing: false,
            timeout_secs: 5,
        }
    }

    fn install_fake_analyzer(dir: &Path, script: &str) {
        let bin = dir.join(ANALYZER_BIN);
        std::fs::write(&bin, script).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn base_args_without_optional_features() {
        let cfg = config(Path::new("/opt/analyzer"), Path::new("/var/log/fs"));
        let invoker = AnalyzerInvoker::new(cfg);
        let args = invoker.command_args(Path::new("/tmp/fw.bin"), Path::new("/var/log/fs/job1"));

        assert_eq!(
            args,
            vec![
                "-l",
                "/var/log/fs/job1",
                "-f",
                "/tmp/fw.bin",
                "-p",
                "/opt/analyzer/scan-profiles/default-scan.emba",
                "-W",
                "-g",
                "-t",
                "4",
            ]
        );
    }

    #[test]
    fn optional_features_append_flags() {
        let mut cfg = config(Path::new("/opt/analyzer"), Path::new("/var/log/fs"));
        cfg.enable_emulation = true;
        cfg.enable_cwe_check = true;
        cfg.enable_live_testing = true;
        let invoker = AnalyzerInvoker::new(cfg);
        let args = invoker.command_args(Path::new("/tmp/fw.bin"), Path::new("/var/log/fs/job1"));

        let tail: Vec<&str> = args.iter().rev().take(3).map(String::as_str).collect();
        assert_eq!(tail, vec!["-L", "-c", "-E"]);
    }

    #[tokio::test]
    async fn successful_run_captures_output() {
        let install = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        install_fake_analyzer(install.path(), "#!/bin/sh\necho analysis complete\nexit 0\n");

        let invoker = AnalyzerInvoker::new(config(install.path(), logs.path()));
        let run = invoker
            .run(Path::new("/tmp/fw.bin"), "job_ok")
            .await
            .unwrap();

        assert!(run.output.contains("analysis complete"));
        assert!(run.log_dir.ends_with("job_ok"));
        assert!(run.log_dir.is_dir());
    }

    #[tokio::test]
    async fn nonzero_exit_is_hard_failure_with_output() {
        let install = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        install_fake_analyzer(install.path(), "#!/bin/sh\necho boom >&2\nexit 1\n");

        let invoker = AnalyzerInvoker::new(config(install.path(), logs.path()));
        let err = invoker
            .run(Path::new("/tmp/fw.bin"), "job_fail")
            .await
            .unwrap_err();

        match err {
            AppError::Invocation(msg) => {
                assert!(msg.contains("boom"));
            }
            other => panic!("expected Invocation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_analyzer_is_hard_failure() {
        let install = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        let invoker = AnalyzerInvoker::new(config(install.path(), logs.path()));

        let err = invoker
            .run(Path::new("/tmp/fw.bin"), "job_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invocation(_)));
    }

    #[tokio::test]
    async fn hung_analyzer_is_killed_on_timeout() {
        let install = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        install_fake_analyzer(install.path(), "#!/bin/sh\nsleep 60\n");

        let mut cfg = config(install.path(), logs.path());
        cfg.timeout_secs = 1;
        let invoker = AnalyzerInvoker::new(cfg);

        let err = invoker
            .run(Path::new("/tmp/fw.bin"), "job_hung")
            .await
            .unwrap_err();
        match err {
            AppError::Invocation(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected Invocation error, got {other:?}"),
        }
    }
}
