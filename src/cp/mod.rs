//! External constraint-programming optimizer bridge.
//!
//! Hands a complete warm-start schedule to a CP-SAT service running as a
//! separate process and reads back a candidate schedule. One JSON request
//! on stdin, one JSON response on stdout, with a hard wall-clock timeout.
//!
//! # Wire format
//!
//! Request: `{"engineInput": …, "warmStart": …, "timeLimitSeconds": n}`
//!
//! Response: `{"output": EngineOutput, "quality": …, "degradations": […],
//! "message": "…", "technicalDetails": […], "noOptimized": bool}`; only
//! `output` is required.
//!
//! # Failure isolation
//!
//! Every failure of the child (missing binary, non-zero exit, timeout,
//! unreadable output) is reported as an [`OptimizerError`]. On timeout the
//! exchange future is dropped; the child is killed with it and its pipes
//! are closed, so nothing outlives the call.
//!
//! # Reference
//! - Perron & Furnon, "OR-Tools CP-SAT"
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::models::{EngineInput, EngineOutput};

/// Default interpreter.
pub const DEFAULT_PROGRAM: &str = "python3";
/// Default service script, relative to the working directory.
pub const DEFAULT_SCRIPT: &str = "engine/cp_sat_service.py";

/// Subprocess boundary failure.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// The child could not be started.
    #[error("failed to start optimizer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Talking to the child failed.
    #[error("optimizer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The child outlived its budget and was killed.
    #[error("optimizer timed out after {}ms", after.as_millis())]
    TimedOut { after: Duration },

    /// The child exited unsuccessfully.
    #[error("optimizer exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The response is not a candidate payload.
    #[error("malformed optimizer response: {0}")]
    Malformed(String),
}

impl OptimizerError {
    /// Short machine-readable cause.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn_failed",
            Self::Io(_) => "io_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::ExitStatus { .. } => "exit_status",
            Self::Malformed(_) => "malformed_response",
        }
    }
}

/// Request sent to the optimizer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerRequest<'a> {
    pub engine_input: &'a EngineInput,
    pub warm_start: &'a EngineOutput,
    pub time_limit_seconds: u64,
}

/// Candidate returned by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    /// Proposed schedule.
    pub output: EngineOutput,
    /// The optimizer gave up and echoed the warm start.
    #[serde(default)]
    pub no_optimized: bool,
    /// Self-reported quality; informational only.
    #[serde(default)]
    pub quality: Option<Value>,
    #[serde(default)]
    pub degradations: Vec<Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub technical_details: Vec<String>,
}

/// An optimizer that improves a complete warm start.
///
/// The engine re-validates whatever comes back; implementations need not
/// be trusted.
pub trait Optimizer: Send + Sync {
    /// Returns a candidate schedule within `time_limit_seconds`.
    fn optimize(
        &self,
        input: &EngineInput,
        warm_start: &EngineOutput,
        time_limit_seconds: u64,
    ) -> Result<CandidateResponse, OptimizerError>;
}

/// Runs the optimizer as a child process.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use showday_engine::cp::SubprocessOptimizer;
///
/// let optimizer = SubprocessOptimizer::new("python3")
///     .with_args(["services/cp_sat_service.py"])
///     .with_grace(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SubprocessOptimizer {
    program: String,
    args: Vec<String>,
    /// Added to the time limit for process start-up and I/O.
    grace: Duration,
    /// Lower bound of the total budget.
    min_timeout: Duration,
}

impl Default for SubprocessOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM).with_args([DEFAULT_SCRIPT])
    }
}

impl SubprocessOptimizer {
    /// Runs `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            grace: Duration::from_secs(3),
            min_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the grace margin.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Sets the minimum total budget.
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Wall-clock budget for a run with this time limit.
    pub fn timeout_for(&self, time_limit_seconds: u64) -> Duration {
        (Duration::from_secs(time_limit_seconds) + self.grace).max(self.min_timeout)
    }

    /// Runs one request/response exchange on a private current-thread
    /// runtime. Must not be called from inside another tokio runtime.
    fn exchange(&self, payload: Vec<u8>, budget: Duration) -> Result<Vec<u8>, OptimizerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_child(payload, budget))
    }

    async fn run_child(&self, payload: Vec<u8>, budget: Duration) -> Result<Vec<u8>, OptimizerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OptimizerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // A child that exits without reading closes the pipe.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let exchange = async move {
            let (written, output) = tokio::join!(write, child.wait_with_output());
            let output = output?;
            written?;
            Ok::<_, std::io::Error>(output)
        };

        // Dropping the timed-out future drops the child, which kills it.
        let output = timeout(budget, exchange)
            .await
            .map_err(|_| OptimizerError::TimedOut { after: budget })??;

        if !output.status.success() {
            return Err(OptimizerError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Optimizer for SubprocessOptimizer {
    fn optimize(
        &self,
        input: &EngineInput,
        warm_start: &EngineOutput,
        time_limit_seconds: u64,
    ) -> Result<CandidateResponse, OptimizerError> {
        let request = OptimizerRequest {
            engine_input: input,
            warm_start,
            time_limit_seconds,
        };
        let payload =
            serde_json::to_vec(&request).map_err(|e| OptimizerError::Malformed(e.to_string()))?;
        let budget = self.timeout_for(time_limit_seconds);
        debug!(program = %self.program, budget_ms = budget.as_millis() as u64, "starting optimizer");

        let stdout = self.exchange(payload, budget)?;
        serde_json::from_slice(&stdout).map_err(|e| OptimizerError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::models::TimeWindow;

    fn input() -> EngineInput {
        EngineInput::new(TimeWindow::new("09:00", "12:00"))
    }

    fn shell(script: &str) -> SubprocessOptimizer {
        SubprocessOptimizer::new("sh")
            .with_args(["-c", script])
            .with_grace(Duration::from_millis(300))
            .with_min_timeout(Duration::ZERO)
    }

    #[test]
    fn test_timeout_budget() {
        let optimizer = SubprocessOptimizer::default();
        assert_eq!(optimizer.timeout_for(0), Duration::from_secs(5));
        assert_eq!(optimizer.timeout_for(10), Duration::from_secs(13));
    }

    #[test]
    fn test_request_shape() {
        let input = input();
        let warm = EngineOutput::default();
        let request = OptimizerRequest {
            engine_input: &input,
            warm_start: &warm,
            time_limit_seconds: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["timeLimitSeconds"], 7);
        assert_eq!(value["engineInput"]["workDay"]["start"], "09:00");
        assert!(value["warmStart"]["plannedTasks"].is_array());
    }

    #[test]
    fn test_missing_program() {
        let err = SubprocessOptimizer::new("showday-no-such-optimizer")
            .optimize(&input(), &EngineOutput::default(), 1)
            .unwrap_err();
        assert_eq!(err.kind(), "spawn_failed");
    }

    #[cfg(unix)]
    #[test]
    fn test_valid_response() {
        let optimizer = shell(
            r#"grep -q timeLimitSeconds && echo '{"output":{"feasible":true,"complete":true,"hardFeasible":true,"plannedTasks":[{"taskId":1,"startPlanned":"09:00","endPlanned":"09:30"}]},"message":"ok"}'"#,
        );
        let response = optimizer.optimize(&input(), &EngineOutput::default(), 1).unwrap();
        assert!(response.output.complete);
        assert_eq!(response.output.planned_tasks.len(), 1);
        assert_eq!(response.message, "ok");
        assert!(!response.no_optimized);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let err = shell("cat > /dev/null; echo boom >&2; exit 3")
            .optimize(&input(), &EngineOutput::default(), 1)
            .unwrap_err();
        match err {
            OptimizerError::ExitStatus { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_response() {
        for script in ["cat > /dev/null; echo not-json", r#"cat > /dev/null; echo '{"message":"no output"}'"#] {
            let err = shell(script)
                .optimize(&input(), &EngineOutput::default(), 1)
                .unwrap_err();
            assert_eq!(err.kind(), "malformed_response", "{script}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_child_is_killed() {
        let started = Instant::now();
        let err = shell("exec sleep 30")
            .optimize(&input(), &EngineOutput::default(), 0)
            .unwrap_err();
        assert!(matches!(err, OptimizerError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_grandchild_holding_pipes_does_not_block() {
        // `sh` forks `sleep`, which inherits stdout and stderr.
        let started = Instant::now();
        let err = shell("sleep 30; :")
            .optimize(&input(), &EngineOutput::default(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), "timed_out");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_child_ignoring_stdin() {
        let optimizer = shell(r#"echo '{"output":{},"noOptimized":true}'"#);
        let response = optimizer.optimize(&input(), &EngineOutput::default(), 1).unwrap();
        assert!(response.no_optimized);
    }
}
