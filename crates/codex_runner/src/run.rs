use std::{
    ffi::OsString,
    future::Future,
    path::PathBuf,
    pin::Pin,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use futures_core::Stream;
use relay_events::{
    codex_adapter::STDERR_TAIL_LINES, AsyncLineIngestor, CodexAdapter, CodexLineParser,
    IngestConfig, NormalizedEvent, ResumeToken,
};
use tokio::{
    process::{Child, ChildStdout, Command},
    sync::mpsc,
    time,
};
use tracing::{debug, info, warn};

use crate::{
    process::{
        collect_stderr_tail, shared_tail, snapshot, spawn_with_retry, write_prompt, SharedTail,
        StderrTail,
    },
    stream::EventChannelStream,
    CodexRunnerBuilder, RunnerError,
};

/// How long stderr may stay open after the child exits, e.g. held by a grandchild.
pub const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Launches `codex exec --json` runs. Cheap to clone; holds no per-run state.
#[derive(Clone, Debug)]
pub struct CodexRunner {
    pub(crate) binary: PathBuf,
    pub(crate) extra_args: Vec<OsString>,
    pub(crate) title: String,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) timeout: Duration,
    pub(crate) ingest: IngestConfig,
    pub(crate) channel_capacity: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunRequest {
    pub prompt: String,
    /// Continues the session a previous run reported.
    pub resume: Option<ResumeToken>,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resume: None,
        }
    }

    pub fn resume(mut self, token: ResumeToken) -> Self {
        self.resume = Some(token);
        self
    }
}

/// Type-erased stream of normalized events; ends after the terminal event.
pub type DynEventStream = Pin<Box<dyn Stream<Item = NormalizedEvent> + Send>>;

/// Resolves once the child has been reaped.
pub type DynRunCompletion = Pin<Box<dyn Future<Output = Result<RunSummary, RunnerError>> + Send>>;

/// `events` yields every event in adapter order, exactly one of which is
/// [`NormalizedEvent::Completed`] unless the run fails to be observed.
/// `completion` reports how the child process ended.
pub struct RunStream {
    pub events: DynEventStream,
    pub completion: DynRunCompletion,
}

/// How the child process ended.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// `None` only if the child could not be reaped after being killed.
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
    /// Empty unless the child ran to completion on its own.
    pub stderr_tail: StderrTail,
    pub skipped_lines: usize,
}

enum Pumped {
    Completed,
    ReceiverGone,
    Exited(ExitStatus),
}

impl CodexRunner {
    pub fn builder() -> CodexRunnerBuilder {
        CodexRunnerBuilder::new()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arguments passed to the binary: `<extra_args> exec --json [resume <token>] -`.
    pub fn command_args(&self, resume: Option<&ResumeToken>) -> Vec<OsString> {
        let mut args = self.extra_args.clone();
        args.push(OsString::from("exec"));
        args.push(OsString::from("--json"));
        if let Some(token) = resume {
            args.push(OsString::from("resume"));
            args.push(OsString::from(&token.value));
        }
        args.push(OsString::from("-"));
        args
    }

    /// Spawns one run. Events start flowing as soon as the child writes them.
    pub async fn run(&self, request: RunRequest) -> Result<RunStream, RunnerError> {
        if request.prompt.trim().is_empty() {
            return Err(RunnerError::EmptyPrompt);
        }
        let RunRequest { prompt, resume } = request;

        let mut command = Command::new(&self.binary);
        command
            .args(self.command_args(resume.as_ref()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!(
            binary = %self.binary.display(),
            resume = resume.as_ref().map(|token| token.value.as_str()),
            "[codex] start run"
        );
        let mut child = spawn_with_retry(&mut command, &self.binary)?;

        let stdin = child.stdin.take().ok_or(RunnerError::StdinUnavailable)?;
        write_prompt(stdin, &prompt).await?;

        let stdout = child.stdout.take().ok_or(RunnerError::StdoutUnavailable)?;
        let stderr = child.stderr.take().ok_or(RunnerError::StderrUnavailable)?;
        let stderr_tail = shared_tail(STDERR_TAIL_LINES);
        let stderr_task = tokio::spawn(collect_stderr_tail(stderr, stderr_tail.clone()));

        let mut adapter = CodexAdapter::new(self.title.clone()).with_resume(resume);
        let cwd = self
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok());
        if let Some(cwd) = cwd {
            adapter = adapter.with_working_dir(cwd);
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let run = RunTask {
            child,
            ingestor: AsyncLineIngestor::new(stdout, CodexLineParser::new(), self.ingest),
            stderr_task,
            stderr_tail,
            adapter,
            tx,
            timeout: self.timeout,
            skipped_lines: 0,
        };
        let handle = tokio::spawn(run.drive());

        Ok(RunStream {
            events: Box::pin(EventChannelStream::new(rx)),
            completion: Box::pin(async move { handle.await? }),
        })
    }
}

struct RunTask {
    child: Child,
    ingestor: AsyncLineIngestor<ChildStdout, CodexLineParser>,
    stderr_task: tokio::task::JoinHandle<std::io::Result<()>>,
    stderr_tail: SharedTail,
    adapter: CodexAdapter,
    tx: mpsc::Sender<NormalizedEvent>,
    timeout: Duration,
    skipped_lines: usize,
}

impl RunTask {
    async fn drive(mut self) -> Result<RunSummary, RunnerError> {
        let pumped = if self.timeout.is_zero() {
            Some(self.pump().await?)
        } else {
            time::timeout(self.timeout, self.pump())
                .await
                .ok()
                .transpose()?
        };

        match pumped {
            Some(Pumped::Exited(status)) => {
                let tail = self.drain_stderr().await?;
                let events = if status.success() {
                    self.adapter.finish()
                } else {
                    warn!(?status, "[codex] exec exited with failure");
                    self.adapter
                        .process_failed(status.code().unwrap_or(-1), &tail.text())
                };
                self.forward(events).await;
                info!(ok = status.success(), "[codex] run finished");
                Ok(RunSummary {
                    status: Some(status),
                    timed_out: false,
                    stderr_tail: tail,
                    skipped_lines: self.skipped_lines,
                })
            }
            Some(Pumped::Completed) | Some(Pumped::ReceiverGone) => {
                let status = self.stop().await;
                Ok(RunSummary {
                    status,
                    timed_out: false,
                    stderr_tail: StderrTail::default(),
                    skipped_lines: self.skipped_lines,
                })
            }
            None => {
                warn!(timeout = ?self.timeout, "[codex] exec timed out");
                let status = self.stop().await;
                let events = self.adapter.timed_out(self.timeout);
                self.forward(events).await;
                Ok(RunSummary {
                    status,
                    timed_out: true,
                    stderr_tail: StderrTail::default(),
                    skipped_lines: self.skipped_lines,
                })
            }
        }
    }

    /// Reads stdout until a terminal event, the consumer leaving, or EOF followed by exit.
    async fn pump(&mut self) -> Result<Pumped, RunnerError> {
        while let Some(record) = self.ingestor.next_record().await {
            let record = match record.outcome {
                Ok(record) => record,
                Err(err) => {
                    warn!(line = record.line_number, error = %err, "[codex] skipping unreadable line");
                    self.skipped_lines += 1;
                    continue;
                }
            };
            let events = self.adapter.translate(&record);
            let terminal = events.iter().any(NormalizedEvent::is_terminal);
            if !self.forward(events).await {
                return Ok(Pumped::ReceiverGone);
            }
            if terminal {
                return Ok(Pumped::Completed);
            }
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|source| RunnerError::Wait { source })?;
        Ok(Pumped::Exited(status))
    }

    /// Waits for stderr to close, giving up after [`STDERR_DRAIN_GRACE`] with what was read.
    async fn drain_stderr(&mut self) -> Result<StderrTail, RunnerError> {
        match time::timeout(STDERR_DRAIN_GRACE, &mut self.stderr_task).await {
            Ok(joined) => joined??,
            Err(_) => {
                warn!("[codex] stderr still open after exit; using the partial tail");
                self.stderr_task.abort();
            }
        }
        Ok(snapshot(&self.stderr_tail))
    }

    /// Returns `false` once the receiving side has been dropped.
    async fn forward(&self, events: Vec<NormalizedEvent>) -> bool {
        for event in events {
            if self.tx.send(event).await.is_err() {
                debug!("[codex] event receiver dropped");
                return false;
            }
        }
        true
    }

    async fn stop(&mut self) -> Option<ExitStatus> {
        self.stderr_task.abort();
        if let Err(err) = self.child.kill().await {
            debug!(error = %err, "[codex] failed to kill child");
        }
        self.child.wait().await.ok()
    }
}
