use std::{
    collections::VecDeque,
    io,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
};
use tracing::debug;

use crate::RunnerError;

pub(crate) fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child, RunnerError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    debug!(attempt, ?backoff, "codex binary busy, retrying spawn");
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(RunnerError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}

/// Writes the prompt plus a trailing newline, then closes stdin.
///
/// A child that exits without reading its input is not an error here; its
/// exit status is reported through the event stream.
pub(crate) async fn write_prompt(mut stdin: ChildStdin, prompt: &str) -> Result<(), RunnerError> {
    let result = async {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.shutdown().await
    }
    .await;
    match result {
        Err(source) if source.kind() != io::ErrorKind::BrokenPipe => {
            Err(RunnerError::StdinWrite(source))
        }
        _ => Ok(()),
    }
}

/// Last `capacity` lines of the child's diagnostic output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StderrTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl StderrTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

/// [`StderrTail`] filled by the drain task and read once the run ends.
pub(crate) type SharedTail = Arc<Mutex<StderrTail>>;

pub(crate) fn shared_tail(capacity: usize) -> SharedTail {
    Arc::new(Mutex::new(StderrTail::new(capacity)))
}

/// Copies whatever has been collected so far.
pub(crate) fn snapshot(tail: &SharedTail) -> StderrTail {
    tail.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Drains `reader` line by line into `tail` until EOF.
pub(crate) async fn collect_stderr_tail<R>(reader: R, tail: SharedTail) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        debug!(target: "codex_runner::stderr", "{line}");
        tail.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
