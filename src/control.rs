use std::fmt::Display;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use itertools::Itertools;
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info_span, warn, Instrument};

use crate::codec::LinesCodec;
use crate::error::Error;

/// How long a sender waits for the answer to its command.
///
/// Fixed by design: a control node which has not answered within this
/// bound is not going to. Callers needing a different bound is an
/// extension point, not a knob.
const ANSWER_TIMEOUT: Duration = Duration::from_secs(1);

/// An answer from the control node, split into whitespace tokens.
///
/// The first token typically echoes the command name.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Answer(Vec<String>);

impl Answer {
    /// The answer's tokens.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// What a line from the control node means.
#[derive(Debug, PartialEq, Eq)]
enum Classification {
    /// Out-of-band diagnostic. Never answers a command.
    OutOfBandError(String),

    /// An answer to the command currently in flight.
    Answer(Answer),

    /// Nothing at all.
    Blank,
}

fn classify(line: &str) -> Classification {
    let tokens = line
        .split_whitespace()
        .map(str::to_owned)
        .collect::<Vec<_>>();

    match tokens.first().map(String::as_str) {
        None => Classification::Blank,
        Some("error") => Classification::OutOfBandError(line.trim().to_string()),
        Some(_) => Classification::Answer(Answer(tokens)),
    }
}

/// Why the reader task ended.
#[derive(Debug, PartialEq, Eq)]
enum ReaderExit {
    /// The stream ended after a stop was requested.
    Requested,

    /// The stream ended while the channel was still supposed to be up.
    Premature,
}

/// Everything guarded by the send gate.
///
/// Holding the lock means holding both the command stream and the
/// answer slot, so two senders can never interleave their
/// write-then-wait sections.
struct SendGate {
    commands: FramedWrite<ChildStdin, LinesCodec>,
    answers: mpsc::Receiver<Answer>,
}

struct Running {
    child: Child,
    reader: JoinHandle<ReaderExit>,
    stop_requested: Arc<AtomicBool>,
    gate: Mutex<SendGate>,
}

/// A command/answer channel to the control node helper process.
///
/// The helper owns the physical serial device; we own the helper.
/// Commands go to its stdin, answers and diagnostics come back on its
/// stderr. At most one command is ever in flight.
///
/// The child is spawned with kill-on-drop, so a channel which goes out
/// of scope without [`ControlChannel::stop`] still takes the helper
/// down with it.
#[derive(Debug)]
pub struct ControlChannel {
    helper: PathBuf,
    tty: String,
    running: Option<Running>,
}

impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running").finish_non_exhaustive()
    }
}

impl ControlChannel {
    /// Set up a channel for the given helper executable and device path.
    /// Nothing is launched until [`ControlChannel::start`].
    pub fn new<P: Into<PathBuf>>(helper: P, tty: &str) -> Self {
        Self {
            helper: helper.into(),
            tty: tty.to_string(),
            running: None,
        }
    }

    /// Launch the helper process and spawn the answer reader.
    ///
    /// Starting an already started channel is a no-op.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.running.is_some() {
            return Ok(());
        }

        debug!(helper = %self.helper.display(), tty = %self.tty, "Launching control node helper");

        let mut child = Command::new(&self.helper)
            .arg(&self.tty)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Launch {
                helper: self.helper.display().to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .expect("stdin is piped, so it is available exactly once");
        let stderr = child
            .stderr
            .take()
            .expect("stderr is piped, so it is available exactly once");

        let commands = FramedWrite::new(stdin, LinesCodec::default());
        let lines = FramedRead::new(stderr, LinesCodec::new(b'\n', None));

        // The slot holds at most the one answer belonging to the one
        // command in flight. Anything beyond that is dropped on arrival.
        let (answer_tx, answer_rx) = mpsc::channel(1);

        let stop_requested = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(
            read_answers(lines, answer_tx, Arc::clone(&stop_requested))
                .instrument(info_span!("control-node", tty = %self.tty)),
        );

        self.running = Some(Running {
            child,
            reader,
            stop_requested,
            gate: Mutex::new(SendGate {
                commands,
                answers: answer_rx,
            }),
        });

        Ok(())
    }

    /// Whether the channel has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Kill the helper and wait for the reader task to finish.
    ///
    /// Idempotent: stopping a stopped (or never started) channel does
    /// nothing.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        // Set before the kill, so the reader knows the end-of-stream
        // it is about to see was asked for.
        running.stop_requested.store(true, Ordering::SeqCst);

        if let Err(e) = running.child.start_kill() {
            debug!(?e, "Helper already gone");
        }

        match running.child.wait().await {
            Ok(status) => debug!(%status, "Helper terminated"),
            Err(e) => warn!(?e, "Could not wait for helper"),
        }

        match running.reader.await {
            Ok(exit) => debug!(?exit, "Reader task finished"),
            Err(e) => warn!(?e, "Reader task panicked"),
        }
    }

    /// Send one command and wait for its answer.
    ///
    /// The tokens are joined into a single line-terminated command.
    /// Concurrent senders queue on the gate and are served strictly one
    /// after another.
    ///
    /// Returns `None` if no answer arrived within the fixed wait bound.
    /// A timed-out send leaves the channel servable: whatever answer
    /// eventually shows up is discarded by the next sender.
    pub async fn send_command<T: AsRef<str>>(
        &self,
        command: &[T],
    ) -> Result<Option<Answer>, Error> {
        let running = self.running.as_ref().ok_or(Error::NotStarted)?;

        let mut gate = running.gate.lock().await;

        // A previous sender may have given up waiting.
        // Its answer does not belong to the command we are about to send.
        while let Ok(stale) = gate.answers.try_recv() {
            debug!(%stale, "Dropped old control node answer");
        }

        let line = command.iter().map(AsRef::as_ref).join(" ");
        gate.commands.send(line.into_bytes()).await?;

        match tokio::time::timeout(ANSWER_TIMEOUT, gate.answers.recv()).await {
            Ok(Some(answer)) => Ok(Some(answer)),
            Ok(None) => {
                // Reader gone; the answer is never coming.
                warn!("Answer channel closed while waiting");
                Ok(None)
            }
            Err(_elapsed) => Ok(None),
        }
    }
}

/// Reader task: classifies every line the helper emits.
///
/// Out-of-band errors are logged. Answers go into the single-item slot,
/// or are dropped if the slot is already full. End-of-stream ends the
/// loop; whether that was clean depends on whether a stop was requested
/// first.
async fn read_answers(
    mut lines: FramedRead<ChildStderr, LinesCodec>,
    answers: mpsc::Sender<Answer>,
    stop_requested: Arc<AtomicBool>,
) -> ReaderExit {
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "Could not read from helper, exiting");
                break;
            }
        };
        let line = String::from_utf8_lossy(&line);

        match classify(&line) {
            Classification::Blank => continue,
            Classification::OutOfBandError(message) => {
                // Diagnostic from the node itself, correlated to no command.
                error!(%message, "Control node error");
            }
            Classification::Answer(answer) => match answers.try_send(answer) {
                Ok(()) => {}
                Err(TrySendError::Full(answer)) => {
                    // At most one buffered answer. No backlog.
                    error!(%answer, "Answer slot full, dropping");
                }
                Err(TrySendError::Closed(answer)) => {
                    debug!(%answer, "No one left to receive answers");
                }
            },
        }
    }

    if stop_requested.load(Ordering::SeqCst) {
        debug!("Reader finished after requested stop");
        ReaderExit::Requested
    } else {
        warn!("Control node reader ended prematurely");
        ReaderExit::Premature
    }
}
