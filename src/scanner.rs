use std::io;
use std::time::Duration;

use itertools::Itertools;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::Error;

/// How long a single read may block before we re-check the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How many bytes to ask for per read.
/// Firmware consoles trickle output, so chunks stay small.
const CHUNK_SIZE: usize = 64;

/// The baud rate to use when neither the caller nor the config names one.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Scans a live byte stream for patterns, expect-style.
///
/// The scanner owns the stream exclusively. It keeps only the trailing
/// partial line between reads, so a pattern can never match across a
/// newline.
#[derive(Debug)]
pub struct Scanner<S> {
    stream: S,

    /// Unconsumed tail since the last newline.
    /// Scoped to a single logical line.
    buffer: String,

    verbose: bool,
}

impl<S> Scanner<S> {
    /// Wrap an already open byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: String::new(),
            verbose: false,
        }
    }

    /// Echo every completed console line through tracing.
    /// The subscriber prefixes each with a timestamp.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Scanner<SerialStream> {
    /// Open a serial port and scan that.
    /// The tty should be along the lines of `/dev/ttyACMx` on unix, `COMx` on Windows.
    ///
    /// Anything the device sent before we got here is stale; the input
    /// buffer is flushed so scanning starts from live output.
    pub fn open(tty: &str, baud: u32) -> Result<Self, Error> {
        debug!(%tty, %baud, "Opening console port");

        let stream = tokio_serial::new(tty, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|source| Error::OpenPort {
                tty: tty.to_string(),
                source,
            })?;

        stream
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(|source| Error::OpenPort {
                tty: tty.to_string(),
                source,
            })?;

        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + Unpin> Scanner<S> {
    /// Scan until `pattern` matches somewhere on the current line,
    /// or the deadline expires.
    ///
    /// Returns the matched substring, or `None` on timeout.
    /// `None` as timeout means scan forever.
    ///
    /// Patterns may not contain a newline; matches cannot span lines.
    ///
    /// The deadline is checked once per read: bytes arriving in the very
    /// read which crosses the deadline are not scanned.
    pub async fn expect(
        &mut self,
        pattern: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, Error> {
        if pattern.contains('\n') {
            return Err(Error::BadPattern(
                "patterns cannot span lines".to_string(),
            ));
        }
        let regex =
            Regex::new(pattern).map_err(|problem| Error::BadPattern(problem.to_string()))?;

        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            let read = tokio::time::timeout(POLL_INTERVAL, self.stream.read(&mut chunk)).await;

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }

            let n = match read {
                // The device went away. Not the same as it being quiet.
                Ok(Ok(0)) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "console stream closed",
                    )))
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
                // No data within the poll interval.
                Err(_elapsed) => continue,
            };

            self.push_chunk(&chunk[..n]);

            if let Some(found) = regex.find(&self.buffer) {
                return Ok(Some(found.as_str().to_string()));
            }
        }
    }

    /// Scan for any of the given patterns.
    ///
    /// Builds the alternation `(p1)|(p2)|...` and scans for that.
    /// The caller must re-test the returned substring to learn which
    /// alternative fired.
    pub async fn expect_list<P: AsRef<str>>(
        &mut self,
        patterns: &[P],
        timeout: Option<Duration>,
    ) -> Result<Option<String>, Error> {
        let pattern = patterns
            .iter()
            .map(|pattern| format!("({})", pattern.as_ref()))
            .join("|");

        self.expect(&pattern, timeout).await
    }

    /// Keep the tail after the last newline, then append the new bytes.
    fn push_chunk(&mut self, chunk: &[u8]) {
        let tail_starts_at = match self.buffer.rfind('\n') {
            Some(newline) => newline + 1,
            None => 0,
        };
        self.buffer.drain(..tail_starts_at);

        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        if self.verbose {
            // The retained tail had no newline in it,
            // so every completed line ends within this chunk.
            if let Some(last_newline) = self.buffer.rfind('\n') {
                for line in self.buffer[..last_newline].lines() {
                    info!(target: "console", "{line}");
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> Scanner<S> {
    /// Write a line-terminated command to the device.
    pub async fn send_line(&mut self, data: &str) -> Result<(), Error> {
        self.stream.write_all(data.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;

        Ok(())
    }
}
