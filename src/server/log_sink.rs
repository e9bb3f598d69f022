//! Asynchronous log sink.
//!
//! Producers on any thread push `(level, text)` messages onto a queue; a
//! single background thread drains it. Callers only pay for the enqueue.
//!
//! By default messages are forwarded to the [`log`] facade, so whatever
//! logger the host installed (for example `env_logger`) does the formatting.
//! [`LogSink::with_writer`] writes `[LEVEL] text` lines to any `Write` instead.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::Level;

const LOG_TARGET: &str = "poolhttp";

/// Lifecycle of a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    StopRequested,
    Stopped,
}

/// One queued log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: Level,
    pub text: String,
}

enum Output {
    Facade,
    Writer(Box<dyn Write + Send>),
}

impl Output {
    fn write(&mut self, message: &LogMessage) {
        match self {
            Output::Facade => log::log!(target: LOG_TARGET, message.level, "{}", message.text),
            Output::Writer(w) => {
                if let Err(e) = writeln!(w, "[{}] {}", message.level, message.text) {
                    eprintln!("[{}] {} (log write failed: {e})", message.level, message.text);
                }
            }
        }
    }

    fn flush(&mut self) {
        if let Output::Writer(w) = self {
            let _ = w.flush();
        }
    }
}

struct Queue {
    messages: VecDeque<LogMessage>,
    state: SinkState,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Shared {
    // A panic while holding the lock cannot leave the queue half-updated.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A logging endpoint backed by one consumer thread.
///
/// Shared between components as `Arc<LogSink>`. Dropping the last handle
/// flushes every queued message and joins the consumer.
pub struct LogSink {
    shared: Arc<Shared>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl LogSink {
    /// A sink that forwards to the `log` facade.
    pub fn new() -> Self {
        Self::start(Output::Facade)
    }

    /// A sink that writes `[LEVEL] text` lines to `writer`.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::start(Output::Writer(Box::new(writer)))
    }

    fn start(output: Output) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                messages: VecDeque::new(),
                state: SinkState::Running,
            }),
            ready: Condvar::new(),
        });

        let consumer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("poolhttp-log".to_string())
                .spawn(move || consume(shared, output))
        };

        let consumer = match consumer {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a consumer nothing would ever be written.
                eprintln!("failed to start log consumer thread: {e}");
                shared.lock().state = SinkState::Stopped;
                None
            }
        };

        Self {
            shared,
            consumer: Mutex::new(consumer),
        }
    }

    /// Queue a message. Messages logged after shutdown has begun are dropped.
    pub fn log(&self, level: Level, text: impl Into<String>) {
        let mut queue = self.shared.lock();
        if queue.state != SinkState::Running {
            return;
        }
        queue.messages.push_back(LogMessage {
            level,
            text: text.into(),
        });
        drop(queue);
        self.shared.ready.notify_one();
    }

    /// Queue an `ERROR` message.
    pub fn error(&self, text: impl Into<String>) {
        self.log(Level::Error, text);
    }

    /// Queue a `WARN` message.
    pub fn warn(&self, text: impl Into<String>) {
        self.log(Level::Warn, text);
    }

    /// Queue an `INFO` message.
    pub fn info(&self, text: impl Into<String>) {
        self.log(Level::Info, text);
    }

    /// Queue a `DEBUG` message.
    pub fn debug(&self, text: impl Into<String>) {
        self.log(Level::Debug, text);
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SinkState {
        self.shared.lock().state
    }

    /// Stop accepting messages, write everything already queued, and join the
    /// consumer. Concurrent callers all return only once the queue is written.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.lock();
            if queue.state == SinkState::Running {
                queue.state = SinkState::StopRequested;
            }
        }
        self.shared.ready.notify_all();

        // Held across the join so a second caller waits for the first.
        let mut consumer = self.consumer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = consumer.take() {
            if handle.join().is_err() {
                eprintln!("log consumer thread panicked");
            }
        }
        self.shared.lock().state = SinkState::Stopped;
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume(shared: Arc<Shared>, mut output: Output) {
    loop {
        let batch = {
            let mut queue = shared.lock();
            while queue.messages.is_empty() && queue.state == SinkState::Running {
                queue = shared
                    .ready
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if queue.messages.is_empty() {
                return;
            }
            std::mem::take(&mut queue.messages)
        };

        for message in &batch {
            output.write(message);
        }
        output.flush();
    }
}
