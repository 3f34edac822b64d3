//! Owns the single TCP socket used to talk to a RouterOS device: dials and
//! authenticates lazily, multiplexes concurrent requests over it by tag, and
//! reaps the socket after a period of inactivity.

use crate::codec::{read_sentence, to_attribute_words, write_sentence};
use crate::errors::{Error, Result};
use crate::protocol::{Request, Response};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Default RouterOS API port.
pub const DEFAULT_PORT: u16 = 8728;

/// Default idle period after which an open connection is torn down.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything required to dial and authenticate with a device.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub idle_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        ConnectionConfig {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

type ResponseMap = Arc<Mutex<HashMap<String, Arc<Response>>>>;

/// Live state for an open socket: the write half (sends go straight out),
/// the table of responses the reader task is actively filling in, and the
/// handles of the two background tasks.
struct Open {
    writer: Mutex<OwnedWriteHalf>,
    responses: ResponseMap,
    last_activity: Arc<Mutex<Instant>>,
    reader_task: JoinHandle<()>,
    idle_task: JoinHandle<()>,
}

impl Open {
    /// Cancels every response still awaiting completion, then stops the
    /// background tasks and shuts the socket down.
    ///
    /// The response drain runs first and unconditionally: this is called
    /// from within the reader task and the idle monitor themselves (each
    /// schedules its own teardown), so `abort()` below may cancel the very
    /// task executing this function at its next await point. If the writer
    /// lock or socket shutdown happened first and blocked - e.g. a
    /// concurrent `send` holding the writer lock mid-write - a self-abort
    /// there would skip the drain entirely and leak every pending response.
    async fn shutdown(&self) {
        {
            let mut responses = self.responses.lock().await;
            for (_, response) in responses.drain() {
                if !response.is_complete() {
                    response.cancel();
                }
            }
        }

        self.reader_task.abort();
        self.idle_task.abort();

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// State shared between a [`Connection`] handle and the background tasks it
/// spawns - the reader and idle monitor each hold a clone so they can drive
/// `close()` themselves when they detect the socket is no longer usable.
struct Shared {
    config: ConnectionConfig,
    open_lock: Mutex<()>,
    open: Mutex<Option<Arc<Open>>>,
}

/// Low-level connection to a RouterOS device's API socket.
///
/// Opens lazily on first [`Connection::send`], authenticates via `/login`,
/// and stays open across calls until the idle-timeout monitor (or an
/// explicit [`Connection::close`]) tears it down. Cheap to clone - clones
/// share the same underlying socket state - which is how the reader and
/// idle-monitor tasks reach back into `close()`. Safe to share and call
/// concurrently: internally synchronized, with `open_lock` serializing
/// dial-and-authenticate against concurrent callers and against `close`.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Connection {
            shared: Arc::new(Shared {
                config,
                open_lock: Mutex::new(()),
                open: Mutex::new(None),
            }),
        }
    }

    /// Ensures a socket is open and authenticated, dialing and logging in if
    /// necessary. Idempotent: concurrent callers share the same dial.
    async fn open(&self) -> Result<Arc<Open>> {
        let _guard = self.shared.open_lock.lock().await;

        if let Some(open) = self.shared.open.lock().await.as_ref() {
            *open.last_activity.lock().await = Instant::now();
            return Ok(open.clone());
        }

        debug!("opening connection to {}:{}", self.shared.config.host, self.shared.config.port);
        let stream = TcpStream::connect((self.shared.config.host.as_str(), self.shared.config.port)).await?;
        let (read_half, write_half) = stream.into_split();

        let responses: ResponseMap = Arc::new(Mutex::new(HashMap::new()));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let reader_task = tokio::spawn(run_reader(self.clone(), read_half, responses.clone(), last_activity.clone()));
        let idle_task = tokio::spawn(run_idle_monitor(self.clone(), last_activity.clone(), self.shared.config.idle_timeout));

        let open = Arc::new(Open {
            writer: Mutex::new(write_half),
            responses,
            last_activity,
            reader_task,
            idle_task,
        });
        *self.shared.open.lock().await = Some(open.clone());

        let login_words = {
            let mut words = vec!["/login".to_string()];
            words.extend(to_attribute_words(vec![
                ("name", Some(self.shared.config.username.as_str())),
                ("password", Some(self.shared.config.password.as_str())),
            ]));
            words
        };

        if let Err(e) = self.authenticate(&open, login_words).await {
            open.shutdown().await;
            self.shared.open.lock().await.take();
            return Err(e);
        }

        Ok(open)
    }

    async fn authenticate(&self, open: &Arc<Open>, login_words: Vec<String>) -> Result<()> {
        let response = self.send_on(open, login_words).await?;
        response.raise_for_error()?;
        Ok(())
    }

    /// Closes an open connection: stops the background tasks, shuts down the
    /// socket, and cancels every response still awaiting completion. A no-op
    /// if already closed. Called explicitly by callers, and scheduled by the
    /// reader (on a fatal protocol/I-O error) and the idle monitor (on
    /// inactivity) once they detect the socket is no longer usable.
    pub async fn close(&self) {
        let _guard = self.shared.open_lock.lock().await;
        if let Some(open) = self.shared.open.lock().await.take() {
            open.shutdown().await;
        }
    }

    /// Sends a request sentence and waits for its terminating `!done`/`!trap`.
    /// Opens the connection first if necessary.
    pub async fn send(&self, words: Vec<String>) -> Result<Arc<Response>> {
        let open = self.open().await?;
        self.send_on(&open, words).await
    }

    async fn send_on(&self, open: &Arc<Open>, words: Vec<String>) -> Result<Arc<Response>> {
        let request = Request::new(words);
        let response = Arc::new(Response::new(request.tag.clone()));

        open.responses.lock().await.insert(request.tag.clone(), response.clone());
        debug!(
            "send request ({}) {}",
            request.tag,
            request.words.first().cloned().unwrap_or_default()
        );

        let sentence_words = request.sentence_words()?;
        {
            let mut writer = open.writer.lock().await;
            write_sentence(&mut *writer, &sentence_words).await?;
        }

        response
            .wait_until_complete(None)
            .await
            .map_err(|_| Error::Other("response wait was cancelled unexpectedly".to_string()))?;
        Ok(response)
    }
}

/// Background loop: reads sentences off the socket and dispatches each to
/// the response waiting on its `.tag`, retiring it from the map once
/// complete. On any I/O or protocol error, or a sentence with no `.tag`,
/// the socket is no longer usable - schedules `close()` on the owning
/// connection (cancelling every response still pending) and stops.
async fn run_reader(
    connection: Connection,
    read_half: tokio::net::tcp::OwnedReadHalf,
    responses: ResponseMap,
    last_activity: Arc<Mutex<Instant>>,
) {
    let mut reader = BufReader::new(read_half);
    loop {
        let sentence = match read_sentence(&mut reader).await {
            Ok(Some(sentence)) => sentence,
            Ok(None) => continue,
            Err(e) => {
                debug!("reader loop stopping: {}", e);
                connection.close().await;
                return;
            }
        };

        *last_activity.lock().await = Instant::now();

        let tag = match sentence.api_attributes.get(".tag") {
            Some(tag) => tag.clone(),
            None => {
                debug!("received sentence with no .tag, stopping reader loop");
                connection.close().await;
                return;
            }
        };

        debug!("receive response sentence ({}) {}", tag, sentence.r#type);

        let mut map = responses.lock().await;
        let is_complete = if let Some(response) = map.get(&tag) {
            response.update_with_sentence(sentence);
            response.is_complete()
        } else {
            debug!("response sentence for unknown tag {}", tag);
            false
        };
        if is_complete {
            debug!("receive response ({})", tag);
            map.remove(&tag);
        }
    }
}

/// Background loop: wakes at a 1-second cadence and schedules `close()` on
/// the owning connection once the socket has been idle for longer than the
/// configured timeout. Only one `close()` is scheduled per idle event - the
/// loop exits as soon as it fires.
async fn run_idle_monitor(connection: Connection, last_activity: Arc<Mutex<Instant>>, idle_timeout: Duration) {
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let last = *last_activity.lock().await;
        if last.elapsed() >= idle_timeout {
            debug!("idle socket detected, closing connection");
            connection.close().await;
            return;
        }
    }
}
