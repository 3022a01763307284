//! In-process lock server and helpers for tests.
//!
//! `MockLockServer` listens on an ephemeral localhost port and serves one
//! request per connection, the way the real lock server does: read the
//! request until the client half-closes, write one reply, close.

use crate::config::ClientConfig;
use crate::protocol::{Action, Request, Response};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

type Handler = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A localhost port with nothing listening on it.
pub(crate) fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Client config pointing at `port` on localhost.
pub(crate) fn test_config(port: u16) -> ClientConfig {
    ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        connect_timeout_ms: 500,
        io_timeout_ms: 1000,
        ..ClientConfig::default()
    }
}

/// Lock table following the server contract: one holder per name, unlock
/// only with the holder's nonce.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    held: HashMap<String, (String, u32)>,
    grants: u64,
}

impl LockTable {
    fn handle(&mut self, raw: &[u8]) -> Response {
        let request: Request = match serde_json::from_slice(raw) {
            Ok(request) => request,
            Err(e) => {
                return Response {
                    ok: false,
                    action: Action::Lock,
                    lockname: String::new(),
                    nonce: None,
                    message: Some(format!("bad request: {}", e)),
                };
            }
        };

        match request.action {
            Action::Lock => self.lock(request),
            Action::Unlock => self.unlock(request),
        }
    }

    fn lock(&mut self, request: Request) -> Response {
        if let Some((_, pid)) = self.held.get(&request.lockname) {
            return refuse(&request, format!("\"{}\" is locked by pid {}", request.lockname, pid));
        }

        self.grants += 1;
        let nonce = format!("{:08x}-{}", self.grants, request.pid);
        self.held
            .insert(request.lockname.clone(), (nonce.clone(), request.pid));

        Response {
            ok: true,
            action: Action::Lock,
            lockname: request.lockname,
            nonce: Some(nonce),
            message: None,
        }
    }

    fn unlock(&mut self, request: Request) -> Response {
        let matches = matches!(
            (self.held.get(&request.lockname), request.nonce.as_ref()),
            (Some((held, _)), Some(presented)) if held == presented
        );

        if !matches {
            return refuse(&request, format!("Wrong nonce for \"{}\"", request.lockname));
        }

        self.held.remove(&request.lockname);
        Response {
            ok: true,
            action: Action::Unlock,
            lockname: request.lockname,
            nonce: request.nonce,
            message: None,
        }
    }
}

fn refuse(request: &Request, message: String) -> Response {
    Response {
        ok: false,
        action: request.action,
        lockname: request.lockname.clone(),
        nonce: None,
        message: Some(message),
    }
}

pub(crate) struct MockLockServer {
    port: u16,
    served: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    table: Option<Arc<Mutex<LockTable>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockLockServer {
    /// A server with a real lock table.
    pub(crate) fn start() -> Self {
        let table = Arc::new(Mutex::new(LockTable::default()));
        let shared = Arc::clone(&table);
        let mut server = Self::with_handler(move |raw| {
            let response = lock_table(&shared).handle(raw);
            serde_json::to_vec(&response).unwrap()
        });
        server.table = Some(table);
        server
    }

    /// A server that answers the given replies in order, repeating the last.
    pub(crate) fn scripted<I, B>(replies: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let replies: VecDeque<Vec<u8>> = replies.into_iter().map(Into::into).collect();
        let replies = Mutex::new(replies);
        Self::with_handler(move |_| {
            let mut replies = replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap_or_default()
            }
        })
    }

    /// A server answering every non-empty request with `handler`.
    pub(crate) fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let served = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handler: Arc<Handler> = Arc::new(handler);

        let handle = {
            let served = Arc::clone(&served);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Ok(stream) = stream {
                        serve(stream, handler.as_ref(), &served);
                    }
                }
            })
        };

        Self {
            port,
            served,
            shutdown,
            table: None,
            handle: Some(handle),
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn config(&self) -> ClientConfig {
        test_config(self.port)
    }

    /// Number of non-empty requests answered so far.
    pub(crate) fn requests_served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    /// Current nonce held for `name`, if this server keeps a lock table.
    pub(crate) fn holder(&self, name: &str) -> Option<String> {
        let table = self.table.as_ref()?;
        lock_table(table).held.get(name).map(|(nonce, _)| nonce.clone())
    }
}

impl Drop for MockLockServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop.
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(mut stream: TcpStream, handler: &Handler, served: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut request = Vec::new();
    if stream.read_to_end(&mut request).is_err() || request.is_empty() {
        return;
    }

    let reply = handler(&request);
    served.fetch_add(1, Ordering::SeqCst);
    let _ = stream.write_all(&reply);
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poison| poison.into_inner())
}
