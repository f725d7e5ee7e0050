use super::request::parse_request;
use super::response::{into_tiny_response, HttpResponse};
use super::service::HttpService;
use serde_json::json;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a worker blocks in `recv` before re-checking the stop flag.
const RECV_POLL: Duration = Duration::from_millis(200);

/// Wrapper around a tiny_http listener served by a fixed pool of worker threads.
///
/// Each worker takes one request at a time and runs it to completion.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server
pub struct ServerHandle {
    addr: SocketAddr,
    server: Arc<tiny_http::Server>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address; useful when started on port 0.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        let addr = self.addr;
        self.join_workers();
        info!(addr = %addr, "HTTP server stopped");
    }

    /// Block until every worker exits.
    ///
    /// Workers only exit after [`ServerHandle::stop_flag`] is raised.
    pub fn join(self) {
        self.join_workers();
    }

    /// Flag that makes the workers exit once raised, for signal handlers.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn join_workers(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("HTTP worker thread panicked");
            }
        }
    }
}

impl<T: HttpService> HttpServer<T> {
    /// Start the HTTP server on the given address with `workers` threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A, workers: usize) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let server = tiny_http::Server::http(addr).map_err(io::Error::other)?;
        let addr = server.server_addr().to_ip().unwrap_or(addr);
        let server = Arc::new(server);
        let service = Arc::new(self.0);
        let stop = Arc::new(AtomicBool::new(false));

        let workers = (0..workers.max(1))
            .map(|idx| {
                let server = Arc::clone(&server);
                let service = Arc::clone(&service);
                let stop = Arc::clone(&stop);
                thread::Builder::new()
                    .name(format!("elfaro-http-{idx}"))
                    .spawn(move || worker_loop(&server, service.as_ref(), &stop))
            })
            .collect::<io::Result<Vec<_>>>()?;

        info!(addr = %addr, workers = workers.len(), "HTTP server listening");
        Ok(ServerHandle {
            addr,
            server,
            stop,
            workers,
        })
    }
}

fn worker_loop<T: HttpService>(server: &tiny_http::Server, service: &T, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        let mut request = match server.recv_timeout(RECV_POLL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    debug!(error = %e, "Listener receive interrupted");
                }
                continue;
            }
        };
        let response = match parse_request(&mut request) {
            Ok(parsed) => service.call(parsed),
            Err(e) => {
                warn!(error = %e, "Rejecting request");
                let status = e.status();
                let reason = if status == 413 {
                    "Payload Too Large"
                } else {
                    "Bad Request"
                };
                HttpResponse::json(status, &json!({ "error": reason }))
            }
        };
        if let Err(e) = request.respond(into_tiny_response(response)) {
            debug!(error = %e, "Client went away before the response was written");
        }
    }
}
