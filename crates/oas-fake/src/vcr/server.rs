//! HTTP listener interceptor.
//!
//! Applications point at this listener as their HTTP proxy (absolute-form
//! requests) or as their API base URL. Each connection is served on its own
//! task; every request is answered according to the armed policy.

use super::cassette::{Cassette, Episode};
use super::client::{create_http_client, HttpClient};
use super::forwarding::{error_response, forward, target_url};
use super::interceptor::{InterceptError, InterceptHook, InterceptSetup, Interceptor};
use super::policy::InterceptPolicy;
use crate::http::{CanonicalRequest, CanonicalResponse};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Header naming the error kind on responses produced from a failed call.
pub const ERROR_HEADER: &str = "x-oas-fake-error";

/// State shared by all connection tasks of one armed listener.
struct Shared {
    policy: InterceptPolicy,
    hook: Option<Arc<dyn InterceptHook>>,
    cassette: Cassette,
    client: HttpClient,
    upstream: Option<String>,
    /// Set on disarm; nothing is served or recorded afterwards
    closed: AtomicBool,
}

type Connections = Arc<Mutex<JoinSet<()>>>;

struct Running {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    connections: Connections,
}

impl Running {
    /// Stop accepting and drop every open connection, keep-alive ones included.
    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        // The accept loop may already be gone; either way it stops accepting.
        let _ = self.shutdown.send(true);
        self.task.abort();
        self.connections.lock().abort_all();
    }
}

pub struct HttpInterceptor {
    bind_addr: SocketAddr,
    upstream: Option<String>,
    runtime: Option<Handle>,
    running: Mutex<Option<Running>>,
}

impl HttpInterceptor {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            upstream: None,
            runtime: None,
            running: Mutex::new(None),
        }
    }

    /// Real target for origin-form requests (`http(s)://host:port`).
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    /// Runtime to spawn the listener on; defaults to the caller's runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Bound address while armed (resolves port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    /// Episodes recorded since the listener was armed.
    pub fn recorded(&self) -> usize {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.shared.cassette.len())
            .unwrap_or(0)
    }

    fn runtime(&self) -> Result<Handle, InterceptError> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|e| InterceptError::Runtime(e.to_string())),
        }
    }
}

impl Interceptor for HttpInterceptor {
    fn arm(&self, setup: InterceptSetup) -> Result<(), InterceptError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(InterceptError::AlreadyArmed);
        }
        let runtime = self.runtime()?;

        let cassette = Cassette::new(&setup.cassette_path, &setup.cassette_name);
        if setup.policy.record_real {
            cassette.load()?;
        }

        let bind_err = |source: std::io::Error| InterceptError::Bind {
            addr: self.bind_addr.to_string(),
            source,
        };
        let std_listener = std::net::TcpListener::bind(self.bind_addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let addr = std_listener.local_addr().map_err(bind_err)?;

        let shared = Arc::new(Shared {
            policy: setup.policy,
            hook: setup.hook,
            cassette,
            client: create_http_client()?,
            upstream: self.upstream.clone(),
            closed: AtomicBool::new(false),
        });
        let connections: Connections = Arc::new(Mutex::new(JoinSet::new()));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = {
            // Registering with the reactor needs the runtime context.
            let _guard = runtime.enter();
            let listener = TcpListener::from_std(std_listener).map_err(bind_err)?;
            runtime.spawn(accept_loop(
                listener,
                Arc::clone(&shared),
                Arc::clone(&connections),
                shutdown_rx,
            ))
        };

        info!("Listening on http://{} (policy {:?})", addr, setup.policy);
        if let Some(upstream) = &self.upstream {
            info!("Forwarding origin-form requests to {}", upstream);
        }
        *running = Some(Running {
            addr,
            shared,
            shutdown,
            task,
            connections,
        });
        Ok(())
    }

    /// Connections are closed before the cassette is written. A failed write
    /// leaves the interceptor armed, listener closed, so the next disarm
    /// retries it.
    fn disarm(&self) -> Result<(), InterceptError> {
        let mut guard = self.running.lock();
        let running = guard.as_ref().ok_or(InterceptError::NotArmed)?;
        running.close();
        if running.shared.policy.record_real {
            running.shared.cassette.save()?;
        }
        info!("Listener on {} stopped", running.addr);
        *guard = None;
        Ok(())
    }

    fn is_armed(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for HttpInterceptor {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.close();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    connections: Connections,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    error!("Failed to accept connection: {}", err);
                    continue;
                }
            },
            _ = shutdown.changed() => break,
        };

        let shared = Arc::clone(&shared);
        let mut open = connections.lock();
        // Reap finished connections so the set only holds open ones.
        while open.try_join_next().is_some() {}
        open.spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let shared = Arc::clone(&shared);
                async move { handle_request(&shared, req).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection from {}: {}", remote_addr, err);
            }
        });
        drop(open);
    }
    debug!("Accept loop finished");
}

async fn handle_request(
    shared: &Shared,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return Ok(error_response(400, "body", "Failed to read request body").map(Full::new));
        }
    };
    let request = Request::from_parts(parts, body);

    if shared.closed.load(Ordering::SeqCst) {
        return Ok(error_response(503, "disarmed", "Interceptor is disarmed").map(Full::new));
    }
    let response = if shared.policy.always_intercept {
        intercept(shared, &request)
    } else {
        pass_through(shared, &request).await
    };
    Ok(response.map(Full::new))
}

fn intercept(shared: &Shared, request: &Request<Bytes>) -> Response<Bytes> {
    let Some(hook) = &shared.hook else {
        warn!("Intercepting policy armed without a hook");
        return error_response(500, "no-hook", "No request handler installed");
    };
    match hook.on_request(request) {
        Ok(response) => response,
        Err(err) => {
            warn!("Intercepted {} {} failed: {}", request.method(), request.uri(), err);
            error_response(500, err.kind(), &err.to_string())
        }
    }
}

async fn pass_through(shared: &Shared, request: &Request<Bytes>) -> Response<Bytes> {
    let Some(target) = target_url(request, shared.upstream.as_deref()) else {
        return error_response(502, "no-target", "Cannot determine the real target of the request");
    };

    let start = Instant::now();
    let response = match forward(&shared.client, request, &target).await {
        Ok(response) => response,
        Err(err) => {
            error!("{}", err);
            return error_response(502, "forward", &err.to_string());
        }
    };

    if shared.policy.record_real && !shared.closed.load(Ordering::SeqCst) {
        let mut canonical = CanonicalRequest::from_wire(request);
        canonical.url = target;
        shared.cassette.record(Episode::new(
            &canonical,
            &CanonicalResponse::from_wire(&response),
            Some(start.elapsed().as_millis() as u64),
        ));
    }
    response
}
