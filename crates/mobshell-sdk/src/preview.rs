//! Local HTTP preview of the frontend build output.
//!
//! The server runs on its own thread with a single-threaded tokio runtime so
//! the rest of the orchestrator stays synchronous. The listening socket is
//! bound before the thread starts, which makes "port in use" a startup error
//! rather than a log line from a background thread.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use axum::Router;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::types::ShellError;

/// Serves `<root>/frontend/dist` on `127.0.0.1:<port>`.
#[derive(Debug, Clone)]
pub struct PreviewServer {
    static_dir: PathBuf,
    port: u16,
}

impl PreviewServer {
    pub fn new(static_dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            static_dir: static_dir.into(),
            port,
        }
    }

    pub fn static_dir(&self) -> &std::path::Path {
        &self.static_dir
    }

    /// Binds the port and starts serving in the background.
    ///
    /// Port `0` binds an ephemeral port; see [`PreviewHandle::addr`].
    pub fn start(&self) -> Result<PreviewHandle, ShellError> {
        if !self.static_dir.is_dir() {
            warn!(
                "Preview directory {} does not exist yet; requests will return 404 until the frontend is built",
                self.static_dir.display()
            );
        }

        let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(requested).map_err(|e| {
            ShellError::PreviewServerFailed(format!("binding {} failed: {}", requested, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let static_dir = self.static_dir.clone();
        let thread = thread::Builder::new()
            .name("mobshell-preview".to_string())
            .spawn(move || serve(listener, static_dir, shutdown_rx))?;

        info!("Preview server running at http://{}", addr);
        Ok(PreviewHandle {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn serve(listener: TcpListener, static_dir: PathBuf, shutdown: oneshot::Receiver<()>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!("Preview server runtime failed to start: {}", e);
            return;
        }
    };

    let result = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        let app = Router::new().fallback_service(ServeDir::new(static_dir));
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await
    });

    if let Err(e) = result {
        warn!("Preview server stopped with error: {}", e);
    }
}

/// Running preview server. Dropping the handle shuts the server down.
#[derive(Debug)]
pub struct PreviewHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PreviewHandle {
    /// Address actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Triggers graceful shutdown and waits for the server thread.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            debug!(addr = %self.addr, "stopping preview server");
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Preview server thread panicked");
            }
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use tempfile::TempDir;

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn serves_build_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>preview</h1>").unwrap();

        let handle = PreviewServer::new(dir.path(), 0).start().unwrap();
        assert_ne!(handle.addr().port(), 0);

        let response = get(handle.addr(), "/index.html");
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("<h1>preview</h1>"));

        let missing = get(handle.addr(), "/nope.js");
        assert!(missing.starts_with("HTTP/1.1 404"), "{}", missing);
    }

    #[test]
    fn stop_releases_port() {
        let dir = TempDir::new().unwrap();
        let mut handle = PreviewServer::new(dir.path(), 0).start().unwrap();
        let addr = handle.addr();
        handle.stop();
        assert!(TcpListener::bind(addr).is_ok());
    }

    #[test]
    fn port_in_use_is_startup_error() {
        let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let dir = TempDir::new().unwrap();

        let err = PreviewServer::new(dir.path(), port).start().unwrap_err();
        assert!(matches!(err, ShellError::PreviewServerFailed(_)));
    }
}
