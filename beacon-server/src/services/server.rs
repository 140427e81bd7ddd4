//! The HTTP server hosting all endpoints.

use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use axum::http::{HeaderValue, header};
use axum_server::Handle;
use beacon_config::Config;
use tokio::net::TcpSocket;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::constants;
use crate::endpoints;
use crate::middlewares::{self, CatchPanicLayer};
use crate::service::ServiceState;

/// Maximum number of pending connections.
const LISTEN_BACKLOG: u32 = 1024;

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding failed.
    #[error("bind to interface failed")]
    BindFailed(#[from] io::Error),
}

/// Build the axum application with all routes and middleware.
pub fn make_app(service: ServiceState) -> axum::Router {
    // Service builder order defines layers added first will be called first. This means:
    //  - Requests go from top to bottom
    //  - Responses go from bottom to top
    let middleware = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(middlewares::handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(constants::SERVER),
        ))
        .layer(middlewares::trace_http_layer());

    endpoints::routes(service.config())
        .layer(middleware)
        .with_state(service)
}

fn listen(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(LISTEN_BACKLOG)?.into_std()?)
}

/// Resolves when the process receives `SIGINT` or `SIGTERM`.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            beacon_log::error!(
                error = &error as &dyn std::error::Error,
                "failed to listen for ctrl-c",
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                beacon_log::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to listen for SIGTERM",
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => (),
        _ = terminate => (),
    }
}

/// HTTP server.
///
/// This is the main HTTP server which hosts all [endpoints](crate::endpoints) and dispatches
/// incoming traffic to them.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    service: ServiceState,
}

impl HttpServer {
    /// Binds the listening socket.
    pub fn new(config: &Config, service: ServiceState) -> Result<Self, ServerError> {
        let listener = listen(config.listen_addr())?;
        Ok(Self { listener, service })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until `signal` resolves.
    ///
    /// After the signal, in-flight requests are given `shutdown_timeout` to complete.
    pub async fn run<F>(self, shutdown_timeout: Duration, signal: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { listener, service } = self;

        beacon_log::info!("spawning http server");
        beacon_log::info!("  listening on http://{}/", listener.local_addr()?);

        let handle = Handle::new();
        let server = axum_server::from_tcp(listener).handle(handle.clone());

        tokio::spawn(async move {
            signal.await;
            beacon_log::info!("shutting down HTTP server");
            handle.graceful_shutdown(Some(shutdown_timeout));
        });

        let app = make_app(service);
        server.serve(app.into_make_service()).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::testutils::{FixedOutcomes, TestService};

    #[tokio::test]
    async fn test_serves_until_signal() {
        beacon_log::init_test!();

        let config = Config::from_json_value(serde_json::json!({
            "server": {"host": "127.0.0.1", "port": 0}
        }))
        .unwrap();

        let service = TestService::with_config(config, 1.0, FixedOutcomes::ok());
        let server = HttpServer::new(service.state.config(), service.state.clone()).unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(server.run(Duration::from_secs(1), async {
            shutdown_rx.await.ok();
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("ok\n"), "{response}");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_bind_conflict() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = Config::from_json_value(serde_json::json!({
            "server": {"host": "127.0.0.1", "port": port}
        }))
        .unwrap();

        let service = TestService::new(1.0, FixedOutcomes::ok());
        assert!(matches!(
            HttpServer::new(&config, service.state),
            Err(ServerError::BindFailed(_))
        ));
    }
}
