//! TCP connect operation driven by the controller.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use resilink::ConnectError;

/// Open a TCP connection to `host:port`, failing with a `TimeoutError`
/// after `connect_timeout`.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, ConnectError> {
    debug!("Connecting to {}:{}...", host, port);

    let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            ConnectError::timeout(format!(
                "connect to {}:{} timed out after {} ms",
                host,
                port,
                connect_timeout.as_millis()
            ))
        })??;

    stream.set_nodelay(true)?;
    Ok(stream)
}
