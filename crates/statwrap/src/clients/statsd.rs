//! DogStatsD metrics transport over raw UDP sockets.
//!
//! Implements the DogStatsD line protocol for counters, gauges, sets,
//! histograms, distributions, and timers, without a client library
//! dependency.
//!
//! ## Design
//! - **Raw UDP sockets** - lightweight, no cadence dependency
//! - **Non-blocking** - sends never stall the instrumented call
//! - **Best-effort delivery** - UDP is fire-and-forget, failures are
//!   logged and dropped
//! - **Tag support** - DogStatsD tags for dimensional metrics
//!
//! ## Line format
//! ```text
//! <NAMESPACE>.<KEY>:<VALUE>|<TYPE>|#<TAG1>,<TAG2>
//! ```

use std::env;
use std::fmt::Display;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::clients::StatsReporter;
use crate::error::{Error, Result};

/// Environment variable naming the agent host. Default: `localhost`.
pub const HOST_ENV: &str = "DATADOG_HOST";

/// Environment variable naming the agent port. Default: `8125`.
pub const PORT_ENV: &str = "DATADOG_PORT";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8125;

/// DogStatsD client using a non-blocking UDP socket.
#[derive(Debug)]
pub struct DogStatsdReporter {
    socket: UdpSocket,
    agent_addr: SocketAddr,
    namespace: Option<String>,
}

impl DogStatsdReporter {
    /// Connect to an explicit agent endpoint.
    ///
    /// An optional namespace is prepended to every metric key with `.`.
    pub fn new(host: &str, port: u16, namespace: Option<String>) -> Result<Self> {
        let agent_addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| Error::Transport { source })?
            .next()
            .ok_or_else(|| Error::Config(format!("cannot resolve stats endpoint {host}:{port}")))?;

        // Bind to any available port; non-blocking so sends never stall.
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;

        Ok(Self { socket, agent_addr, namespace })
    }

    /// Connect using `DATADOG_HOST`/`DATADOG_PORT`, with documented
    /// defaults (`localhost:8125`).
    pub fn from_env(namespace: Option<String>) -> Result<Self> {
        let host = env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("{PORT_ENV} is not a valid port: {raw}")))?,
            Err(_) => DEFAULT_PORT,
        };
        Self::new(&host, port, namespace)
    }

    fn send_metric<V: Display>(&self, key: &str, value: V, metric_type: &str, tags: &[String]) {
        let name = match &self.namespace {
            Some(namespace) => format!("{namespace}.{key}"),
            None => key.to_string(),
        };

        let line = if tags.is_empty() {
            format!("{name}:{value}|{metric_type}")
        } else {
            format!("{name}:{value}|{metric_type}|#{}", tags.join(","))
        };

        match self.socket.send_to(line.as_bytes(), self.agent_addr) {
            Ok(_) => {
                tracing::trace!(metric = %name, %value, "sent metric");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::warn!(metric = %name, error = %e, "dropped metric: send would block");
            }
            Err(e) => {
                tracing::warn!(metric = %name, error = %e, "failed to send metric");
            }
        }
    }
}

impl StatsReporter for DogStatsdReporter {
    fn count(&self, key: &str, value: i64, tags: &[String]) {
        self.send_metric(key, value, "c", tags);
    }

    fn gauge(&self, key: &str, value: f64, tags: &[String]) {
        self.send_metric(key, value, "g", tags);
    }

    fn set(&self, key: &str, value: &str, tags: &[String]) {
        self.send_metric(key, value, "s", tags);
    }

    fn histogram(&self, key: &str, value: f64, tags: &[String]) {
        self.send_metric(key, value, "h", tags);
    }

    fn distribution(&self, key: &str, value: f64, tags: &[String]) {
        self.send_metric(key, value, "d", tags);
    }

    fn timing(&self, key: &str, value_ms: f64, tags: &[String]) {
        self.send_metric(key, value_ms, "ms", tags);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind loopback receiver");
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .expect("set receiver timeout");
        let port = socket.local_addr().expect("receiver addr").port();
        (socket, port)
    }

    fn recv_line(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 512];
        let (len, _) = socket.recv_from(&mut buf).expect("metric datagram on loopback");
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    #[test]
    fn creation_does_not_require_a_running_agent() {
        let reporter = DogStatsdReporter::new("localhost", 8125, None);
        assert!(reporter.is_ok());
    }

    #[test]
    fn counters_use_the_line_protocol_with_namespace_and_tags() {
        let (socket, port) = receiver();
        let reporter = DogStatsdReporter::new("127.0.0.1", port, Some("testns".into()))
            .expect("loopback reporter");

        reporter.count("requests", 1, &["env:test".into(), "method:#save".into()]);
        assert_eq!(recv_line(&socket), "testns.requests:1|c|#env:test,method:#save");
    }

    #[test]
    fn untagged_metrics_omit_the_tag_section() {
        let (socket, port) = receiver();
        let reporter =
            DogStatsdReporter::new("127.0.0.1", port, None).expect("loopback reporter");

        reporter.gauge("pool.utilization", 0.75, &[]);
        assert_eq!(recv_line(&socket), "pool.utilization:0.75|g");
    }

    #[test]
    fn each_metric_type_has_its_own_marker() {
        let (socket, port) = receiver();
        let reporter =
            DogStatsdReporter::new("127.0.0.1", port, None).expect("loopback reporter");

        reporter.set("users", "u1", &[]);
        assert_eq!(recv_line(&socket), "users:u1|s");

        reporter.histogram("latency", 123.0, &[]);
        assert_eq!(recv_line(&socket), "latency:123|h");

        reporter.distribution("payload", 42.5, &[]);
        assert_eq!(recv_line(&socket), "payload:42.5|d");

        reporter.timing("save", 12.5, &[]);
        assert_eq!(recv_line(&socket), "save:12.5|ms");

        reporter.increment("hits", &[]);
        assert_eq!(recv_line(&socket), "hits:1|c");

        reporter.decrement("hits", &[]);
        assert_eq!(recv_line(&socket), "hits:-1|c");
    }

    #[test]
    fn invalid_port_from_env_fails_fast() {
        // Temporarily poison the port variable for this process.
        env::set_var(PORT_ENV, "not-a-port");
        let result = DogStatsdReporter::from_env(None);
        env::remove_var(PORT_ENV);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
