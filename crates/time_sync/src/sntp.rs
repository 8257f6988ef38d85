//! SntpTransport - minimal SNTPv4 client (RFC 4330) over UDP

use std::net::SocketAddr;
use std::time::Duration;

use contracts::{NetworkError, TimeTransport};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, instrument};

/// Default NTP port
pub const NTP_PORT: u16 = 123;

const PACKET_LEN: usize = 48;
/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01
const NTP_UNIX_OFFSET_SECS: i64 = 2_208_988_800;
/// LI = 0, VN = 4, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0b00_100_011;
const MODE_SERVER: u8 = 4;

/// Time transport that asks an NTP server for its transmit timestamp
#[derive(Debug, Default, Clone, Copy)]
pub struct SntpTransport;

impl TimeTransport for SntpTransport {
    #[instrument(name = "sntp_query", skip(self, timeout))]
    async fn query_time(&self, server: &str, timeout: Duration) -> Result<i64, NetworkError> {
        match tokio::time::timeout(timeout, query(server)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                server: server.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

async fn query(server: &str) -> Result<i64, NetworkError> {
    let target = with_default_port(server);
    let addr = lookup_host(target.as_str())
        .await
        .map_err(|e| NetworkError::Resolve {
            server: server.to_string(),
            message: e.to_string(),
        })?
        .next()
        .ok_or_else(|| NetworkError::Resolve {
            server: server.to_string(),
            message: "no addresses".to_string(),
        })?;

    let io = |source: std::io::Error| NetworkError::Io {
        server: server.to_string(),
        source,
    };

    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await.map_err(io)?;
    socket.connect(addr).await.map_err(io)?;

    let mut request = [0u8; PACKET_LEN];
    request[0] = CLIENT_HEADER;
    socket.send(&request).await.map_err(io)?;

    let mut reply = [0u8; 128];
    let len = socket.recv(&mut reply).await.map_err(io)?;
    debug!(peer = %addr, bytes = len, "NTP reply received");

    parse_reply(server, &reply[..len])
}

/// Decode a server reply into Unix epoch milliseconds (transmit timestamp)
pub fn parse_reply(server: &str, data: &[u8]) -> Result<i64, NetworkError> {
    let invalid = |message: String| NetworkError::InvalidReply {
        server: server.to_string(),
        message,
    };

    if data.len() < PACKET_LEN {
        return Err(invalid(format!("short packet ({} bytes)", data.len())));
    }

    let mode = data[0] & 0b111;
    if mode != MODE_SERVER {
        return Err(invalid(format!("unexpected mode {mode}")));
    }

    // Stratum 0 is a kiss-o'-death; the reference id carries the ASCII code
    if data[1] == 0 {
        let code = String::from_utf8_lossy(&data[12..16]).into_owned();
        return Err(invalid(format!("kiss-o'-death '{code}'")));
    }

    let secs = u32::from_be_bytes([data[40], data[41], data[42], data[43]]);
    let frac = u32::from_be_bytes([data[44], data[45], data[46], data[47]]);
    if secs == 0 && frac == 0 {
        return Err(invalid("empty transmit timestamp".to_string()));
    }

    Ok(ntp_to_unix_ms(secs, frac))
}

/// Convert an NTP 32.32 timestamp to Unix epoch milliseconds
///
/// Seconds with the top bit clear are taken from era 1 (after 2036-02-07).
pub fn ntp_to_unix_ms(secs: u32, frac: u32) -> i64 {
    let mut ntp_secs = i64::from(secs);
    if secs & 0x8000_0000 == 0 {
        ntp_secs += 1 << 32;
    }
    let millis = (i64::from(frac) * 1000) >> 32;
    (ntp_secs - NTP_UNIX_OFFSET_SECS) * 1000 + millis
}

fn with_default_port(server: &str) -> String {
    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }
    match server.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
            server.to_string()
        }
        _ if server.contains(':') => format!("[{server}]:{NTP_PORT}"),
        _ => format!("{server}:{NTP_PORT}"),
    }
}
