//! Best-effort network time lookup.
//!
//! Some targets this agent runs on have no battery-backed clock, so after a
//! broker connection comes up the agent asks an SNTP server once for the
//! current time and logs it. Failures are logged and otherwise ignored;
//! nothing blocks on this.

use anyhow::anyhow;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};

const NTP_SERVER: &str = "pool.ntp.org:123";

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Query the network time once and log the outcome.
pub async fn sync_clock() {
    match network_time().await {
        Ok(now) => info!("network time: {}", now.to_rfc3339()),
        Err(e) => warn!("network time lookup failed: {}", e),
    }
}

async fn network_time() -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    let mut request = [0u8; 48];
    request[0] = 0x1b; // LI=0, VN=3, Mode=3 (client)
    socket.send_to(&request, NTP_SERVER).await?;

    let mut response = [0u8; 48];
    let (len, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut response)).await??;

    let seconds = transmit_seconds(&response[..len])
        .ok_or_else(|| anyhow!("short response ({} bytes)", len))?;
    chrono::DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| anyhow!("timestamp out of range: {}", seconds))
}

/// Extract the transmit timestamp (seconds since the Unix epoch) from an
/// SNTP response. The timestamp sits in bytes 40..44 of the packet.
fn transmit_seconds(response: &[u8]) -> Option<i64> {
    if response.len() < 44 {
        return None;
    }
    let word = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    Some(i64::from(word) - NTP_UNIX_OFFSET)
}
