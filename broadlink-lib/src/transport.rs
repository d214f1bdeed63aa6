//! One ephemeral UDP socket per exchange.

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::constants::RECV_BUFFER_SIZE;
use crate::error::Result;

/// Send `packet` to `remote` from a socket bound to `local` and wait for the
/// first datagram back. The whole exchange shares one deadline.
pub async fn exchange(local: SocketAddr, remote: SocketAddr, packet: &[u8], timeout: Duration) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let socket = UdpSocket::bind(local).await?;

    debug!(bytes = hex::encode(packet), %remote, "UDP Write");
    timeout_at(deadline, socket.send_to(packet, remote)).await??;

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let (len, from) = timeout_at(deadline, socket.recv_from(&mut buf)).await??;
    buf.truncate(len);
    debug!(bytes = hex::encode(&buf), %from, "UDP Read");

    Ok(Bytes::from(buf))
}

/// Send `packet` without waiting for a reply.
pub async fn send(local: SocketAddr, remote: SocketAddr, packet: &[u8], timeout: Duration) -> Result<()> {
    let socket = UdpSocket::bind(local).await?;
    debug!(bytes = hex::encode(packet), %remote, "UDP Write");
    tokio::time::timeout(timeout, socket.send_to(packet, remote)).await??;
    Ok(())
}

/// Bind a socket that may send to the broadcast address.
pub async fn bind_broadcast(local: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(local).await?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BroadlinkError;

    #[tokio::test]
    async fn test_exchange_echo() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = peer.recv_from(&mut buf).await.unwrap();
            peer.send_to(&buf[..len], from).await.unwrap();
        });

        let reply = exchange(
            "127.0.0.1:0".parse().unwrap(),
            peer_addr,
            b"ping",
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(reply.as_ref(), b"ping");
    }

    #[tokio::test]
    async fn test_exchange_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let result = exchange(
            "127.0.0.1:0".parse().unwrap(),
            silent.local_addr().unwrap(),
            b"ping",
            Duration::from_millis(50),
        )
        .await;
        match result {
            Err(e @ BroadlinkError::Timeout(_)) => assert!(e.is_timeout()),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }
}
