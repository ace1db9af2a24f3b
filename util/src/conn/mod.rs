pub mod conn_udp;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

pub use conn_udp::*;

// Conn is an abstract datagram-oriented connection. UDP sockets, TURN
// relayed transports and in-memory pipes all implement it so the layers
// above never care which path a packet takes.
#[async_trait]
pub trait Conn: Send + Sync {
    async fn connect(&self, addr: SocketAddr) -> Result<()>;
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
    async fn send(&self, buf: &[u8]) -> Result<usize>;
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    fn local_addr(&self) -> Result<SocketAddr>;
    fn remote_addr(&self) -> Option<SocketAddr>;
    async fn close(&self) -> Result<()>;
}
