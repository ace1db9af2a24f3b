use bytes::Bytes;

// ChunkCookieEcho echoes the state cookie from INIT-ACK (RFC 4960 §3.3.11).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkCookieEcho {
    pub cookie: Bytes,
}

// ChunkCookieAck completes the four-way handshake (RFC 4960 §3.3.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkCookieAck {}
