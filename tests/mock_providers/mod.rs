//! Mock read-aloud service
//!
//! Speaks the edge read-aloud WebSocket dialect closely enough to drive the
//! client end to end over a real loopback socket:
//! - records every upgrade request (URI and handshake headers)
//! - records the text frames sent by the client
//! - replies with binary audio frames followed by `turn.end`
//!
//! Behaviours simulate the failure shapes the client has to survive:
//! - handshake rejection for authenticated connections
//! - audio frames with a non-audio content type
//! - an abrupt close before any audio

use std::sync::atomic::{AtomicU64, Ordering};

pub mod websocket_mock;

/// Statistics collector for mock server
#[derive(Debug, Default)]
pub struct MockStats {
    pub total_connections: AtomicU64,
    pub rejected_connections: AtomicU64,
    pub audio_frames_sent: AtomicU64,
    pub completed_turns: AtomicU64,
}

impl MockStats {
    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_frame(&self) {
        self.audio_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn(&self) {
        self.completed_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Connections: {}, Rejected: {}, AudioFrames: {}, Turns: {}",
            self.total_connections.load(Ordering::Relaxed),
            self.rejected_connections.load(Ordering::Relaxed),
            self.audio_frames_sent.load(Ordering::Relaxed),
            self.completed_turns.load(Ordering::Relaxed),
        )
    }
}
