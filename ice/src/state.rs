use std::fmt;

// ConnectionState is the ICE session lifecycle
// (gathering happens in parallel and has its own state).
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::New
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::New => "new",
            ConnectionState::Checking => "checking",
            ConnectionState::Connected => "connected",
            ConnectionState::Completed => "completed",
            ConnectionState::Failed => "failed",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

// GatheringState tracks candidate gathering.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

impl Default for GatheringState {
    fn default() -> Self {
        GatheringState::New
    }
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatheringState::New => "new",
            GatheringState::Gathering => "gathering",
            GatheringState::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
