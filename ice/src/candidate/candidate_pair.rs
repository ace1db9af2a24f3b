use std::fmt;

use super::Candidate;

// CandidatePairState per RFC 8445 §6.1.2.6.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum CandidatePairState {
    Frozen,
    Waiting,
    InProgress,
    Succeeded,
    Failed,
}

impl Default for CandidatePairState {
    fn default() -> Self {
        CandidatePairState::Frozen
    }
}

impl fmt::Display for CandidatePairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidatePairState::Frozen => "frozen",
            CandidatePairState::Waiting => "waiting",
            CandidatePairState::InProgress => "in-progress",
            CandidatePairState::Succeeded => "succeeded",
            CandidatePairState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// CandidatePair is one (local, remote) combination under test.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub local: Candidate,
    pub remote: Candidate,
    pub state: CandidatePairState,
    pub nominated: bool,
    // Pending nomination sent by the controlling side.
    pub nominate_on_success: bool,
    pub binding_request_count: u16,
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prio {} (local, prio {}) {} <-> {} (remote, prio {})",
            self.priority(true),
            self.local.priority,
            self.local,
            self.remote,
            self.remote.priority
        )
    }
}

impl PartialEq for CandidatePair {
    fn eq(&self, other: &Self) -> bool {
        self.local.id == other.local.id && self.remote.id == other.remote.id
    }
}

impl CandidatePair {
    pub fn new(local: Candidate, remote: Candidate) -> Self {
        CandidatePair {
            local,
            remote,
            state: CandidatePairState::Waiting,
            nominated: false,
            nominate_on_success: false,
            binding_request_count: 0,
        }
    }

    // priority per RFC 8445 §6.1.2.3:
    // 2^32·MIN(G,D) + 2·MAX(G,D) + (G>D ? 1 : 0)
    // where G is the controlling side's candidate priority and D the
    // controlled side's.
    pub fn priority(&self, is_controlling: bool) -> u64 {
        let (g, d) = if is_controlling {
            (self.local.priority as u64, self.remote.priority as u64)
        } else {
            (self.remote.priority as u64, self.local.priority as u64)
        };
        (1 << 32) * g.min(d) + 2 * g.max(d) + u64::from(g > d)
    }
}
