use util::replay_detector::*;

pub type ContextOption = Box<dyn (Fn() -> Box<dyn ReplayDetector + Send + 'static>) + Send + Sync>;

pub const MAX_SEQUENCE_NUMBER: u16 = 65535;
pub const MAX_SRTCP_INDEX: usize = 0x7FFF_FFFF;

// srtp_replay_protection enables a sliding replay window for SRTP.
pub fn srtp_replay_protection(window_size: usize) -> ContextOption {
    Box::new(move || {
        Box::new(WrappedSlidingWindowDetector::new(
            window_size,
            MAX_SEQUENCE_NUMBER as u64,
        ))
    })
}

// srtcp_replay_protection enables a sliding replay window for SRTCP.
pub fn srtcp_replay_protection(window_size: usize) -> ContextOption {
    Box::new(move || Box::new(SlidingWindowDetector::new(window_size, MAX_SRTCP_INDEX as u64)))
}

pub fn srtp_no_replay_protection() -> ContextOption {
    Box::new(|| Box::<NoOpReplayDetector>::default())
}

pub fn srtcp_no_replay_protection() -> ContextOption {
    Box::new(|| Box::<NoOpReplayDetector>::default())
}
