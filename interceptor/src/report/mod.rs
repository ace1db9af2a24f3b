pub mod receiver_report;
pub mod receiver_stream;
pub mod sender_report;
pub mod sender_stream;

pub use receiver_report::ReceiverReport;
pub use sender_report::SenderReport;

use std::time::{Duration, SystemTime};

pub(crate) const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

// ntp_time converts wall clock to the 64-bit NTP format used in SR/RR.
pub(crate) fn ntp_time(now: SystemTime) -> u64 {
    let since_epoch = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    // NTP era starts 1900-01-01, 70 years before the unix epoch.
    let secs = since_epoch.as_secs() + 2_208_988_800;
    let frac = ((since_epoch.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (secs << 32) | frac
}
