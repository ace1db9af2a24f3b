pub mod rtp_receiver;
pub mod rtp_sender;

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::media_engine::RTPCodecType;
use rtp_receiver::RTCRtpReceiver;
use rtp_sender::RTCRtpSender;

// RTCRtpTransceiverDirection per W3C.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCRtpTransceiverDirection {
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

impl fmt::Display for RTCRtpTransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCRtpTransceiverDirection::Sendrecv => "sendrecv",
            RTCRtpTransceiverDirection::Sendonly => "sendonly",
            RTCRtpTransceiverDirection::Recvonly => "recvonly",
            RTCRtpTransceiverDirection::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

impl RTCRtpTransceiverDirection {
    pub fn from_str(s: &str) -> Self {
        match s {
            "sendonly" => RTCRtpTransceiverDirection::Sendonly,
            "recvonly" => RTCRtpTransceiverDirection::Recvonly,
            "inactive" => RTCRtpTransceiverDirection::Inactive,
            _ => RTCRtpTransceiverDirection::Sendrecv,
        }
    }

    // reverse is the direction the answerer mirrors back.
    pub fn reverse(&self) -> Self {
        match self {
            RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Sendonly,
            other => *other,
        }
    }
}

// RTCRtpTransceiver pairs one sender and one receiver under a mid.
pub struct RTCRtpTransceiver {
    pub kind: RTPCodecType,
    pub(crate) mid: Mutex<Option<String>>,
    pub(crate) direction: Mutex<RTCRtpTransceiverDirection>,
    pub sender: Arc<RTCRtpSender>,
    pub receiver: Arc<RTCRtpReceiver>,
}

impl RTCRtpTransceiver {
    pub(crate) fn new(
        kind: RTPCodecType,
        direction: RTCRtpTransceiverDirection,
        sender: Arc<RTCRtpSender>,
        receiver: Arc<RTCRtpReceiver>,
    ) -> Arc<Self> {
        Arc::new(RTCRtpTransceiver {
            kind,
            mid: Mutex::new(None),
            direction: Mutex::new(direction),
            sender,
            receiver,
        })
    }

    pub async fn mid(&self) -> Option<String> {
        self.mid.lock().await.clone()
    }

    // set_mid is called once at SDP application and stays stable across
    // renegotiation.
    pub(crate) async fn set_mid(&self, mid: String) {
        let mut guard = self.mid.lock().await;
        if guard.is_none() {
            *guard = Some(mid);
        }
    }

    pub async fn direction(&self) -> RTCRtpTransceiverDirection {
        *self.direction.lock().await
    }

    pub async fn set_direction(&self, direction: RTCRtpTransceiverDirection) {
        *self.direction.lock().await = direction;
    }
}
