pub mod generator;
pub mod receive_log;
pub mod responder;
pub mod send_buffer;

pub use generator::Generator;
pub use receive_log::ReceiveLog;
pub use responder::Responder;
pub use send_buffer::SendBuffer;

// stream_support_nack checks for the negotiated generic NACK feedback.
pub(crate) fn stream_support_nack(info: &crate::stream_info::StreamInfo) -> bool {
    info.rtcp_feedback
        .iter()
        .any(|fb| fb.typ == "nack" && fb.parameter.is_empty())
}
