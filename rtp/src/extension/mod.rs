pub mod abs_send_time_extension;
pub mod audio_level_extension;
pub mod transport_cc_extension;
