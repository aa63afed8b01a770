pub mod event_extractor;
pub mod lookup;
pub mod notification_decider;
pub mod session_manager;
pub mod submission_probe;
