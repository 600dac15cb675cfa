pub mod log_feed;
pub mod snapshot_publisher;
pub mod snapshot_recorder;
