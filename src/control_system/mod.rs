pub mod controller;
pub mod direction_scorer;
pub mod manual_override;
pub mod phase_scheduler;
pub mod safety_monitor;
