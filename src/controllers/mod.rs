pub mod alerts_controller;
pub mod cycle_controller;
pub mod home_controller;
pub mod realtime_controller;
