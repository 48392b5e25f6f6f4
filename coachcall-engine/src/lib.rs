pub mod controller;
pub mod record;
pub mod results;
pub mod session;
pub mod simulated;
pub mod timer;
pub mod traits;
pub mod transcript;
