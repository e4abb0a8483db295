mod network_capture;

// Exports
pub use network_capture::*;
