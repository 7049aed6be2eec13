mod signals_interface;

pub use signals_interface::*;

// Scriptable implementation for testing.
#[cfg(test)]
mod signals_mock;
#[cfg(test)]
pub use signals_mock::MockSignalGenerator;
