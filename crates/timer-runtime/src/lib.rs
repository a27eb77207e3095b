#![doc = "Drift-compensating periodic timer for the precise timer workspace."]

pub mod compensator;
pub mod handler;
pub mod signal;
pub mod timer;

pub use compensator::*;
pub use handler::*;
pub use signal::{WaitOutcome, WakeSignal};
pub use timer::*;
