//! Test doubles shared by the unit and behavioural suites.

mod clock;
mod processes;
mod recording;
mod scripted;
#[cfg(unix)]
mod simulated;

pub use clock::ManualClock;
pub use processes::LiveProcesses;
pub use recording::{ApplicationCalls, CountingApplication, RecordingSink};
pub use scripted::ScriptedBackend;
#[cfg(unix)]
pub use simulated::SimulatedOs;
