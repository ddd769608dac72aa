//! Reconnect/backoff control for a single logical connection.
//!
//! - [`backoff`]: pure delay policies
//! - [`attempt`]: attempt counter and the synchronous state machine
//! - [`timer`]: owned cancelable timers
//! - [`controller`]: the task that executes the machine's directives

pub mod attempt;
pub mod backoff;
pub mod controller;
pub mod timer;

pub use attempt::{ConnectionAttempt, Directive, Phase, ReconnectMachine, RetryTrigger};
pub use backoff::{BackoffPolicy, Growth, RetryPolicy};
pub use controller::{Controller, ControllerConfig, ControllerEvent, ControllerHandle, ControllerStatus};
pub use timer::ScheduledTask;
