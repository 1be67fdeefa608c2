pub mod approval;
pub mod countdown;
pub mod prevalidation;
pub mod simulation;

pub use approval::{Approval, ApprovalStep};
pub use countdown::QuoteCountdown;
pub use prevalidation::{PreValidated, PreValidationStep};
pub use simulation::{decoded_call, SimulationStep};
