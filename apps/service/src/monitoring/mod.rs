/// Check engine - everything between a raw stored record and a state decision
///
/// This module is responsible for:
/// - Validating raw check records
/// - Probing HTTP/HTTPS endpoints with one-shot outcome delivery
/// - Folding outcomes into the up/down state machine
pub mod checker;
pub mod evaluator;
pub mod types;
pub mod validation;

pub use checker::{HttpProber, OutcomeSlot, ProbeRequest, Prober};
pub use evaluator::{Evaluation, evaluate};
pub use types::{CheckOutcome, CheckRecord, CheckState, LogEntry, Method, Protocol};
pub use validation::{ValidationError, validate_check};
