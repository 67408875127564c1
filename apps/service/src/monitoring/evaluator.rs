use chrono::{DateTime, Utc};

use super::types::{CheckOutcome, CheckRecord, CheckState, LogEntry};

/// Result of folding one outcome into a check's state machine
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// History line for this probe, carrying the pre-probe snapshot
    pub entry: LogEntry,
    /// Record to persist, with the new state and `last_checked`
    pub updated: CheckRecord,
}

impl Evaluation {
    pub fn state(&self) -> CheckState {
        self.entry.state
    }

    pub fn alert_warranted(&self) -> bool {
        self.entry.alert
    }
}

/// `Up` only when a status code came back and it is one of the success codes
pub fn derive_state(check: &CheckRecord, outcome: &CheckOutcome) -> CheckState {
    match outcome.response_code() {
        Some(code) if check.success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// A check that was never probed has no previous state to compare against
pub fn alert_warranted(check: &CheckRecord, new_state: CheckState) -> bool {
    !check.is_first_sight() && check.state != new_state
}

pub fn evaluate(check: &CheckRecord, outcome: CheckOutcome, now: DateTime<Utc>) -> Evaluation {
    let state = derive_state(check, &outcome);
    let alert = alert_warranted(check, state);

    let updated = CheckRecord { state, last_checked: Some(now), ..check.clone() };
    let entry = LogEntry { check: check.clone(), outcome, state, alert, time: now };

    Evaluation { entry, updated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{Method, Protocol};

    fn check(state: CheckState, last_checked: Option<DateTime<Utc>>) -> CheckRecord {
        CheckRecord {
            id: "abcdefghij0123456789".to_string(),
            user_phone: "5551234567".to_string(),
            protocol: Protocol::Http,
            url_tail: "example.com".to_string(),
            method: Method::Get,
            success_codes: vec![200],
            timeout_seconds: 2,
            state,
            last_checked,
        }
    }

    fn earlier() -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(1_600_000_000_000)
    }

    #[test]
    fn test_first_probe_up_does_not_alert() {
        let now = Utc::now();
        let eval = evaluate(&check(CheckState::Down, None), CheckOutcome::ResponseCode(200), now);

        assert_eq!(eval.state(), CheckState::Up);
        assert!(!eval.alert_warranted());
        assert_eq!(eval.updated.state, CheckState::Up);
        assert_eq!(eval.updated.last_checked, Some(now));
        assert_eq!(eval.entry.check.last_checked, None);
    }

    #[test]
    fn test_up_to_down_alerts() {
        let eval = evaluate(
            &check(CheckState::Up, earlier()),
            CheckOutcome::ResponseCode(500),
            Utc::now(),
        );

        assert_eq!(eval.state(), CheckState::Down);
        assert!(eval.alert_warranted());
    }

    #[test]
    fn test_errors_are_down() {
        let check = check(CheckState::Up, earlier());
        let refused = CheckOutcome::Error("connection refused".into());

        assert_eq!(derive_state(&check, &refused), CheckState::Down);
        assert_eq!(derive_state(&check, &CheckOutcome::timeout()), CheckState::Down);
    }

    #[test]
    fn test_first_probe_never_alerts() {
        for state in [CheckState::Up, CheckState::Down] {
            for outcome in [
                CheckOutcome::ResponseCode(200),
                CheckOutcome::ResponseCode(404),
                CheckOutcome::timeout(),
            ] {
                let eval = evaluate(&check(state, None), outcome, Utc::now());
                assert!(!eval.alert_warranted());
            }
        }
    }

    #[test]
    fn test_alert_iff_state_changes() {
        for previous in [CheckState::Up, CheckState::Down] {
            for outcome in [CheckOutcome::ResponseCode(200), CheckOutcome::ResponseCode(503)] {
                let eval = evaluate(&check(previous, earlier()), outcome, Utc::now());
                assert_eq!(eval.alert_warranted(), eval.state() != previous);
            }
        }
    }

    #[test]
    fn test_replayed_outcome_is_idempotent() {
        let first = evaluate(&check(CheckState::Up, earlier()), CheckOutcome::ResponseCode(200), Utc::now());
        let later = first.updated.last_checked.unwrap() + chrono::Duration::seconds(60);
        let second = evaluate(&first.updated, CheckOutcome::ResponseCode(200), later);

        assert!(!second.alert_warranted());
        assert_eq!(second.updated.state, CheckState::Up);
        assert_eq!(second.updated.last_checked, Some(later));
    }
}
