//! Decision model: which broker call settles a deferred task.
//!
//! This is a pure function of the settlement cause and the task's effective
//! policy. Executing the decision (calling the message handle exactly once)
//! is the job of the [`SettlementEngine`](crate::app::SettlementEngine).

use super::outcome::{SettleCause, SettlementOutcome};
use super::policy::{AckPolicy, FailureAction};

/// Decide how to settle a task.
///
/// - `Completed` always acks.
/// - Every other cause (failure, timeout, shutdown) follows `on_failure`:
///   `Ack` acks, `Nack` nacks with the configured outcome.
pub fn decide(cause: SettleCause, policy: &AckPolicy) -> SettlementOutcome {
    if cause.is_success() {
        return SettlementOutcome::Ack;
    }
    match policy.on_failure.action {
        FailureAction::Ack => SettlementOutcome::Ack,
        FailureAction::Nack => SettlementOutcome::Nack(policy.on_failure.nack_outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::NackOutcome;
    use rstest::rstest;

    #[rstest]
    #[case(SettleCause::Completed, FailureAction::Nack, NackOutcome::Failed, SettlementOutcome::Ack)]
    #[case(SettleCause::Failed, FailureAction::Nack, NackOutcome::Rejected, SettlementOutcome::Nack(NackOutcome::Rejected))]
    #[case(SettleCause::Failed, FailureAction::Nack, NackOutcome::Failed, SettlementOutcome::Nack(NackOutcome::Failed))]
    #[case(SettleCause::Failed, FailureAction::Ack, NackOutcome::Failed, SettlementOutcome::Ack)]
    #[case(SettleCause::Timeout, FailureAction::Nack, NackOutcome::Failed, SettlementOutcome::Nack(NackOutcome::Failed))]
    #[case(SettleCause::Timeout, FailureAction::Ack, NackOutcome::Rejected, SettlementOutcome::Ack)]
    #[case(SettleCause::Shutdown, FailureAction::Nack, NackOutcome::Rejected, SettlementOutcome::Nack(NackOutcome::Rejected))]
    fn decide_follows_on_failure(
        #[case] cause: SettleCause,
        #[case] action: FailureAction,
        #[case] nack_outcome: NackOutcome,
        #[case] expected: SettlementOutcome,
    ) {
        let policy = AckPolicy::on_completion().with_failure(action, nack_outcome);
        assert_eq!(decide(cause, &policy), expected);
    }

    #[test]
    fn default_failure_is_nack_rejected() {
        assert_eq!(
            decide(SettleCause::Failed, &AckPolicy::on_completion()),
            SettlementOutcome::Nack(NackOutcome::Rejected)
        );
    }
}
