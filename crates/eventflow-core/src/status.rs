//! Lifecycle status machines for publication and schedule rows.
//!
//! Rows are created once and then only advanced. The transition tables
//! here are what the stores consult before issuing an update, so an
//! out-of-order update is rejected instead of silently overwriting a
//! terminal status.

/// Delivery status of a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    /// Row created, no consumer observed yet.
    Created,
    /// A hub acknowledged consumption.
    ConsumedByHub,
    /// A spoke acknowledged consumption.
    ConsumedBySpoke,
    /// Delivery completed. Terminal.
    Success,
    /// Delivery failed. Terminal.
    Failed,
    /// Delivery outcome could not be determined. Terminal.
    Orphan,
}

impl PublicationStatus {
    /// Storage representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ConsumedByHub => "consumed-by-hub",
            Self::ConsumedBySpoke => "consumed-by-spoke",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Orphan => "orphan",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "consumed-by-hub" => Some(Self::ConsumedByHub),
            "consumed-by-spoke" => Some(Self::ConsumedBySpoke),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "orphan" => Some(Self::Orphan),
            _ => None,
        }
    }

    /// Whether no further transition is allowed out of this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Orphan)
    }

    /// Whether the state machine allows advancing to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::ConsumedByHub | Self::ConsumedBySpoke)
                | (
                    Self::Created | Self::ConsumedByHub | Self::ConsumedBySpoke,
                    Self::Success | Self::Failed | Self::Orphan,
                )
        )
    }
}

/// Execution status of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// Waiting for its scheduled time.
    Scheduled,
    /// Picked up for execution.
    Executed,
    /// Execution completed. Terminal.
    Success,
    /// Execution failed. Terminal.
    Failed,
}

impl ScheduleStatus {
    /// Storage representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Executed => "executed",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "executed" => Some(Self::Executed),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further transition is allowed out of this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether the state machine allows advancing to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::Executed) | (Self::Executed, Self::Success | Self::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{PublicationStatus, ScheduleStatus};

    #[test]
    fn test_publication_legal_transitions() {
        use PublicationStatus::{ConsumedByHub, ConsumedBySpoke, Created, Failed, Orphan, Success};

        assert!(Created.can_transition_to(ConsumedByHub));
        assert!(Created.can_transition_to(ConsumedBySpoke));
        for source in [Created, ConsumedByHub, ConsumedBySpoke] {
            assert!(source.can_transition_to(Success));
            assert!(source.can_transition_to(Failed));
            assert!(source.can_transition_to(Orphan));
        }
    }

    #[test]
    fn test_publication_terminal_statuses_accept_nothing() {
        use PublicationStatus::{ConsumedByHub, Created, Failed, Orphan, Success};

        for terminal in [Success, Failed, Orphan] {
            assert!(terminal.is_terminal());
            for target in [Created, ConsumedByHub, Success, Failed, Orphan] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_publication_consumed_cannot_regress_or_cross() {
        use PublicationStatus::{ConsumedByHub, ConsumedBySpoke, Created};

        assert!(!ConsumedByHub.can_transition_to(Created));
        assert!(!ConsumedByHub.can_transition_to(ConsumedBySpoke));
        assert!(!ConsumedBySpoke.can_transition_to(ConsumedByHub));
    }

    #[test]
    fn test_schedule_transition_chain() {
        use ScheduleStatus::{Executed, Failed, Scheduled, Success};

        assert!(Scheduled.can_transition_to(Executed));
        assert!(Executed.can_transition_to(Success));
        assert!(Executed.can_transition_to(Failed));
        assert!(!Scheduled.can_transition_to(Success));
        assert!(!Scheduled.can_transition_to(Failed));
        assert!(!Success.can_transition_to(Failed));
    }

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in [
            PublicationStatus::Created,
            PublicationStatus::ConsumedByHub,
            PublicationStatus::ConsumedBySpoke,
            PublicationStatus::Success,
            PublicationStatus::Failed,
            PublicationStatus::Orphan,
        ] {
            assert_eq!(PublicationStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            ScheduleStatus::Scheduled,
            ScheduleStatus::Executed,
            ScheduleStatus::Success,
            ScheduleStatus::Failed,
        ] {
            assert_eq!(ScheduleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PublicationStatus::parse("bogus"), None);
        assert_eq!(ScheduleStatus::parse("bogus"), None);
    }
}
