//! Moderation lifecycle of an entity.
//!
//! ```text
//! active --report--> reported --threshold (hide on report)--> suspended
//!    ^                   |  --moderator suspend-------------->    |
//!    +-----moderator reactivate------+---------------------------+
//! ```

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use ::agora_protocol::model::entity::Status;
use ::agora_protocol::model::payload::ModerationAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }

    pub fn suspended(&self) -> bool {
        self.is_change() && self.to == Status::Suspended
    }
}

/// Checks that a new report may be filed against an entity in `current`.
pub fn check_reportable(current: Status) -> SyncResult<()> {
    match current {
        Status::Suspended => Err(SyncError::validation(
            "cannot report a suspended entity",
        )),
        Status::Active | Status::Reported => Ok(()),
    }
}

/// Status after a report has been recorded, given the number of distinct
/// reporters including the new one.
pub fn on_report(
    current: Status,
    distinct_reporters: usize,
    settings: &SyncSettings,
) -> SyncResult<Transition> {
    check_reportable(current)?;

    let threshold_reached = settings.hide_on_report
        && distinct_reporters >= settings.report_threshold.max(1) as usize;

    let to = if threshold_reached {
        Status::Suspended
    } else {
        Status::Reported
    };

    Ok(Transition { from: current, to })
}

pub fn on_moderator_action(
    current: Status,
    action: ModerationAction,
) -> SyncResult<Transition> {
    let to = match (action, current) {
        (ModerationAction::Suspend, Status::Reported) => Status::Suspended,
        (ModerationAction::Suspend, Status::Suspended) => {
            return Err(SyncError::conflict("entity is already suspended"))
        }
        (ModerationAction::Suspend, Status::Active) => {
            return Err(SyncError::validation(
                "cannot suspend an active entity that has not been reported",
            ))
        }
        (ModerationAction::Reactivate, Status::Reported)
        | (ModerationAction::Reactivate, Status::Suspended) => Status::Active,
        (ModerationAction::Reactivate, Status::Active) => {
            return Err(SyncError::conflict("entity is already active"))
        }
    };

    Ok(Transition { from: current, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(hide_on_report: bool, report_threshold: u32) -> SyncSettings {
        SyncSettings {
            hide_on_report,
            report_threshold,
            ..Default::default()
        }
    }

    #[test]
    fn first_report_moves_active_to_reported() {
        let transition = on_report(Status::Active, 1, &settings(true, 2)).unwrap();
        assert_eq!(transition.to, Status::Reported);
        assert!(transition.is_change());
        assert!(!transition.suspended());
    }

    #[test]
    fn threshold_suspends_only_with_hide_on_report() {
        let hidden = on_report(Status::Reported, 2, &settings(true, 2)).unwrap();
        assert_eq!(hidden.to, Status::Suspended);
        assert!(hidden.suspended());

        let below = on_report(Status::Reported, 1, &settings(true, 2)).unwrap();
        assert_eq!(below.to, Status::Reported);
        assert!(!below.is_change());

        for reporters in 1..10 {
            let kept = on_report(Status::Reported, reporters, &settings(false, 2))
                .unwrap();
            assert_eq!(kept.to, Status::Reported);
        }
    }

    #[test]
    fn threshold_of_one_chains_through_reported() {
        let transition = on_report(Status::Active, 1, &settings(true, 1)).unwrap();
        assert_eq!(transition.from, Status::Active);
        assert_eq!(transition.to, Status::Suspended);
    }

    #[test]
    fn suspended_entities_cannot_be_reported() {
        assert!(matches!(
            on_report(Status::Suspended, 3, &settings(true, 2)),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn moderator_transitions() {
        use ModerationAction::*;

        assert_eq!(
            on_moderator_action(Status::Reported, Suspend).unwrap().to,
            Status::Suspended
        );
        assert!(matches!(
            on_moderator_action(Status::Active, Suspend),
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            on_moderator_action(Status::Suspended, Suspend),
            Err(SyncError::Conflict(_))
        ));
        assert_eq!(
            on_moderator_action(Status::Suspended, Reactivate).unwrap().to,
            Status::Active
        );
        assert_eq!(
            on_moderator_action(Status::Reported, Reactivate).unwrap().to,
            Status::Active
        );
        assert!(matches!(
            on_moderator_action(Status::Active, Reactivate),
            Err(SyncError::Conflict(_))
        ));
    }
}
