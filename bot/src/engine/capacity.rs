//! Capacity trigger: the two halves of team formation.
//!
//! `evaluate_fill` runs after every admitting mutation and
//! `evaluate_retraction` after every mutation that shrinks the confirmed list.
//! Both are pure apart from updating the cup's announcement state.

use tracing::info;

use super::cup::{Announcement, Cup};
use super::effects::{Activity, Effect};

/// Fire formation if the roster is exactly full and nothing is announced or
/// in flight. `formations` is the machine-wide counter used to tell a stale
/// announcement apart from the current one.
pub fn evaluate_fill(cup: &mut Cup, team_size: usize, formations: &mut u64) -> Option<Effect> {
    if cup.confirmed.len() != team_size || cup.announcement != Announcement::Absent {
        return None;
    }

    *formations += 1;
    let formation = *formations;
    cup.announcement = Announcement::Pending { formation };

    info!(formation, team_size, "roster full, forming team");

    Some(Effect::AnnounceTeam {
        formation,
        signup: cup.signup,
        members: cup.confirmed.clone(),
    })
}

/// Withdraw the announcement once the roster is no longer full.
///
/// A posted announcement is deleted and presence reverts to idle. A pending one
/// is forgotten here; when it lands, `RosterMachine::announcement_posted` sees
/// the mismatch and deletes it.
pub fn evaluate_retraction(cup: &mut Cup, team_size: usize) -> Vec<Effect> {
    if cup.confirmed.len() >= team_size {
        return Vec::new();
    }

    match std::mem::replace(&mut cup.announcement, Announcement::Absent) {
        Announcement::Absent => Vec::new(),
        Announcement::Pending { formation } => {
            info!(formation, "roster dropped below team size before announcement landed");
            Vec::new()
        }
        Announcement::Posted { message } => {
            info!(
                message_id = message.message_id,
                confirmed = cup.confirmed.len(),
                "roster dropped below team size, retracting announcement"
            );
            vec![
                Effect::DeleteMessage { message },
                Effect::SetPresence {
                    activity: Activity::Idle,
                },
            ]
        }
    }
}
