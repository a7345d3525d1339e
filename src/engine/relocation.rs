//! Targeted relocation of an already-placed session to free room for a
//! blocked tutorial or lab request.
//!
//! Only sessions placed by the current run, in the same week, for the same
//! class group, and of type TD or TP are movable. A trial removes one such
//! session, re-runs placement for the blocked request and then for the
//! removed session; unless both succeed the index (and the week's quota
//! counters) are restored exactly. At most one swap is committed per
//! placement attempt.

use crate::domain::{PlanningSnapshot, SessionId};
use crate::engine::availability::{AvailabilityIndex, PlacedSession};
use crate::engine::placement::{self, WeekState};
use crate::engine::requests::{RequestDetail, SeriesKey, SessionRequest};
use tracing::debug;

/// Rebuilds a placement request for a session being moved, pinning its
/// current teacher so a relocation never reshuffles teaching assignments.
fn request_for(session: &PlacedSession) -> SessionRequest {
    let detail = match session.kind {
        crate::domain::SessionKind::Tp => RequestDetail::Tp {
            subgroup: session.subgroup.clone(),
        },
        _ => RequestDetail::Td,
    };
    SessionRequest {
        series: SeriesKey {
            course: session.course,
            class_group: session.class_group,
            subgroup: session.subgroup.clone(),
        },
        detail,
        duration_hours: session.duration_hours(),
        preferred_teacher: Some(session.teacher),
        attempts: 0,
        carried_weeks: 0,
        last_rejection: None,
    }
}

/// Attempts to place `request` by moving one conflicting session elsewhere
/// in the week. Returns the id of the newly placed session on success.
pub fn try_relocate(
    request: &SessionRequest,
    snapshot: &PlanningSnapshot,
    index: &mut AvailabilityIndex,
    week: &mut WeekState,
    previous_teacher: Option<crate::domain::TeacherId>,
) -> Option<SessionId> {
    if !request.kind().relocatable() {
        return None;
    }

    // Movable sessions of the same class group this week, by start then id.
    let candidates: Vec<SessionId> = index
        .run_sessions_on_days(&week.days)
        .into_iter()
        .filter(|id| {
            index.get(*id).is_some_and(|s| {
                s.kind.relocatable() && s.class_group == request.series.class_group
            })
        })
        .collect();

    for victim_id in candidates {
        let Some(victim) = index.remove(victim_id) else {
            continue;
        };
        let placed_before = week.placed.clone();
        week.record_removed(victim.course);

        let placed_request =
            placement::place(request, snapshot, index, week, previous_teacher);
        let request_id = match placed_request {
            Ok(id) => {
                week.record_placed(request.series.course);
                id
            }
            Err(_) => {
                // Freeing this session did not help; restore and move on.
                index.insert(victim);
                week.placed = placed_before;
                continue;
            }
        };

        let victim_request = request_for(&victim);
        match placement::place(
            &victim_request,
            snapshot,
            index,
            week,
            Some(victim.teacher),
        ) {
            Ok(moved_id) => {
                week.record_placed(victim.course);
                debug!(
                    moved_session = %victim_id,
                    to_session = %moved_id,
                    freed_for = %request.series,
                    "relocated session to free a slot"
                );
                return Some(request_id);
            }
            Err(_) => {
                // The displaced session has nowhere to go; revert both moves.
                index.remove(request_id);
                index.insert(victim);
                week.placed = placed_before;
            }
        }
    }

    None
}
