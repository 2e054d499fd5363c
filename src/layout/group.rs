use crate::model::CalendarEvent;

/// Partition events into overlap groups in one pass.
///
/// Events are visited by start time (stable on ties). Each one joins the
/// first group, in creation order, holding at least one member it overlaps;
/// otherwise it opens a new group. Membership chains: two events that never
/// overlap each other can share a group through a third one.
pub fn group_overlapping(events: &[CalendarEvent]) -> Vec<Vec<CalendarEvent>> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.span.start);

    let mut groups: Vec<Vec<CalendarEvent>> = Vec::new();
    for event in sorted {
        let home = groups
            .iter_mut()
            .find(|group| group.iter().any(|member| member.span.overlaps(&event.span)));
        match home {
            Some(group) => group.push(event),
            None => groups.push(vec![event]),
        }
    }
    groups
}
