use std::collections::HashSet;

use crate::model::CalendarEvent;

/// Column per event (in the group's input order) and the group's width in columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAssignment {
    pub columns: Vec<u32>,
    pub used_columns: u32,
}

/// Greedy interval colouring: walking the group by start time, each event
/// takes the smallest column not held by an earlier event it overlaps.
pub fn assign_columns(group: &[CalendarEvent]) -> ColumnAssignment {
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by_key(|&i| group[i].span.start);

    let mut columns: Vec<Option<u32>> = vec![None; group.len()];
    for (pos, &i) in order.iter().enumerate() {
        let taken: HashSet<u32> = order[..pos]
            .iter()
            .filter(|&&j| group[j].span.overlaps(&group[i].span))
            .filter_map(|&j| columns[j])
            .collect();
        let mut column = 0;
        while taken.contains(&column) {
            column += 1;
        }
        columns[i] = Some(column);
    }

    let columns: Vec<u32> = columns.into_iter().map(|c| c.unwrap_or(0)).collect();
    let used_columns = columns.iter().max().map_or(1, |max| max + 1);
    ColumnAssignment {
        columns,
        used_columns,
    }
}
