//! RowID diff between the running and the desired frontend sets.

use std::collections::HashMap;

use crate::config::RowId;
use crate::model::Frontend;

/// What an activation has to do, as indices into the two frontend sets.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// Running frontends with no counterpart in the desired set.
    pub removed: Vec<usize>,
    /// Desired frontends with no counterpart in the running set.
    pub added: Vec<usize>,
    /// `(desired, running)` pairs that keep their runtime.
    pub retained: Vec<(usize, usize)>,
}

/// Match frontends by RowID.
///
/// A RowID whose type changed cannot keep its listeners, so it shows up as
/// removed and added.
pub fn plan(running: &[Frontend], desired: &[Frontend]) -> Plan {
    let by_row: HashMap<RowId, usize> = running
        .iter()
        .enumerate()
        .map(|(i, f)| (f.row_id(), i))
        .collect();

    let mut plan = Plan::default();
    let mut matched = vec![false; running.len()];

    for (d, frontend) in desired.iter().enumerate() {
        match by_row.get(&frontend.row_id()) {
            Some(&r) if running[r].kind() == frontend.kind() => {
                matched[r] = true;
                plan.retained.push((d, r));
            }
            _ => plan.added.push(d),
        }
    }

    plan.removed = matched
        .iter()
        .enumerate()
        .filter(|(_, m)| !**m)
        .map(|(i, _)| i)
        .collect();
    plan
}

/// Split a retained frontend's ports into (to stop, to bind).
pub fn port_changes(bound: &[u16], declared: &[u16]) -> (Vec<u16>, Vec<u16>) {
    let stop = bound.iter().copied().filter(|p| !declared.contains(p)).collect();
    let mut bind: Vec<u16> = Vec::new();
    for &p in declared {
        if !bound.contains(&p) && !bind.contains(&p) {
            bind.push(p);
        }
    }
    (stop, bind)
}
