//! Knapsack admission service
//!
//! Selects which ready jobs to dispatch under the remaining core budget:
//! a 0/1 knapsack with thread demand as both weight and value, so the
//! chosen subset maximises budget utilisation. Ties are broken towards
//! lower sequence numbers, which keeps the choice deterministic for a
//! given ready set and budget.

use crate::domain::entities::job::JobId;

/// Picks a subset of `(job id, thread demand)` items whose demands sum to
/// at most `capacity`, maximising the total demand satisfied
///
/// Items must be sorted by job id ascending; the returned ids are in
/// ascending order as well.
pub fn select(items: &[(JobId, usize)], capacity: usize) -> Vec<JobId> {
    if capacity == 0 || items.is_empty() {
        return Vec::new();
    }
    // dp[w] = best (total demand, chosen item indices) within weight w.
    // Updating only on strict improvement keeps earlier-id sets on ties.
    let mut dp: Vec<Option<(usize, Vec<usize>)>> = vec![None; capacity + 1];
    dp[0] = Some((0, Vec::new()));
    for (index, &(_, demand)) in items.iter().enumerate() {
        if demand > capacity {
            continue;
        }
        for w in (demand..=capacity).rev() {
            let Some((base_value, base_picks)) = dp[w - demand].clone() else {
                continue;
            };
            let candidate = base_value + demand;
            let improves = match &dp[w] {
                Some((value, _)) => candidate > *value,
                None => true,
            };
            if improves {
                let mut picks = base_picks;
                picks.push(index);
                dp[w] = Some((candidate, picks));
            }
        }
    }
    let mut best: Option<&(usize, Vec<usize>)> = None;
    for entry in dp.iter().flatten() {
        if best.map_or(true, |b| entry.0 > b.0) {
            best = Some(entry);
        }
    }
    match best {
        Some((_, picks)) => {
            let mut ids: Vec<JobId> = picks.iter().map(|&i| items[i].0).collect();
            ids.sort_unstable();
            ids
        }
        None => Vec::new(),
    }
}
