use std::collections::VecDeque;

use cellpotts_core::connectivity::preserves_connectivity;
use cellpotts_core::{Boundary, CellSpace, MEDIUM, Neighborhood, Occupancy};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Number of connected regions among locations matching `member`.
fn regions(space: &CellSpace, ids: &[u32], member: impl Fn(u32) -> bool) -> usize {
    let mut seen = vec![false; ids.len()];
    let mut count = 0;
    for start in 0..ids.len() {
        if seen[start] || !member(ids[start]) {
            continue;
        }
        count += 1;
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(loc) = queue.pop_front() {
            for &n in space.neighbors(loc) {
                if !seen[n] && member(ids[n]) {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }
    count
}

fn components(space: &CellSpace, ids: &[u32], id: u32) -> usize {
    regions(space, ids, |owner| owner == id)
}

/// Regions not owned by `id`, connected through the complementary neighborhood.
fn foreign_components(dual: &CellSpace, ids: &[u32], id: u32) -> usize {
    regions(dual, ids, |owner| owner != id)
}

fn dual_of(space: &CellSpace) -> CellSpace {
    let neighborhood = match space.neighborhood() {
        Neighborhood::Moore => Neighborhood::VonNeumann,
        Neighborhood::VonNeumann => Neighborhood::Moore,
    };
    CellSpace::with_boundaries(space.dims(), space.boundaries(), neighborhood).expect("dual space")
}

fn topology() -> impl Strategy<Value = (Vec<usize>, Boundary, Neighborhood)> {
    (
        prop::collection::vec(3usize..8, 2..=2),
        prop_oneof![Just(Boundary::Periodic), Just(Boundary::Fixed)],
        prop_oneof![Just(Neighborhood::Moore), Just(Neighborhood::VonNeumann)],
    )
}

/// Replay every allowed move on a copy of the grid. The loser must not split and
/// the gainer must not enclose anything.
fn check_all_moves(space: &CellSpace, ids: &[u32]) -> Result<(), TestCaseError> {
    let occupancy = Occupancy::from_ids(ids.to_vec());
    let dual = dual_of(space);
    for loc in 0..space.len() {
        let old = ids[loc];
        let mut candidates: Vec<u32> = space
            .neighbors(loc)
            .iter()
            .map(|&n| ids[n])
            .filter(|&owner| owner != old)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        for new in candidates {
            if !preserves_connectivity(space, &occupancy, loc, new, false) {
                continue;
            }
            let mut after = ids.to_vec();
            after[loc] = new;
            if old != MEDIUM {
                let before = components(space, ids, old);
                prop_assert!(
                    components(space, &after, old) <= before,
                    "moving {loc} from {old} to {new} split the cell"
                );
                prop_assert!(after.contains(&old), "cell {old} vanished");
            }
            if new != MEDIUM {
                let before = foreign_components(&dual, ids, new);
                prop_assert!(
                    foreign_components(&dual, &after, new) <= before,
                    "moving {loc} from {old} to {new} enclosed foreign locations"
                );
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn random_walk_blobs_never_split(
        (dims, boundary, neighborhood) in topology(),
        steps in prop::collection::vec(0usize..8, 1..40),
    ) {
        let space = CellSpace::new(&dims, boundary, neighborhood).expect("space");
        let mut ids = vec![MEDIUM; space.len()];
        let offsets = space.offsets();
        let mut loc = space.len() / 2;
        ids[loc] = 1;
        for step in steps {
            let offset = &offsets[step % offsets.len()];
            if let Some(next) = space.offset_location(loc, offset) {
                loc = next;
                ids[loc] = 1;
            }
        }
        check_all_moves(&space, &ids)?;
    }

    #[test]
    fn noisy_grids_never_split(
        (dims, boundary, neighborhood) in topology(),
        owners in prop::collection::vec(0u32..3, 49),
    ) {
        let space = CellSpace::new(&dims, boundary, neighborhood).expect("space");
        let ids: Vec<u32> = owners.into_iter().cycle().take(space.len()).collect();
        check_all_moves(&space, &ids)?;
    }
}

#[test]
fn fixed_edges_cannot_close_loops() {
    let space = CellSpace::new(&[5, 5], Boundary::Fixed, Neighborhood::Moore).expect("space");
    let mut ids = vec![MEDIUM; space.len()];
    for x in 0..3 {
        ids[space.location(&[x, 3]).expect("loc")] = 1;
    }
    check_all_moves(&space, &ids).expect("sound");
}

#[test]
fn three_wide_periodic_axes_stay_sound() {
    let space = CellSpace::new(&[3, 3], Boundary::Periodic, Neighborhood::Moore).expect("space");
    let ids = vec![1, 1, 0, 0, 1, 0, 0, 1, 1];
    check_all_moves(&space, &ids).expect("sound");
}
