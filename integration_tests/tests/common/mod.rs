#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;

use universe_gen::{GenerationConfig, SectorId, Universe, ENTRY_SECTOR};

pub fn seeded(sector_count: u32, seed: u64) -> GenerationConfig {
    GenerationConfig::with_sectors(sector_count).with_seed(seed)
}

// Built from the link list alone so checks do not lean on the library's own
// traversal. Index 0 is unused.
fn adjacency(universe: &Universe) -> Vec<Vec<SectorId>> {
    let mut adjacency = vec![Vec::new(); universe.sector_count() as usize + 1];
    for link in universe.links() {
        let (a, b) = link.endpoints();
        adjacency[a as usize].push(b);
        adjacency[b as usize].push(a);
    }
    adjacency
}

/// Hop counts from `start`, indexed by sector id.
pub fn hops_from(universe: &Universe, start: SectorId) -> Vec<Option<u32>> {
    let adjacency = adjacency(universe);
    let mut hops = vec![None; adjacency.len()];
    hops[start as usize] = Some(0);
    let mut queue = VecDeque::from([start]);
    while let Some(sector) = queue.pop_front() {
        let next_hop = hops[sector as usize].map(|h: u32| h + 1);
        for &next in &adjacency[sector as usize] {
            if hops[next as usize].is_none() {
                hops[next as usize] = next_hop;
                queue.push_back(next);
            }
        }
    }
    hops
}

pub fn reachable_from_entry(universe: &Universe) -> BTreeSet<SectorId> {
    hops_from(universe, ENTRY_SECTOR)
        .iter()
        .enumerate()
        .filter(|(_, hops)| hops.is_some())
        .map(|(sector, _)| sector as SectorId)
        .collect()
}

/// Panics unless the link list is simple: no self-loops, no duplicates,
/// every endpoint a real sector, and neighbor lists agreeing with links.
pub fn assert_simple_graph(universe: &Universe) {
    let mut seen = BTreeSet::new();
    for link in universe.links() {
        let (a, b) = link.endpoints();
        assert_ne!(a, b, "self-loop at sector {a}");
        assert!(a >= 1 && b <= universe.sector_count(), "link {a}-{b} out of range");
        assert!(seen.insert((a.min(b), a.max(b))), "duplicate link {a}-{b}");
    }
    for sector in universe.sectors() {
        for &neighbor in sector.neighbors() {
            let key = (sector.id().min(neighbor), sector.id().max(neighbor));
            assert!(seen.contains(&key), "neighbor {neighbor} of {} has no link", sector.id());
        }
    }
    let degree_sum: usize = universe.sectors().iter().map(|sector| sector.degree()).sum();
    assert_eq!(degree_sum, 2 * universe.links().len());
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("universe_gen-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
