use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GenerationConfig, MIN_SECTOR_COUNT, MIN_WARP_CAP};
use crate::rng::RandomStream;

pub type SectorId = u32;

/// Designated universe entry point.
pub const ENTRY_SECTOR: SectorId = 1;

const ATTEMPTS_PER_SECTOR: usize = 32;

/// Undirected link between two distinct sectors, stored as `(low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarpLink {
    low: SectorId,
    high: SectorId,
}

impl WarpLink {
    /// Returns `None` for a self loop.
    pub fn new(a: SectorId, b: SectorId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> SectorId {
        self.low
    }

    pub fn high(&self) -> SectorId {
        self.high
    }

    pub fn endpoints(&self) -> (SectorId, SectorId) {
        (self.low, self.high)
    }

    pub fn is_self_loop(&self) -> bool {
        self.low == self.high
    }
}

/// Simple undirected graph over sectors `1..=N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarpGraph {
    adjacency: Vec<BTreeSet<SectorId>>,
    link_count: usize,
}

impl WarpGraph {
    /// Graph with `sector_count` sectors and no links.
    pub fn with_sectors(sector_count: u32) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); sector_count as usize],
            link_count: 0,
        }
    }

    pub fn sector_count(&self) -> u32 {
        self.adjacency.len() as u32
    }

    pub fn sectors(&self) -> impl Iterator<Item = SectorId> {
        1..=self.sector_count()
    }

    pub fn contains(&self, sector: SectorId) -> bool {
        sector >= 1 && sector <= self.sector_count()
    }

    fn slot(sector: SectorId) -> usize {
        (sector - 1) as usize
    }

    pub fn degree(&self, sector: SectorId) -> usize {
        if self.contains(sector) {
            self.adjacency[Self::slot(sector)].len()
        } else {
            0
        }
    }

    pub fn neighbors(&self, sector: SectorId) -> impl Iterator<Item = SectorId> + '_ {
        let slot = if self.contains(sector) {
            Some(Self::slot(sector))
        } else {
            None
        };
        slot.and_then(|idx| self.adjacency.get(idx))
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn is_linked(&self, a: SectorId, b: SectorId) -> bool {
        self.contains(a) && self.adjacency[Self::slot(a)].contains(&b)
    }

    /// Adds a link, returning `false` for self loops, duplicates and unknown
    /// sectors.
    pub fn add_link(&mut self, a: SectorId, b: SectorId) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) || self.is_linked(a, b) {
            return false;
        }
        self.adjacency[Self::slot(a)].insert(b);
        self.adjacency[Self::slot(b)].insert(a);
        self.link_count += 1;
        true
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    /// All links in ascending `(low, high)` order.
    pub fn links(&self) -> Vec<WarpLink> {
        let mut links = Vec::with_capacity(self.link_count);
        for sector in self.sectors() {
            for neighbor in self.adjacency[Self::slot(sector)].range(sector + 1..) {
                links.push(WarpLink {
                    low: sector,
                    high: *neighbor,
                });
            }
        }
        links
    }

    pub fn average_degree(&self) -> f32 {
        if self.adjacency.is_empty() {
            0.0
        } else {
            (2 * self.link_count) as f32 / self.adjacency.len() as f32
        }
    }

    pub fn max_degree(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).max().unwrap_or(0)
    }

    /// Sectors with exactly one link, ascending.
    pub fn dead_ends(&self) -> Vec<SectorId> {
        self.sectors().filter(|&s| self.degree(s) == 1).collect()
    }

    /// Sectors other than `sector` that are not linked to it, ascending.
    pub fn non_adjacent(&self, sector: SectorId) -> Vec<SectorId> {
        self.sectors()
            .filter(|&other| other != sector && !self.is_linked(sector, other))
            .collect()
    }

    /// Breadth-first flood from `start`, marking sectors in `reached`
    /// (indexed by `id - 1`). Returns the sectors newly reached, in visit
    /// order.
    pub fn extend_reach(&self, start: SectorId, reached: &mut [bool]) -> Vec<SectorId> {
        let mut visited = Vec::new();
        if !self.contains(start) || reached[Self::slot(start)] {
            return visited;
        }
        let mut queue = VecDeque::new();
        reached[Self::slot(start)] = true;
        queue.push_back(start);
        while let Some(sector) = queue.pop_front() {
            visited.push(sector);
            for neighbor in &self.adjacency[Self::slot(sector)] {
                let idx = Self::slot(*neighbor);
                if !reached[idx] {
                    reached[idx] = true;
                    queue.push_back(*neighbor);
                }
            }
        }
        visited
    }

    pub fn reachable_from(&self, start: SectorId) -> Vec<bool> {
        let mut reached = vec![false; self.adjacency.len()];
        self.extend_reach(start, &mut reached);
        reached
    }

    pub fn is_connected(&self) -> bool {
        self.reachable_from(ENTRY_SECTOR).iter().all(|&r| r)
    }

    /// Hop distance from `start` to every sector (`None` when unreachable),
    /// indexed by `id - 1`.
    pub fn distances_from(&self, start: SectorId) -> Vec<Option<u32>> {
        let mut distances = vec![None; self.adjacency.len()];
        if !self.contains(start) {
            return distances;
        }
        let mut queue = VecDeque::new();
        distances[Self::slot(start)] = Some(0);
        queue.push_back(start);
        while let Some(sector) = queue.pop_front() {
            let next = distances[Self::slot(sector)].unwrap_or(0) + 1;
            for neighbor in &self.adjacency[Self::slot(sector)] {
                let idx = Self::slot(*neighbor);
                if distances[idx].is_none() {
                    distances[idx] = Some(next);
                    queue.push_back(*neighbor);
                }
            }
        }
        distances
    }

    /// Sectors at most `max_hops` from `start` with their hop counts, in
    /// breadth-first order. Only the bounded neighbourhood is visited.
    pub fn within_hops(&self, start: SectorId, max_hops: u32) -> Vec<(SectorId, u32)> {
        if !self.contains(start) {
            return Vec::new();
        }
        let mut found = vec![(start, 0)];
        let mut seen = HashSet::from([start]);
        let mut cursor = 0;
        while cursor < found.len() {
            let (sector, hops) = found[cursor];
            cursor += 1;
            if hops >= max_hops {
                continue;
            }
            for &neighbor in &self.adjacency[Self::slot(sector)] {
                if seen.insert(neighbor) {
                    found.push((neighbor, hops + 1));
                }
            }
        }
        found
    }

    pub(crate) fn into_adjacency(self) -> Vec<BTreeSet<SectorId>> {
        self.adjacency
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphParams {
    pub sector_count: u32,
    pub target_average_degree: f32,
    pub max_warps_per_sector: u32,
}

impl GraphParams {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            sector_count: config.sector_count,
            target_average_degree: config.target_average_degree,
            max_warps_per_sector: config.max_warps_per_sector,
        }
    }
}

/// Builds a random connected graph: a random spanning tree plus extra links
/// up to the average degree target.
pub fn build_graph(params: &GraphParams, rng: &mut RandomStream) -> Result<WarpGraph, ConfigError> {
    if params.sector_count < MIN_SECTOR_COUNT {
        return Err(ConfigError::SectorCountTooLow {
            requested: params.sector_count,
            minimum: MIN_SECTOR_COUNT,
        });
    }
    if params.max_warps_per_sector < MIN_WARP_CAP {
        return Err(ConfigError::WarpCapTooLow {
            requested: params.max_warps_per_sector,
            minimum: MIN_WARP_CAP,
        });
    }

    let sector_count = params.sector_count;
    let cap = params.max_warps_per_sector as usize;
    let mut graph = WarpGraph::with_sectors(sector_count);

    attach_spanning_tree(&mut graph, cap, rng);
    tracing::debug!(
        target: "universe_gen::graph",
        sectors = sector_count,
        links = graph.link_count(),
        "graph.spanning.complete"
    );

    let target_links =
        (params.target_average_degree as f64 * sector_count as f64 / 2.0).ceil() as usize;
    let budget = sector_count as usize * ATTEMPTS_PER_SECTOR;
    let mut attempts = 0usize;
    while graph.link_count() < target_links && attempts < budget {
        attempts += 1;
        let (Some(a), Some(b)) = (
            rng.pick_index(sector_count as usize),
            rng.pick_index(sector_count as usize),
        ) else {
            break;
        };
        let (a, b) = (a as SectorId + 1, b as SectorId + 1);
        if graph.degree(a) >= cap || graph.degree(b) >= cap {
            continue;
        }
        graph.add_link(a, b);
    }
    if graph.link_count() < target_links {
        tracing::debug!(
            target: "universe_gen::graph",
            links = graph.link_count(),
            target_links,
            attempts,
            "graph.extra_links.budget_exhausted"
        );
    }

    ensure_entry_degree(&mut graph, cap, rng);

    tracing::debug!(
        target: "universe_gen::graph",
        sectors = sector_count,
        links = graph.link_count(),
        average_degree = graph.average_degree(),
        attempts,
        "graph.build.complete"
    );
    Ok(graph)
}

/// Attaches each sector `2..=N` to a random earlier sector that still has
/// room under the warp cap.
fn attach_spanning_tree(graph: &mut WarpGraph, cap: usize, rng: &mut RandomStream) {
    let mut open: Vec<SectorId> = vec![ENTRY_SECTOR];
    for sector in 2..=graph.sector_count() {
        let Some(idx) = rng.pick_index(open.len()) else {
            // Leave the remainder for the repair pass.
            break;
        };
        let anchor = open[idx];
        graph.add_link(sector, anchor);
        if graph.degree(anchor) >= cap {
            open.swap_remove(idx);
        }
        open.push(sector);
    }
}

fn ensure_entry_degree(graph: &mut WarpGraph, cap: usize, rng: &mut RandomStream) {
    while graph.sector_count() > 1 && graph.degree(ENTRY_SECTOR) < 2 {
        let Some(partner) = pick_partner(graph, ENTRY_SECTOR, cap, rng) else {
            break;
        };
        graph.add_link(ENTRY_SECTOR, partner);
    }
}

/// Random non-adjacent partner for `sector`, preferring sectors under `cap`.
pub(crate) fn pick_partner(
    graph: &WarpGraph,
    sector: SectorId,
    cap: usize,
    rng: &mut RandomStream,
) -> Option<SectorId> {
    let candidates = graph.non_adjacent(sector);
    let under_cap: Vec<SectorId> = candidates
        .iter()
        .copied()
        .filter(|&c| graph.degree(c) < cap)
        .collect();
    if under_cap.is_empty() {
        rng.pick(&candidates).copied()
    } else {
        rng.pick(&under_cap).copied()
    }
}
