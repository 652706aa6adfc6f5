use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::graph::{pick_partner, SectorId, WarpGraph, ENTRY_SECTOR};
use crate::rng::RandomStream;

// Random draws for a dead-end partner before falling back to a full scan.
const PARTNER_DRAWS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    pub allow_dead_ends: bool,
    pub max_rounds: u32,
    pub max_warps_per_sector: u32,
}

impl RepairPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            allow_dead_ends: config.allow_dead_ends,
            max_rounds: config.max_repair_rounds,
            max_warps_per_sector: config.max_warps_per_sector,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepairReport {
    /// Sectors that were unreachable and got linked back in.
    pub reconnected: Vec<SectorId>,
    /// Dead ends that received an extra link.
    pub dead_ends_patched: Vec<SectorId>,
    /// Dead ends left after the round budget ran out.
    pub dead_ends_remaining: Vec<SectorId>,
    pub rounds: u32,
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub graph: WarpGraph,
    pub report: RepairReport,
}

pub fn repair_connectivity(
    mut graph: WarpGraph,
    policy: &RepairPolicy,
    rng: &mut RandomStream,
) -> RepairOutcome {
    let mut report = RepairReport::default();
    let cap = policy.max_warps_per_sector as usize;

    reconnect(&mut graph, cap, rng, &mut report);
    if !policy.allow_dead_ends {
        patch_dead_ends(&mut graph, policy.max_rounds, cap, rng, &mut report);
    }

    tracing::debug!(
        target: "universe_gen::repair",
        reconnected = report.reconnected.len(),
        dead_ends_patched = report.dead_ends_patched.len(),
        dead_ends_remaining = report.dead_ends_remaining.len(),
        rounds = report.rounds,
        "repair.complete"
    );
    RepairOutcome { graph, report }
}

fn reconnect(graph: &mut WarpGraph, cap: usize, rng: &mut RandomStream, report: &mut RepairReport) {
    let mut reached = vec![false; graph.sector_count() as usize];
    let mut reached_list = graph.extend_reach(ENTRY_SECTOR, &mut reached);

    for sector in 1..=graph.sector_count() {
        if reached[(sector - 1) as usize] {
            continue;
        }
        let under_cap: Vec<SectorId> = reached_list
            .iter()
            .copied()
            .filter(|&s| graph.degree(s) < cap)
            .collect();
        let pool = if under_cap.is_empty() {
            &reached_list
        } else {
            &under_cap
        };
        let Some(&anchor) = rng.pick(pool) else {
            break;
        };
        graph.add_link(sector, anchor);
        report.reconnected.push(sector);
        tracing::debug!(
            target: "universe_gen::repair",
            sector,
            anchor,
            "repair.reconnected"
        );
        let newly = graph.extend_reach(sector, &mut reached);
        reached_list.extend(newly);
    }
}

fn patch_dead_ends(
    graph: &mut WarpGraph,
    max_rounds: u32,
    cap: usize,
    rng: &mut RandomStream,
    report: &mut RepairReport,
) {
    for round in 0..max_rounds {
        let dead_ends = graph.dead_ends();
        if dead_ends.is_empty() {
            break;
        }
        report.rounds = round + 1;
        for &sector in &dead_ends {
            // An earlier pairing this round may already have fixed it.
            if graph.degree(sector) != 1 {
                continue;
            }
            let partner = sample_dead_end_partner(graph, sector, &dead_ends, rng)
                .or_else(|| pick_partner(graph, sector, cap, rng));
            if let Some(partner) = partner {
                if graph.add_link(sector, partner) {
                    report.dead_ends_patched.push(sector);
                }
            }
        }
    }

    report.dead_ends_remaining = graph.dead_ends();
    if !report.dead_ends_remaining.is_empty() {
        tracing::warn!(
            target: "universe_gen::repair",
            remaining = report.dead_ends_remaining.len(),
            rounds = report.rounds,
            "repair.dead_ends.unresolved"
        );
    }
}

/// Prefers linking two dead ends together so one link fixes both.
fn sample_dead_end_partner(
    graph: &WarpGraph,
    sector: SectorId,
    dead_ends: &[SectorId],
    rng: &mut RandomStream,
) -> Option<SectorId> {
    for _ in 0..PARTNER_DRAWS {
        let &candidate = rng.pick(dead_ends)?;
        if candidate != sector && graph.degree(candidate) == 1 && !graph.is_linked(sector, candidate)
        {
            return Some(candidate);
        }
    }
    None
}
