use std::fmt;

use bitflags::bitflags;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::rng::RandomStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    HubStation,
    SpawnSite,
    Port,
    Planet,
}

impl FeatureKind {
    /// Most constrained categories first.
    pub const PLACEMENT_ORDER: [FeatureKind; 4] = [
        FeatureKind::HubStation,
        FeatureKind::SpawnSite,
        FeatureKind::Port,
        FeatureKind::Planet,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FeatureKind::HubStation => "hub station",
            FeatureKind::SpawnSite => "spawn site",
            FeatureKind::Port => "port",
            FeatureKind::Planet => "planet",
        }
    }

    /// Hard-count categories must hit their target exactly.
    pub fn is_hard_count(self) -> bool {
        matches!(self, FeatureKind::HubStation | FeatureKind::SpawnSite)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Commodities: u8 {
        const FUEL_ORE = 1;
        const ORGANICS = 1 << 1;
        const EQUIPMENT = 1 << 2;
    }
}

/// Trade archetype of a port. The code lists buy (B) or sell (S) for fuel
/// ore, organics and equipment in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortClass {
    Bbs,
    Bsb,
    Sbb,
    Ssb,
    Sbs,
    Bss,
    Sss,
    Bbb,
}

impl PortClass {
    pub const ALL: [PortClass; 8] = [
        PortClass::Bbs,
        PortClass::Bsb,
        PortClass::Sbb,
        PortClass::Ssb,
        PortClass::Sbs,
        PortClass::Bss,
        PortClass::Sss,
        PortClass::Bbb,
    ];

    // Mixed classes dominate; all-sell and all-buy ports are rare.
    const WEIGHTS: [u32; 8] = [14, 14, 14, 14, 14, 14, 8, 8];

    /// Classic class number, 1 through 8.
    pub fn number(self) -> u8 {
        match self {
            PortClass::Bbs => 1,
            PortClass::Bsb => 2,
            PortClass::Sbb => 3,
            PortClass::Ssb => 4,
            PortClass::Sbs => 5,
            PortClass::Bss => 6,
            PortClass::Sss => 7,
            PortClass::Bbb => 8,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            PortClass::Bbs => "BBS",
            PortClass::Bsb => "BSB",
            PortClass::Sbb => "SBB",
            PortClass::Ssb => "SSB",
            PortClass::Sbs => "SBS",
            PortClass::Bss => "BSS",
            PortClass::Sss => "SSS",
            PortClass::Bbb => "BBB",
        }
    }

    pub fn buys(self) -> Commodities {
        match self {
            PortClass::Bbs => Commodities::FUEL_ORE | Commodities::ORGANICS,
            PortClass::Bsb => Commodities::FUEL_ORE | Commodities::EQUIPMENT,
            PortClass::Sbb => Commodities::ORGANICS | Commodities::EQUIPMENT,
            PortClass::Ssb => Commodities::EQUIPMENT,
            PortClass::Sbs => Commodities::ORGANICS,
            PortClass::Bss => Commodities::FUEL_ORE,
            PortClass::Sss => Commodities::empty(),
            PortClass::Bbb => Commodities::all(),
        }
    }

    pub fn sells(self) -> Commodities {
        Commodities::all().difference(self.buys())
    }

    fn sample(rng: &mut RandomStream) -> Self {
        match WeightedIndex::new(Self::WEIGHTS) {
            Ok(dist) => Self::ALL[dist.sample(rng)],
            Err(_) => Self::ALL[0],
        }
    }
}

/// Per-commodity capacity a port starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommodityStock {
    pub fuel_ore: u32,
    pub organics: u32,
    pub equipment: u32,
}

const STOCK_MIN: u32 = 800;
const STOCK_MAX: u32 = 3200;
const STOCK_STEP: u32 = 10;

impl CommodityStock {
    fn sample(rng: &mut RandomStream) -> Self {
        let mut roll =
            || rng.range_inclusive(STOCK_MIN / STOCK_STEP, STOCK_MAX / STOCK_STEP) * STOCK_STEP;
        Self {
            fuel_ore: roll(),
            organics: roll(),
            equipment: roll(),
        }
    }

    pub fn get(&self, commodity: Commodities) -> Option<u32> {
        if commodity == Commodities::FUEL_ORE {
            Some(self.fuel_ore)
        } else if commodity == Commodities::ORGANICS {
            Some(self.organics)
        } else if commodity == Commodities::EQUIPMENT {
            Some(self.equipment)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub class: PortClass,
    pub stock: CommodityStock,
}

impl Port {
    pub fn sample(rng: &mut RandomStream) -> Self {
        let class = PortClass::sample(rng);
        let stock = CommodityStock::sample(rng);
        Self { class, stock }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HubStation {
    pub designation: String,
}

impl HubStation {
    /// `ordinal` counts from zero in placement order.
    pub fn numbered(ordinal: u32) -> Self {
        Self {
            designation: format!("Stardock {}", ordinal + 1),
        }
    }
}

const SPAWN_STRENGTH_MIN: u32 = 500;
const SPAWN_STRENGTH_MAX: u32 = 2500;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnSite {
    /// Baseline hostile fighter strength.
    pub strength: u32,
}

impl SpawnSite {
    pub fn sample(rng: &mut RandomStream) -> Self {
        Self {
            strength: rng.range_inclusive(SPAWN_STRENGTH_MIN, SPAWN_STRENGTH_MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanetClass {
    /// Earth type.
    M,
    /// Desert.
    K,
    /// Oceanic.
    O,
    /// Mountainous.
    L,
    /// Glacial.
    C,
    /// Volcanic.
    H,
    /// Gaseous.
    U,
}

impl PlanetClass {
    pub const ALL: [PlanetClass; 7] = [
        PlanetClass::M,
        PlanetClass::K,
        PlanetClass::O,
        PlanetClass::L,
        PlanetClass::C,
        PlanetClass::H,
        PlanetClass::U,
    ];

    const WEIGHTS: [u32; 7] = [30, 15, 15, 15, 10, 10, 5];

    fn sample(rng: &mut RandomStream) -> Self {
        match WeightedIndex::new(Self::WEIGHTS) {
            Ok(dist) => Self::ALL[dist.sample(rng)],
            Err(_) => Self::ALL[0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Planet {
    pub class: PlanetClass,
}

impl Planet {
    pub fn sample(rng: &mut RandomStream) -> Self {
        Self {
            class: PlanetClass::sample(rng),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectorFeature {
    Port(Port),
    HubStation(HubStation),
    SpawnSite(SpawnSite),
    Planet(Planet),
}

impl SectorFeature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            SectorFeature::Port(_) => FeatureKind::Port,
            SectorFeature::HubStation(_) => FeatureKind::HubStation,
            SectorFeature::SpawnSite(_) => FeatureKind::SpawnSite,
            SectorFeature::Planet(_) => FeatureKind::Planet,
        }
    }

    pub fn as_port(&self) -> Option<&Port> {
        match self {
            SectorFeature::Port(port) => Some(port),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buys_and_sells_partition_commodities() {
        for class in PortClass::ALL {
            let buys = class.buys();
            let sells = class.sells();
            assert!(buys.intersection(sells).is_empty(), "{class:?}");
            assert_eq!(buys | sells, Commodities::all(), "{class:?}");
        }
        assert_eq!(PortClass::Sss.sells(), Commodities::all());
        assert_eq!(PortClass::Bbb.sells(), Commodities::empty());
    }

    #[test]
    fn class_codes_match_trade_directions() {
        for class in PortClass::ALL {
            let code: Vec<char> = class.code().chars().collect();
            let order = [
                Commodities::FUEL_ORE,
                Commodities::ORGANICS,
                Commodities::EQUIPMENT,
            ];
            for (letter, commodity) in code.iter().zip(order) {
                let expected = if class.buys().contains(commodity) { 'B' } else { 'S' };
                assert_eq!(*letter, expected, "{}", class.code());
            }
        }
    }

    #[test]
    fn class_numbers_are_distinct() {
        let mut numbers: Vec<u8> = PortClass::ALL.iter().map(|c| c.number()).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn sampled_port_stock_is_in_range() {
        let mut rng = RandomStream::from_seed(11);
        for _ in 0..200 {
            let port = Port::sample(&mut rng);
            for value in [port.stock.fuel_ore, port.stock.organics, port.stock.equipment] {
                assert!((STOCK_MIN..=STOCK_MAX).contains(&value));
                assert_eq!(value % STOCK_STEP, 0);
            }
        }
    }

    #[test]
    fn hub_designations_count_from_one() {
        assert_eq!(HubStation::numbered(0).designation, "Stardock 1");
        assert_eq!(HubStation::numbered(2).designation, "Stardock 3");
    }

    #[test]
    fn feature_kind_reports_variant() {
        let mut rng = RandomStream::from_seed(3);
        let feature = SectorFeature::SpawnSite(SpawnSite::sample(&mut rng));
        assert_eq!(feature.kind(), FeatureKind::SpawnSite);
        assert!(feature.as_port().is_none());
        assert_eq!(FeatureKind::Port.to_string(), "port");
    }
}
