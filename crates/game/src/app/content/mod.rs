mod east_woods;
mod klb;
mod pool;
mod start;
mod things;

use ebb_engine::{Arrival, EntityId, TemplateCatalog, WorldError, ZoneHandle};

pub(crate) const START: &str = "start";
pub(crate) const EAST_WOODS: &str = "east woods";
pub(crate) const POOL: &str = "pool";
pub(crate) const KLB: &str = "klb";

pub(crate) const DEFAULT_ZONE: &str = START;

pub(crate) fn catalog() -> Result<TemplateCatalog, WorldError> {
    TemplateCatalog::new(things::global_symbols())
        .with(start::template())?
        .with(east_woods::template())?
        .with(pool::template())?
        .with(klb::template())
}

/// Hands the arriving traveler over from the zone it left. It lands where it
/// last left this zone, or `dx` cells beside the exit tagged `exit_tag`.
fn arrive_beside(
    zone: &ZoneHandle,
    arrival: &Arrival,
    exit_tag: &str,
    dx: i32,
) -> Option<EntityId> {
    let previous = arrival.previous.as_ref()?;
    let traveler = arrival.traveler?;
    let remembered = previous
        .tag_of(traveler)
        .and_then(|tag| zone.previous_position(&tag));
    let at = match remembered {
        Some(at) => at,
        None => zone.position(zone.entity(exit_tag)?)?.offset(dx, 0),
    };
    zone.hand_off(traveler, previous, at)
}
