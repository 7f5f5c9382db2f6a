use ebb_engine::{Arrival, Capability, EntityDesc, Rgba, SymbolTable, Touch, ZoneHandle, ZoneTemplate};
use rand::seq::SliceRandom;
use tracing::warn;

use super::{arrive_beside, EAST_WOODS, POOL, START};

const EXIT_TAG: &str = "west exit";
const SPLASHES: [&str; 2] = ["*shplut*", "*splort*"];

const TILES: &str = r"
****************
***********
****/////
*////*///
*/******
**/***       .,
*//**  / .  .,~,
<........ * ,~v~~,
*//**   //* ,~~~,
*/****  . ..,,~~,
*/*////*   ..,~,
*****/***    ,,
**********/   ,
*/
";

const TO_START: Capability = Capability::new("exit to the start", to_start);
const WHIRLPOOL: Capability = Capability::new("whirlpool", into_pool);
const PUDDLE: Capability = Capability::new("puddle", splash);

pub(crate) fn template() -> ZoneTemplate {
    ZoneTemplate::new(EAST_WOODS, TILES)
        .title("the east woods")
        .symbols(
            SymbolTable::new()
                .with('<', west_exit)
                .with('v', whirlpool)
                .with(',', puddle),
        )
        .on_enter(enter)
}

fn west_exit() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("exit")
            .tag(EXIT_TAG)
            .tint(Rgba::WHITE)
            .capability(TO_START),
    )
}

fn whirlpool() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("whirlpool")
            .tint(Rgba::rgb(64, 128, 255))
            .capability(WHIRLPOOL),
    )
}

fn puddle() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("grass")
            .tint(Rgba::rgb(64, 196, 255))
            .passable()
            .capability(PUDDLE),
    )
}

fn to_start(touch: &mut Touch<'_>) -> bool {
    touch.travel(START);
    true
}

fn into_pool(touch: &mut Touch<'_>) -> bool {
    touch.travel(POOL);
    true
}

fn splash(touch: &mut Touch<'_>) -> bool {
    if let Some(sound) = SPLASHES.choose(&mut rand::thread_rng()) {
        touch.say(*sound);
    }
    false
}

fn enter(zone: ZoneHandle, arrival: Arrival) {
    let Some(traveler) = arrival.traveler else {
        return;
    };
    if arrive_beside(&zone, &arrival, EXIT_TAG, 1).is_none() {
        warn!(zone = zone.id(), traveler = traveler.0, "arrival_unplaced");
    }
}
