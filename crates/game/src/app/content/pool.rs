use ebb_engine::{Arrival, Capability, EntityDesc, Rgba, SymbolTable, Touch, ZoneHandle, ZoneTemplate};
use tracing::warn;

use super::{EAST_WOODS, POOL};

const EXIT_TAG: &str = "up exit";

const TILES: &str = r"
 #########
 #~~~~~~~#
#~~~~~~~~~#
#~~~~~~^~~~#
 #~~~~~~~~##
 #~~~~~~~~~~#
 #~~~#####~~#
  #~#     #~~#
 ##~###### ##
#~~~~~~~f~#
 ##~~#####
   #~#
    #
";

const TO_EAST_WOODS: Capability = Capability::new("exit to the east woods", to_east_woods);
const FROGE: Capability = Capability::new("froge", ribbit);

pub(crate) fn template() -> ZoneTemplate {
    ZoneTemplate::new(POOL, TILES)
        .title("pool of whirling")
        .symbols(
            SymbolTable::new()
                .with('^', up_exit)
                .with('#', ground_wall)
                .with('f', froge),
        )
        .on_enter(enter)
}

fn up_exit() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("exit")
            .tag(EXIT_TAG)
            .tint(Rgba::rgb(64, 128, 255))
            .capability(TO_EAST_WOODS),
    )
}

fn ground_wall() -> Option<EntityDesc> {
    Some(EntityDesc::new("groundwall").tint(Rgba::rgb(96, 60, 12)))
}

fn froge() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("froge")
            .tint(Rgba::rgb(64, 255, 160))
            .capability(FROGE),
    )
}

fn to_east_woods(touch: &mut Touch<'_>) -> bool {
    touch.travel(EAST_WOODS);
    true
}

fn ribbit(touch: &mut Touch<'_>) -> bool {
    touch.say("*ribbt*");
    true
}

/// Swimmers always surface just left of the up exit, with the camera on them.
fn enter(zone: ZoneHandle, arrival: Arrival) {
    let (Some(previous), Some(traveler)) = (arrival.previous.as_ref(), arrival.traveler) else {
        return;
    };
    zone.follow(traveler);
    let Some(exit) = zone.entity(EXIT_TAG).and_then(|exit| zone.position(exit)) else {
        warn!(zone = zone.id(), "exit_missing");
        return;
    };
    if zone.hand_off(traveler, previous, exit.offset(-1, 0)).is_none() {
        warn!(zone = zone.id(), traveler = traveler.0, "arrival_unplaced");
    }
}
