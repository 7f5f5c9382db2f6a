use ebb_engine::{
    Arrival, Capability, EntityDesc, EntityId, Rgba, SymbolTable, Touch, ZoneHandle, ZoneTemplate,
};
use tracing::warn;

use super::things::{DOOR_TAG, PLAYER_TAG};
use super::{arrive_beside, EAST_WOODS, START};

const NPC_TAG: &str = "npc";
const STRANGER_TAG: &str = "npc 2";
const EXIT_TAG: &str = "east exit";

const TILES: &str = r"
   ##########**
   #        #.****
   #  1  hTnw.///***
 *.#        #..///***
...whTn     +.......E
...#        #...////*
*..#     hTnw..///***
...whTn     #///***
 *.#     @  #****
   ######w###
      /...../
       */./
         *
";

const TO_EAST_WOODS: Capability = Capability::new("exit to the east woods", to_east_woods);

pub(crate) fn template() -> ZoneTemplate {
    ZoneTemplate::new(START, TILES)
        .title("a start")
        .symbols(SymbolTable::new().with('1', npc).with('E', east_exit))
        .on_enter(enter)
}

fn npc() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("character")
            .tag(NPC_TAG)
            .tint(Rgba::WHITE)
            .layer(1),
    )
}

fn east_exit() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("exit")
            .tag(EXIT_TAG)
            .tint(Rgba::WHITE)
            .capability(TO_EAST_WOODS),
    )
}

fn to_east_woods(touch: &mut Touch<'_>) -> bool {
    touch.travel(EAST_WOODS);
    true
}

fn enter(zone: ZoneHandle, arrival: Arrival) {
    match arrival.traveler {
        None if arrival.first_visit => {
            let Some(player) = zone.entity(PLAYER_TAG) else {
                warn!(zone = zone.id(), "player_missing");
                return;
            };
            opening(&zone, player);
        }
        None => {}
        Some(traveler) => {
            if let Some(placed) = arrive_beside(&zone, &arrival, EXIT_TAG, -1) {
                zone.follow(placed);
            } else {
                warn!(zone = zone.id(), traveler = traveler.0, "arrival_unplaced");
            }
        }
    }
}

/// The first-visit cut-scene.
fn opening(zone: &ZoneHandle, player: EntityId) {
    zone.world().control(player);
    let (Some(npc), Some(door)) = (zone.entity(NPC_TAG), zone.entity(DOOR_TAG)) else {
        warn!(zone = zone.id(), "opening_cast_missing");
        return;
    };

    zone.follow(player);
    zone.wait(60);
    zone.say(npc, "hey, come here!");
    zone.walk_to(player, npc);
    zone.wait(20);
    zone.say(npc, "have you heard of the high elves?");
    zone.say(player, "no");
    zone.say(npc, "me neither");

    let stranger = zone.scene(|| {
        let doorway = zone.position(door)?;
        let stranger = zone.spawn(
            EntityDesc::new("character")
                .tag(STRANGER_TAG)
                .tint(Rgba::rgb(255, 0, 255)),
        );
        zone.set_image(door, "door-open");
        zone.set_blocking(door, false);
        let stranger = zone.place(stranger, doorway);
        zone.follow(stranger);
        zone.say(door, "*bang*");
        zone.wait(30);
        zone.step(stranger, -1, 0);
        zone.wait(30);
        zone.set_image(door, "door");
        zone.set_blocking(door, true);
        zone.wait(30);
        zone.say(stranger, "...greetings");
        zone.wait(10);
        zone.walk_to(stranger, npc);
        zone.wait(20);
        zone.say(stranger, "I have heard of the high elves");
        zone.follow(player);
        Some(stranger)
    });

    zone.wait(300);
    zone.say(npc, "They're a devious bunch");
    if let Some(stranger) = stranger {
        zone.say(stranger, "You don't know the half of it");
    }
}

#[cfg(test)]
mod tests {
    use ebb_engine::{Entity, GridPos};

    use super::*;
    use crate::app::content::things::global_symbols;

    fn entities() -> Vec<Entity> {
        template()
            .placements(&global_symbols())
            .into_iter()
            .enumerate()
            .map(|(index, (position, desc))| desc.build(EntityId(index as u64), position))
            .collect()
    }

    fn tagged(entities: &[Entity], tag: &str) -> Vec<GridPos> {
        entities
            .iter()
            .filter(|entity| entity.has_tag(tag))
            .map(Entity::position)
            .collect()
    }

    #[test]
    fn exit_and_door_sit_on_the_same_row() {
        let entities = entities();
        assert_eq!(tagged(&entities, EXIT_TAG), vec![GridPos::new(20, 4)]);
        assert_eq!(tagged(&entities, DOOR_TAG), vec![GridPos::new(12, 4)]);
    }

    #[test]
    fn map_places_one_player_and_one_npc() {
        let entities = entities();
        assert_eq!(tagged(&entities, PLAYER_TAG), vec![GridPos::new(9, 8)]);
        assert_eq!(tagged(&entities, NPC_TAG), vec![GridPos::new(6, 2)]);
    }
}
