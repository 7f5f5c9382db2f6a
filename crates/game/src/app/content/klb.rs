use ebb_engine::{Arrival, EntityDesc, EntityId, GridPos, Rgba, SymbolTable, ZoneHandle, ZoneTemplate};
use tracing::warn;

use super::KLB;

const HEART_PINK: Rgba = Rgba::rgb(255, 105, 180);
const HEART_RED: Rgba = Rgba::rgb(255, 0, 0);
const SPIRAL_HEARTS: usize = 200;
const SPIRAL_STEP: f64 = 0.3;

const TILES: &str = r"
      ####    ####
     #    #  #    #
    #  k   ##  b   #
    #              #
     #            #
      #          #
       #   p    #
        #      #
         #    #
          #  #
           ##
";

pub(crate) fn template() -> ZoneTemplate {
    ZoneTemplate::new(KLB, TILES)
        .title("klb")
        .symbols(
            SymbolTable::new()
                .with('#', heart_wall)
                .with('k', kit)
                .with('b', birb)
                .with('p', point),
        )
        .on_enter(enter)
}

fn heart_wall() -> Option<EntityDesc> {
    Some(EntityDesc::new("heart").tint(HEART_PINK))
}

fn kit() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("kit")
            .tag("kit")
            .mirrored()
            .tint(Rgba::rgb(204, 85, 0)),
    )
}

fn birb() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("birb")
            .tag("birb")
            .tint(Rgba::rgb(249, 246, 238)),
    )
}

fn point() -> Option<EntityDesc> {
    Some(EntityDesc::new("empty").tag("point").passable())
}

fn enter(zone: ZoneHandle, _arrival: Arrival) {
    let (Some(point), Some(birb), Some(kit)) =
        (zone.entity("point"), zone.entity("birb"), zone.entity("kit"))
    else {
        warn!(zone = zone.id(), "klb_cast_missing");
        return;
    };

    zone.follow(point);
    zone.wait(60);
    zone.walk_to(birb, point);
    zone.walk_to(kit, point);
    zone.step(kit, 1, 0);
    zone.wait(60);
    zone.say(kit, "*kees*");
    sprout_above(&zone, kit);
    zone.wait(60);
    zone.say(birb, "*smoch*");
    sprout_above(&zone, birb);
    zone.wait(30);

    let Some(center) = zone.position(point) else {
        return;
    };
    for (index, offset) in spiral_offsets(SPIRAL_HEARTS).into_iter().enumerate() {
        let tint = if index % 2 == 0 {
            Rgba::WHITE
        } else {
            HEART_RED
        };
        zone.spawn_at(
            EntityDesc::new("heart").tag("heart").tint(tint),
            center.offset(offset.x, offset.y),
        );
    }
}

fn sprout_above(zone: &ZoneHandle, entity: EntityId) {
    let Some(at) = zone.position(entity) else {
        return;
    };
    let sprout = zone.spawn(EntityDesc::new("sprouts").tag("heart").tint(HEART_RED));
    zone.place(sprout, at.offset(0, -1));
}

/// Cells of an outward spiral, angle and radius both growing by
/// `SPIRAL_STEP` per heart. Offsets truncate toward zero.
fn spiral_offsets(count: usize) -> Vec<GridPos> {
    let mut offsets = Vec::with_capacity(count);
    let (mut angle, mut radius) = (0.0f64, 0.0f64);
    for _ in 0..count {
        let x = radius * angle.cos();
        let y = radius * angle.sin();
        offsets.push(GridPos::new(x as i32, y as i32));
        angle += SPIRAL_STEP;
        radius += SPIRAL_STEP;
    }
    offsets
}
