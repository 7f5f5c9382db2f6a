//! Symbols every zone understands unless it overrides them.

use ebb_engine::{Action, Capability, EntityDesc, Rgba, SymbolTable, Touch};
use rand::Rng;

pub(crate) const PLAYER_TAG: &str = "player";
pub(crate) const DOOR_TAG: &str = "east door";

const BRICK: Rgba = Rgba::rgb(165, 42, 42);
const OXBLOOD: Rgba = Rgba::rgb(145, 22, 22);

pub(crate) const DOOR: Capability = Capability::new("door", door_touch);
pub(crate) const TABLE: Capability = Capability::new("table", table_touch);

pub(crate) fn global_symbols() -> SymbolTable {
    SymbolTable::new()
        .with('@', player)
        .with('#', wood_wall)
        .with('.', grass)
        .with('*', tree)
        .with('/', hideable_tree)
        .with('+', door)
        .with('T', table)
        .with('h', chair_right)
        .with('n', chair_left)
        .with('w', window_wall)
        .with('~', water)
}

fn player() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("character")
            .tag(PLAYER_TAG)
            .tint(Rgba::rgb(255, 255, 0))
            .layer(1),
    )
}

fn wood_wall() -> Option<EntityDesc> {
    Some(EntityDesc::new("woodwall").tint(BRICK))
}

fn grass() -> Option<EntityDesc> {
    Some(EntityDesc::new("grass").passable())
}

fn tree() -> Option<EntityDesc> {
    Some(EntityDesc::new("tree"))
}

/// Drawn over whoever walks behind it.
fn hideable_tree() -> Option<EntityDesc> {
    Some(EntityDesc::new("tree-hideable").passable().layer(10))
}

fn door() -> Option<EntityDesc> {
    Some(
        EntityDesc::new("door")
            .tag(DOOR_TAG)
            .tint(OXBLOOD)
            .capability(DOOR),
    )
}

fn table() -> Option<EntityDesc> {
    let image = if rand::thread_rng().gen_bool(0.5) {
        "table-food"
    } else {
        "table"
    };
    Some(EntityDesc::new(image).tint(OXBLOOD).capability(TABLE))
}

fn chair_right() -> Option<EntityDesc> {
    Some(EntityDesc::new("chair-right").tint(OXBLOOD).passable())
}

fn chair_left() -> Option<EntityDesc> {
    Some(EntityDesc::new("chair-left").tint(OXBLOOD).passable())
}

fn window_wall() -> Option<EntityDesc> {
    Some(EntityDesc::new("woodwallwindow").tint(BRICK))
}

fn water() -> Option<EntityDesc> {
    Some(EntityDesc::new("water").tint(Rgba::rgb(0, 64, 255)).passable())
}

/// Interact toggles the door. A closed door thumps on the first bump and
/// swings open when bumped again.
fn door_touch(touch: &mut Touch<'_>) -> bool {
    let closed = touch.target().blocking();
    if touch.is_interact() {
        touch.target_mut().set_blocking(!closed);
        if closed {
            touch.set_image_later("door-open");
        } else {
            touch.set_image_later("door");
            touch.say("*click*");
        }
        return true;
    }
    if !closed {
        return false;
    }
    if touch.touched_before() {
        touch.target_mut().set_blocking(false);
        touch.set_image_later("door-open");
        return false;
    }
    touch.say("*thump*");
    true
}

/// A laid table tempts on the first bump and is eaten on the next one, or
/// straight away on interact. Tables always block.
fn table_touch(touch: &mut Touch<'_>) -> bool {
    if touch.target().image() != "table-food" {
        return true;
    }
    if touch.action() == Action::Move && !touch.touched_before() {
        touch.actor_says("food!");
        return true;
    }
    touch.actor_says("*snarf*");
    touch.target_mut().set_image("table");
    true
}
