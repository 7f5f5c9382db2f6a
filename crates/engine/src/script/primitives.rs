//! Blocking-looking script calls.
//!
//! Every primitive submits a poll body to the owning scheduler and parks the
//! calling script thread until that body completes on the step-polling
//! thread. Nothing here mutates zone or world state directly.

use std::sync::Arc;

use tracing::{debug, info};

use super::scheduler::Submitter;
use crate::world::{WorldError, WorldHandle, WorldState};
use crate::zone::entity::{Action, Entity, EntityDesc, EntityId, GridPos, Speech};
use crate::zone::ZoneState;

pub const SAY_BASE_TICKS: u32 = 20;
pub const SAY_TICKS_PER_CHAR: u32 = 5;
/// Polls between pursuit moves in [`ZoneHandle::walk_to`].
pub const WALK_PACE_TICKS: u32 = 30;

pub fn say_duration(text: &str) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    SAY_BASE_TICKS.saturating_add(SAY_TICKS_PER_CHAR.saturating_mul(chars))
}

/// Shows `text` over `speaker` for [`say_duration`] polls, then clears it.
pub(crate) fn say_task(
    speaker: EntityId,
    text: String,
) -> impl FnMut(&mut ZoneState) -> Option<()> + Send + 'static {
    let duration = say_duration(&text);
    let mut ticks = 0u32;
    move |state: &mut ZoneState| {
        ticks += 1;
        let Some(entity) = state.entity_mut(speaker) else {
            return Some(());
        };
        if ticks >= duration {
            entity.set_speech(None);
            return Some(());
        }
        entity.set_speech(Some(Speech {
            text: text.clone(),
            remaining_ticks: duration - ticks,
        }));
        None
    }
}

/// Script-side view of one zone. Cheap to clone and safe to move onto any
/// script thread.
#[derive(Clone)]
pub struct ZoneHandle {
    zone: Arc<str>,
    submitter: Submitter<ZoneState>,
    world: WorldHandle,
}

impl ZoneHandle {
    pub(crate) fn new(zone: Arc<str>, submitter: Submitter<ZoneState>, world: WorldHandle) -> Self {
        Self {
            zone,
            submitter,
            world,
        }
    }

    pub fn id(&self) -> &str {
        &self.zone
    }

    pub fn world(&self) -> &WorldHandle {
        &self.world
    }

    /// Runs `f` once on the step-polling thread and returns its result.
    pub fn run_exclusive<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&mut ZoneState) -> R + Send + 'static,
    {
        let mut f = Some(f);
        self.submitter
            .call(move |state: &mut ZoneState| f.take().map(|f| f(state)))
    }

    /// Returns after `ticks` steps of this zone.
    pub fn wait(&self, ticks: u32) {
        let mut elapsed = 0u32;
        self.submitter.call(move |_state: &mut ZoneState| {
            elapsed += 1;
            (elapsed >= ticks).then_some(())
        });
    }

    pub fn say(&self, speaker: EntityId, text: impl Into<String>) {
        self.submitter.call(say_task(speaker, text.into()));
    }

    /// Moves `mover` one cell per step toward `target`. `false` when the way
    /// is blocked or the mover is gone.
    pub fn go_to(&self, mover: EntityId, target: GridPos) -> bool {
        self.submitter
            .call(move |state: &mut ZoneState| advance(state, mover, target))
    }

    /// Paced pursuit of `target`'s current cell, one move every
    /// [`WALK_PACE_TICKS`] polls.
    pub fn walk_to(&self, mover: EntityId, target: EntityId) -> bool {
        let mut polls = 0u32;
        self.submitter.call(move |state: &mut ZoneState| {
            polls += 1;
            if polls < WALK_PACE_TICKS {
                return None;
            }
            polls = 0;
            match state.entity(target).map(Entity::position) {
                Some(goal) => advance(state, mover, goal),
                None => Some(false),
            }
        })
    }

    /// One resolver-checked step. Returns whether the entity moved.
    pub fn step(&self, mover: EntityId, dx: i32, dy: i32) -> bool {
        self.run_exclusive(move |state| state.step_entity(mover, dx, dy, Action::Move))
    }

    pub fn set_image(&self, entity: EntityId, image: impl Into<String>) {
        let image = image.into();
        self.run_exclusive(move |state| {
            if let Some(entity) = state.entity_mut(entity) {
                entity.set_image(image);
            }
        });
    }

    pub fn set_blocking(&self, entity: EntityId, blocking: bool) {
        self.run_exclusive(move |state| {
            if let Some(entity) = state.entity_mut(entity) {
                entity.set_blocking(blocking);
            }
        });
    }

    pub fn freeze(&self) {
        self.run_exclusive(|state| state.set_locked(true));
    }

    pub fn thaw(&self) {
        self.run_exclusive(|state| state.set_locked(false));
    }

    /// Runs `body` on the calling script thread with input locked.
    pub fn scene<R>(&self, body: impl FnOnce() -> R) -> R {
        self.freeze();
        let result = body();
        self.thaw();
        result
    }

    pub fn entity(&self, tag: &str) -> Option<EntityId> {
        let tag = tag.to_string();
        self.run_exclusive(move |state| state.find_tagged(&tag))
    }

    /// Builds a detached entity with a fresh id; see [`ZoneHandle::place`].
    pub fn spawn(&self, desc: EntityDesc) -> Entity {
        self.run_exclusive(move |state| state.allocate(desc))
    }

    pub fn place(&self, entity: Entity, at: GridPos) -> EntityId {
        self.run_exclusive(move |state| state.insert(entity, at))
    }

    pub fn spawn_at(&self, desc: EntityDesc, at: GridPos) -> EntityId {
        self.run_exclusive(move |state| {
            let entity = state.allocate(desc);
            state.insert(entity, at)
        })
    }

    pub fn remove(&self, tag: &str) -> Option<Entity> {
        let tag = tag.to_string();
        self.run_exclusive(move |state| {
            let id = state.find_tagged(&tag)?;
            state.remove(id)
        })
    }

    pub fn take(&self, entity: EntityId) -> Option<Entity> {
        self.run_exclusive(move |state| state.remove(entity))
    }

    pub fn follow(&self, entity: EntityId) {
        self.run_exclusive(move |state| state.set_camera_target(Some(entity)));
    }

    pub fn position(&self, entity: EntityId) -> Option<GridPos> {
        self.run_exclusive(move |state| state.entity(entity).map(Entity::position))
    }

    pub fn tag_of(&self, entity: EntityId) -> Option<String> {
        self.run_exclusive(move |state| {
            state
                .entity(entity)
                .and_then(Entity::tag)
                .map(str::to_owned)
        })
    }

    /// Where an entity with `tag` stood when it last left this zone.
    pub fn previous_position(&self, tag: &str) -> Option<GridPos> {
        let tag = tag.to_string();
        self.run_exclusive(move |state| state.departed_position(&tag))
    }

    pub(crate) fn record_departure(&self, traveler: EntityId) {
        self.run_exclusive(move |state| {
            let Some(entity) = state.entity(traveler) else {
                return;
            };
            if let Some(tag) = entity.tag().map(str::to_owned) {
                let position = entity.position();
                state.record_departure(&tag, position);
            }
        });
    }

    /// Moves `traveler` out of `from` and into this zone at `at`. Each side
    /// runs on its own zone's step thread.
    pub fn hand_off(&self, traveler: EntityId, from: &ZoneHandle, at: GridPos) -> Option<EntityId> {
        let entity = from.take(traveler)?;
        let id = self.place(entity, at);
        info!(from = from.id(), to = self.id(), entity = id.0, "entity_handed_off");
        Some(id)
    }

    pub fn travel(&self, zone: &str, traveler: EntityId) -> Result<(), WorldError> {
        self.world.enter_zone(zone, Some(traveler))
    }
}

/// One pursuit move toward `goal`: `Some(false)` when blocked, `Some(true)`
/// once within a cell of it, `None` to keep going.
fn advance(state: &mut ZoneState, mover: EntityId, goal: GridPos) -> Option<bool> {
    let Some(from) = state.entity(mover).map(Entity::position) else {
        return Some(false);
    };
    let next = from.step_toward(goal);
    if !state.move_entity(mover, next, Action::Move) {
        return Some(false);
    }
    next.within_one(goal).then_some(true)
}

impl WorldHandle {
    /// Loads `zone` on the world step thread and makes it current.
    ///
    /// Returns once the load is done; the leave and enter hooks run afterwards
    /// on their own script thread.
    pub fn enter_zone(&self, zone: &str, traveler: Option<EntityId>) -> Result<(), WorldError> {
        let zone = zone.to_string();
        let mut request = Some((zone, traveler));
        self.submitter().call(move |world: &mut WorldState| {
            request
                .take()
                .map(|(zone, traveler)| world.enter_zone(&zone, traveler))
        })
    }

    /// Fire-and-forget form of [`WorldHandle::enter_zone`], safe to use from
    /// inside a poll.
    pub fn request_enter(&self, zone: impl Into<String>, traveler: Option<EntityId>) {
        let zone = zone.into();
        self.submitter().spawn(move |world: &mut WorldState| {
            // Failures are already kept as the world's fatal error.
            if let Err(err) = world.enter_zone(&zone, traveler) {
                debug!(zone = %zone, error = %err, "requested_enter_failed");
            }
            Some(())
        });
    }

    /// Hands player input to `entity`, wherever it lives.
    pub fn control(&self, entity: EntityId) {
        self.run_exclusive(move |world| world.set_controlled(Some(entity)));
    }

    pub fn activate(&self, zone: &str) {
        let zone = zone.to_string();
        self.run_exclusive(move |world| world.activate(&zone));
    }

    pub fn deactivate(&self, zone: &str) {
        let zone = zone.to_string();
        self.run_exclusive(move |world| world.deactivate(&zone));
    }

    pub fn zone(&self, zone: &str) -> Option<ZoneHandle> {
        let zone = zone.to_string();
        self.run_exclusive(move |world| world.zone(&zone).map(|zone| zone.handle()))
    }

    pub fn current_zone(&self) -> Option<String> {
        self.run_exclusive(|world| world.current_zone().map(str::to_owned))
    }

    pub fn run_exclusive<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&mut WorldState) -> R + Send + 'static,
    {
        let mut f = Some(f);
        self.submitter()
            .call(move |world: &mut WorldState| f.take().map(|f| f(world)))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::zone::template::SymbolTable;
    use crate::zone::test_support::{detached_zone, wait_for_pending};
    use crate::zone::Zone;

    fn hero() -> Option<EntityDesc> {
        Some(EntityDesc::new("character").tag("hero"))
    }

    fn npc() -> Option<EntityDesc> {
        Some(EntityDesc::new("character").tag("npc"))
    }

    fn wall() -> Option<EntityDesc> {
        Some(EntityDesc::new("woodwall"))
    }

    fn door() -> Option<EntityDesc> {
        Some(EntityDesc::new("door").tag("door"))
    }

    fn symbols() -> SymbolTable {
        SymbolTable::new()
            .with('h', hero)
            .with('n', npc)
            .with('#', wall)
            .with('d', door)
    }

    fn tagged(zone: &Zone, tag: &str) -> EntityId {
        zone.state().find_tagged(tag).expect("tagged entity")
    }

    fn position(zone: &Zone, id: EntityId) -> GridPos {
        zone.state().entity(id).map(Entity::position).expect("entity present")
    }

    /// Steps until the single in-flight primitive completes and returns how
    /// many steps that took.
    fn steps_until_idle(zone: &mut Zone, limit: u32) -> u32 {
        if zone.active_tasks() == 0 {
            wait_for_pending(zone, 1);
        }
        for taken in 1..=limit {
            zone.step();
            if zone.active_tasks() == 0 {
                return taken;
            }
        }
        panic!("primitive still active after {limit} steps");
    }

    fn speech(zone: &Zone, id: EntityId) -> Option<String> {
        zone.state()
            .entity(id)
            .and_then(Entity::speech_text)
            .map(str::to_owned)
    }

    #[test]
    fn say_clears_after_base_plus_per_char_steps() {
        let mut zone = detached_zone("\nh\n", symbols());
        let hero = tagged(&zone, "hero");
        zone.state().handle().submitter.spawn(say_task(hero, "hi".to_string()));
        assert_eq!(say_duration("hi"), 30);

        for step in 1..30 {
            zone.step();
            assert_eq!(speech(&zone, hero).as_deref(), Some("hi"), "step {step}");
        }
        zone.step();
        assert_eq!(speech(&zone, hero), None);
        assert_eq!(zone.active_tasks(), 0);
    }

    #[test]
    fn say_blocks_the_script_until_cleared() {
        let mut zone = detached_zone("\nh\n", symbols());
        let hero = tagged(&zone, "hero");
        let handle = zone.handle();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            handle.say(hero, "hey");
            done_tx.send(()).expect("report");
        });

        assert_eq!(steps_until_idle(&mut zone, 100), say_duration("hey"));
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
    }

    #[test]
    fn wait_completes_after_requested_steps() {
        let mut zone = detached_zone("\n", SymbolTable::new());
        let handle = zone.handle();
        thread::spawn(move || handle.wait(60));
        assert_eq!(steps_until_idle(&mut zone, 100), 60);
    }

    #[test]
    fn go_to_stops_within_one_cell() {
        let mut zone = detached_zone("\nh\n", symbols());
        let hero = tagged(&zone, "hero");
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let reached = handle.go_to(hero, GridPos::new(4, 2));
            result_tx.send(reached).expect("report");
        });

        assert_eq!(steps_until_idle(&mut zone, 20), 3);
        let reached = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert!(reached);
        assert_eq!(position(&zone, hero), GridPos::new(3, 2));
    }

    #[test]
    fn go_to_reports_blocked_path() {
        let mut zone = detached_zone("\nh #\n", symbols());
        let hero = tagged(&zone, "hero");
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let reached = handle.go_to(hero, GridPos::new(6, 0));
            result_tx.send(reached).expect("report");
        });

        steps_until_idle(&mut zone, 20);
        let reached = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert!(!reached);
        assert_eq!(position(&zone, hero), GridPos::new(1, 0));
    }

    #[test]
    fn walk_to_only_moves_every_pace_interval() {
        let mut zone = detached_zone("\nh    n\n", symbols());
        let hero = tagged(&zone, "hero");
        let npc = tagged(&zone, "npc");
        let handle = zone.handle();
        thread::spawn(move || handle.walk_to(hero, npc));

        wait_for_pending(&zone, 1);
        for _ in 0..WALK_PACE_TICKS - 1 {
            zone.step();
        }
        assert_eq!(position(&zone, hero), GridPos::new(0, 0));
        zone.step();
        assert_eq!(position(&zone, hero), GridPos::new(1, 0));

        let taken = steps_until_idle(&mut zone, WALK_PACE_TICKS * 10);
        assert_eq!(taken, WALK_PACE_TICKS * 3);
        assert_eq!(position(&zone, hero), GridPos::new(4, 0));
    }

    #[test]
    fn walk_to_follows_a_moving_target() {
        let mut zone = detached_zone("\nh  n\n", symbols());
        let hero = tagged(&zone, "hero");
        let npc = tagged(&zone, "npc");
        let handle = zone.handle();
        thread::spawn(move || handle.walk_to(hero, npc));

        wait_for_pending(&zone, 1);
        for _ in 0..WALK_PACE_TICKS {
            zone.step();
        }
        zone.state_mut()
            .entity_mut(npc)
            .expect("npc")
            .set_position(GridPos::new(1, 3));
        steps_until_idle(&mut zone, WALK_PACE_TICKS * 10);
        assert!(position(&zone, hero).within_one(GridPos::new(1, 3)));
    }

    #[test]
    fn run_exclusive_runs_once_and_returns_its_value() {
        let mut zone = detached_zone("\nhn\n", symbols());
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let count = handle.run_exclusive(|state| state.entities().len());
            result_tx.send(count).expect("report");
        });

        assert_eq!(steps_until_idle(&mut zone, 5), 1);
        let count = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert_eq!(count, 2);
    }

    #[test]
    fn scene_locks_input_for_its_body() {
        let mut zone = detached_zone("\nh\n", symbols());
        let handle = zone.handle();
        let (inside_tx, inside_rx) = crossbeam_channel::bounded(1);
        let (finish_tx, finish_rx) = crossbeam_channel::bounded::<()>(1);
        thread::spawn(move || {
            let body_handle = handle.clone();
            handle.scene(move || {
                inside_tx.send(()).expect("report");
                finish_rx.recv().expect("finish");
                body_handle.wait(1);
            });
        });

        steps_until_idle(&mut zone, 5);
        assert!(zone.state().is_locked());
        inside_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("scene body started");

        finish_tx.send(()).expect("release body");
        steps_until_idle(&mut zone, 5);
        assert!(zone.state().is_locked());
        steps_until_idle(&mut zone, 5);
        assert!(!zone.state().is_locked());
    }

    #[test]
    fn opening_a_door_lets_the_next_step_through() {
        let mut zone = detached_zone("\nhd\n", symbols());
        let hero = tagged(&zone, "hero");
        let door = tagged(&zone, "door");
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let bumped = handle.step(hero, 1, 0);
            handle.set_blocking(door, false);
            handle.set_image(door, "door-open");
            let walked = handle.step(hero, 1, 0);
            handle.follow(hero);
            result_tx.send((bumped, walked)).expect("report");
        });

        for _ in 0..5 {
            assert_eq!(steps_until_idle(&mut zone, 5), 1);
        }
        let (bumped, walked) = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert!(!bumped);
        assert!(walked);
        assert_eq!(position(&zone, hero), GridPos::new(1, 0));
        let door = zone.state().entity(door).expect("door present");
        assert_eq!(door.image(), "door-open");
        assert!(!door.blocking());
        assert_eq!(zone.state().camera_target(), Some(hero));
    }

    #[test]
    fn spawned_entities_join_the_zone_when_placed() {
        let mut zone = detached_zone("\n", SymbolTable::new());
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let entity = handle.spawn(EntityDesc::new("heart").tag("heart"));
            let id = handle.place(entity, GridPos::new(2, 5));
            result_tx.send(id).expect("report");
        });

        steps_until_idle(&mut zone, 5);
        steps_until_idle(&mut zone, 5);
        let id = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert_eq!(position(&zone, id), GridPos::new(2, 5));
        assert_eq!(
            zone.state().entity(id).map(Entity::render_position),
            Some(GridPos::new(2, 5).to_render())
        );
    }

    #[test]
    fn missing_entities_make_primitives_complete_harmlessly() {
        let mut zone = detached_zone("\n", SymbolTable::new());
        let handle = zone.handle();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let found = handle.entity("nobody");
            let moved = handle.go_to(EntityId(999), GridPos::new(1, 1));
            result_tx.send((found, moved)).expect("report");
        });

        steps_until_idle(&mut zone, 5);
        steps_until_idle(&mut zone, 5);
        let (found, moved) = result_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("script released");
        assert_eq!(found, None);
        assert!(!moved);
    }
}
