use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::script::{Scheduler, Submitter, ZoneHandle};
use crate::zone::entity::{Action, EntityId, EntityIdAllocator};
use crate::zone::template::{Arrival, EnterHook, LeaveHook, TemplateCatalog};
use crate::zone::{RenderFrame, Zone, ZoneSnapshot};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("unknown zone `{zone}`: no template is registered under that identifier")]
    UnknownZone { zone: String },
    #[error("zone `{zone}` is registered more than once")]
    DuplicateZone { zone: String },
    #[error("failed to spawn script thread `{name}`: {reason}")]
    ScriptThread { name: String, reason: String },
}

/// Script-side view of the world registry.
#[derive(Clone)]
pub struct WorldHandle {
    submitter: Submitter<WorldState>,
}

impl WorldHandle {
    pub(crate) fn submitter(&self) -> &Submitter<WorldState> {
        &self.submitter
    }

    /// A handle whose requests are dropped on submission.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let scheduler = Scheduler::new("world:detached");
        Self {
            submitter: scheduler.submitter(),
        }
    }
}

/// Zone registry and transition bookkeeping. Only the world step thread
/// mutates it.
pub struct WorldState {
    catalog: TemplateCatalog,
    zones: HashMap<String, Zone>,
    active: Vec<String>,
    current: Option<String>,
    controlled: Option<EntityId>,
    ids: Arc<EntityIdAllocator>,
    handle: WorldHandle,
    fatal: Option<WorldError>,
}

struct Transition {
    next: ZoneHandle,
    previous: Option<ZoneHandle>,
    leave: Option<LeaveHook>,
    enter: Option<EnterHook>,
    traveler: Option<EntityId>,
    first_visit: bool,
}

impl WorldState {
    /// Loads `zone`, instantiating it on first use, and makes it current.
    /// Hooks and hand-off run afterwards on a dedicated script thread.
    pub fn enter_zone(&mut self, zone: &str, traveler: Option<EntityId>) -> Result<(), WorldError> {
        let template = match self.catalog.get(zone) {
            Ok(template) => template,
            Err(err) => {
                error!(zone, error = %err, "zone_load_failed");
                self.fatal.get_or_insert_with(|| err.clone());
                return Err(err);
            }
        };

        if self.current.as_deref() == Some(zone) {
            debug!(zone, "zone_already_current");
            return Ok(());
        }

        let handle = self.handle.clone();
        let ids = Arc::clone(&self.ids);
        let entry = self
            .zones
            .entry(zone.to_string())
            .or_insert_with(|| Zone::new(Arc::clone(&template), handle, ids));
        let first_visit = entry.instantiate(self.catalog.fallback());
        let next = entry.handle();

        let previous_zone = self.current.as_ref().and_then(|id| self.zones.get(id));
        let transition = Transition {
            next,
            previous: previous_zone.map(Zone::handle),
            leave: previous_zone.and_then(|zone| zone.template().leave_hook()),
            enter: template.enter_hook(),
            traveler,
            first_visit,
        };

        info!(
            zone,
            from = self.current.as_deref().unwrap_or("-"),
            first_visit,
            traveler = traveler.map(|id| id.0),
            "zone_entered"
        );
        self.current = Some(zone.to_string());

        let world = self.handle.clone();
        spawn_script(format!("script:{zone}"), move || {
            run_transition(world, transition)
        })
    }

    pub fn activate(&mut self, zone: &str) {
        if !self.zones.contains_key(zone) {
            warn!(zone, "activate_unknown_zone");
            return;
        }
        if !self.active.iter().any(|active| active == zone) {
            self.active.push(zone.to_string());
            debug!(zone, "zone_activated");
        }
    }

    pub fn deactivate(&mut self, zone: &str) {
        if let Some(index) = self.active.iter().position(|active| active == zone) {
            self.active.remove(index);
            debug!(zone, "zone_deactivated");
        }
    }

    pub fn is_active(&self, zone: &str) -> bool {
        self.active.iter().any(|active| active == zone)
    }

    pub fn set_controlled(&mut self, entity: Option<EntityId>) {
        self.controlled = entity;
    }

    pub fn controlled(&self) -> Option<EntityId> {
        self.controlled
    }

    pub fn current_zone(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn zone(&self, zone: &str) -> Option<&Zone> {
        self.zones.get(zone)
    }

    pub fn zone_mut(&mut self, zone: &str) -> Option<&mut Zone> {
        self.zones.get_mut(zone)
    }

    /// The zone whose entity set holds `entity`, current zone first.
    pub fn zone_of(&self, entity: EntityId) -> Option<&str> {
        let current = self
            .current
            .as_deref()
            .filter(|zone| self.holds(zone, entity));
        current.or_else(|| {
            self.active
                .iter()
                .map(String::as_str)
                .find(|zone| self.holds(zone, entity))
        })
    }

    fn holds(&self, zone: &str, entity: EntityId) -> bool {
        self.zones
            .get(zone)
            .is_some_and(|zone| zone.state().contains(entity))
    }
}

fn run_transition(world: WorldHandle, transition: Transition) {
    let Transition {
        next,
        previous,
        leave,
        enter,
        traveler,
        first_visit,
    } = transition;

    if let (Some(previous), Some(leave)) = (&previous, leave) {
        leave(previous.clone(), next.clone(), traveler);
    }
    if let (Some(previous), Some(traveler)) = (&previous, traveler) {
        previous.record_departure(traveler);
    }

    world.activate(next.id());
    if let Some(enter) = enter {
        enter(
            next.clone(),
            Arrival {
                previous: previous.clone(),
                traveler,
                first_visit,
            },
        );
    }

    // The previous zone keeps stepping until the enter hook has taken the
    // traveler out of it.
    if let Some(previous) = previous {
        let zone = previous.id().to_string();
        world.run_exclusive(move |world| {
            if world.current_zone() != Some(zone.as_str()) {
                world.deactivate(&zone);
            }
        });
    }
}

pub(crate) fn spawn_script<F>(name: String, body: F) -> Result<(), WorldError>
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name.clone()).spawn(body) {
        Ok(_) => {
            debug!(script = %name, "script_started");
            Ok(())
        }
        Err(source) => Err(WorldError::ScriptThread {
            name,
            reason: source.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub current: Option<String>,
    pub controlled: Option<EntityId>,
    pub active: Vec<String>,
    pub zones: Vec<ZoneSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub active: usize,
    pub dropped: u64,
}

/// Owns every zone plus the world-level scheduler and steps them in order.
pub struct World {
    state: WorldState,
    scheduler: Scheduler<WorldState>,
}

impl World {
    pub fn new(catalog: TemplateCatalog) -> Self {
        let scheduler = Scheduler::new("world");
        let handle = WorldHandle {
            submitter: scheduler.submitter(),
        };
        Self {
            state: WorldState {
                catalog,
                zones: HashMap::new(),
                active: Vec::new(),
                current: None,
                controlled: None,
                ids: Arc::new(EntityIdAllocator::new()),
                handle,
                fatal: None,
            },
            scheduler,
        }
    }

    pub fn handle(&self) -> WorldHandle {
        self.state.handle.clone()
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.state.catalog
    }

    /// Loads the first zone. Runs on the stepping thread, so it must not go
    /// through the world scheduler.
    pub fn boot(&mut self, zone: &str) -> Result<(), WorldError> {
        self.state.enter_zone(zone, None)
    }

    /// One simulation tick: world tasks, then every active zone's tasks in
    /// activation order, then render convergence.
    pub fn step(&mut self) -> Result<(), WorldError> {
        if let Some(err) = &self.state.fatal {
            return Err(err.clone());
        }
        self.scheduler.step(&mut self.state);
        if let Some(err) = &self.state.fatal {
            return Err(err.clone());
        }

        for zone in &self.state.active {
            if let Some(zone) = self.state.zones.get_mut(zone) {
                zone.run_tasks();
            }
        }
        for zone in &self.state.active {
            if let Some(zone) = self.state.zones.get_mut(zone) {
                zone.state_mut().converge();
            }
        }
        Ok(())
    }

    /// Steps the controlled entity unless its zone is input-locked. Returns
    /// whether it moved.
    pub fn control_step(&mut self, dx: i32, dy: i32, action: Action) -> bool {
        let Some(entity) = self.state.controlled else {
            return false;
        };
        let Some(zone) = self.state.zone_of(entity).map(str::to_owned) else {
            return false;
        };
        let Some(zone) = self.state.zones.get_mut(&zone) else {
            return false;
        };
        if zone.state().is_locked() {
            return false;
        }
        zone.state_mut().step_entity(entity, dx, dy, action)
    }

    pub fn input_locked(&self) -> bool {
        self.state
            .controlled
            .and_then(|entity| self.state.zone_of(entity))
            .and_then(|zone| self.state.zones.get(zone))
            .map_or(true, |zone| zone.state().is_locked())
    }

    pub fn render_frame(&self) -> Option<RenderFrame> {
        let current = self.state.current.as_deref()?;
        self.state
            .zones
            .get(current)
            .map(|zone| zone.state().render_frame())
    }

    pub fn current_zone(&self) -> Option<&str> {
        self.state.current_zone()
    }

    pub fn active_zones(&self) -> &[String] {
        &self.state.active
    }

    pub fn controlled(&self) -> Option<EntityId> {
        self.state.controlled
    }

    /// Direct form of [`WorldHandle::control`] for the stepping thread.
    pub fn set_controlled(&mut self, entity: Option<EntityId>) {
        self.state.set_controlled(entity);
    }

    pub fn zone(&self, zone: &str) -> Option<&Zone> {
        self.state.zone(zone)
    }

    pub fn zone_mut(&mut self, zone: &str) -> Option<&mut Zone> {
        self.state.zone_mut(zone)
    }

    pub fn steps(&self) -> u64 {
        self.scheduler.steps()
    }

    pub fn task_counts(&self) -> TaskCounts {
        let mut counts = TaskCounts {
            active: self.scheduler.active_len(),
            dropped: self.scheduler.dropped_submissions(),
        };
        for zone in self.state.zones.values() {
            counts.active += zone.active_tasks();
            counts.dropped += zone.dropped_submissions();
        }
        counts
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let mut zones: Vec<_> = self.state.zones.values().map(Zone::snapshot).collect();
        zones.sort_by(|left, right| left.id.cmp(&right.id));
        WorldSnapshot {
            current: self.state.current.clone(),
            controlled: self.state.controlled,
            active: self.state.active.clone(),
            zones,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::zone::entity::{EntityDesc, GridPos};
    use crate::zone::template::{SymbolTable, ZoneTemplate};

    fn traveler() -> Option<EntityDesc> {
        Some(EntityDesc::new("character").tag("t"))
    }

    fn wall() -> Option<EntityDesc> {
        Some(EntityDesc::new("woodwall"))
    }

    /// Restores the traveler where it last left, else at (1, 1).
    fn arrive(zone: ZoneHandle, arrival: Arrival) {
        let (Some(previous), Some(traveler)) = (arrival.previous, arrival.traveler) else {
            return;
        };
        let at = previous
            .tag_of(traveler)
            .and_then(|tag| zone.previous_position(&tag))
            .unwrap_or(GridPos::new(1, 1));
        zone.hand_off(traveler, &previous, at);
    }

    fn catalog() -> TemplateCatalog {
        let fallback = SymbolTable::new().with('#', wall).with('t', traveler);
        TemplateCatalog::new(fallback)
            .with(ZoneTemplate::new("x", "\n####\n\n\n\n   t\n").on_enter(arrive))
            .and_then(|catalog| catalog.with(ZoneTemplate::new("y", "\n#\n").on_enter(arrive)))
            .expect("catalog")
    }

    fn step_until(world: &mut World, what: &str, done: impl Fn(&World) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(world) {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            world.step().expect("world step");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn find(world: &World, zone: &str, tag: &str) -> Option<(EntityId, GridPos)> {
        let state = world.zone(zone)?.state();
        let id = state.find_tagged(tag)?;
        state.entity(id).map(|entity| (id, entity.position()))
    }

    #[test]
    fn booting_an_unknown_zone_is_fatal() {
        let mut world = World::new(catalog());
        assert_eq!(
            world.boot("nowhere"),
            Err(WorldError::UnknownZone {
                zone: "nowhere".to_string()
            })
        );
        assert!(world.step().is_err());
    }

    #[test]
    fn travel_request_to_unknown_zone_stops_the_world() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        world.handle().request_enter("nowhere", None);
        assert!(matches!(
            world.step(),
            Err(WorldError::UnknownZone { zone }) if zone == "nowhere"
        ));
    }

    #[test]
    fn boot_activates_the_default_zone() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        assert_eq!(world.current_zone(), Some("x"));
        step_until(&mut world, "activation", |world| {
            world.active_zones() == ["x".to_string()]
        });
        assert_eq!(world.zone("x").map(|zone| zone.state().entities().len()), Some(5));
    }

    #[test]
    fn traveler_is_restored_to_its_departure_cell() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        step_until(&mut world, "x active", |world| world.active_zones().len() == 1);
        let (traveler, start) = find(&world, "x", "t").expect("traveler in x");
        assert_eq!(start, GridPos::new(3, 4));
        let entities_in_x = world.zone("x").map(|zone| zone.state().entities().len());

        world.handle().request_enter("y", Some(traveler));
        step_until(&mut world, "hand-off to y", |world| {
            find(world, "y", "t").is_some() && world.active_zones() == ["y".to_string()]
        });
        assert_eq!(find(&world, "y", "t"), Some((traveler, GridPos::new(1, 1))));
        assert!(find(&world, "x", "t").is_none());

        world
            .zone_mut("y")
            .and_then(|zone| zone.state_mut().entity_mut(traveler))
            .expect("traveler in y")
            .set_position(GridPos::new(2, 2));

        world.handle().request_enter("x", Some(traveler));
        step_until(&mut world, "hand-off back to x", |world| {
            find(world, "x", "t").is_some()
        });
        assert_eq!(find(&world, "x", "t"), Some((traveler, GridPos::new(3, 4))));
        assert_eq!(
            world.zone("x").map(|zone| zone.state().entities().len()),
            entities_in_x
        );
        assert_eq!(
            world
                .zone("y")
                .and_then(|zone| zone.state().departed_position("t")),
            Some(GridPos::new(2, 2))
        );
    }

    static VISITS: Mutex<Vec<(String, bool)>> = Mutex::new(Vec::new());

    fn note_visit(zone: ZoneHandle, arrival: Arrival) {
        VISITS
            .lock()
            .expect("visits lock")
            .push((zone.id().to_string(), arrival.first_visit));
        arrive(zone, arrival);
    }

    #[test]
    fn revisits_skip_factories_and_say_so() {
        let fallback = SymbolTable::new().with('#', wall).with('t', traveler);
        let catalog = TemplateCatalog::new(fallback)
            .with(ZoneTemplate::new("home", "\nt##\n").on_enter(note_visit))
            .and_then(|catalog| catalog.with(ZoneTemplate::new("away", "\n").on_enter(note_visit)))
            .expect("catalog");
        let mut world = World::new(catalog);
        world.boot("home").expect("boot");
        step_until(&mut world, "home active", |world| world.active_zones().len() == 1);
        let (traveler, _) = find(&world, "home", "t").expect("traveler");

        world.handle().request_enter("away", Some(traveler));
        step_until(&mut world, "arrival away", |world| find(world, "away", "t").is_some());
        world.handle().request_enter("home", Some(traveler));
        step_until(&mut world, "arrival home", |world| find(world, "home", "t").is_some());

        assert_eq!(
            world.zone("home").map(|zone| zone.state().entities().len()),
            Some(3)
        );
        let visits = VISITS.lock().expect("visits lock").clone();
        assert_eq!(
            visits,
            vec![
                ("home".to_string(), true),
                ("away".to_string(), true),
                ("home".to_string(), false),
            ]
        );
    }

    static HOOK_LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn log_enter(zone: ZoneHandle, arrival: Arrival) {
        HOOK_LOG
            .lock()
            .expect("hook log lock")
            .push(format!("enter {} first={}", zone.id(), arrival.first_visit));
        arrive(zone, arrival);
    }

    fn log_leave(leaving: ZoneHandle, next: ZoneHandle, traveler: Option<EntityId>) {
        let still_here = traveler.and_then(|traveler| leaving.position(traveler));
        let recorded = leaving.previous_position("t");
        HOOK_LOG.lock().expect("hook log lock").push(format!(
            "leave {} for {} at={still_here:?} recorded={recorded:?}",
            leaving.id(),
            next.id()
        ));
    }

    #[test]
    fn leave_hook_runs_before_enter_and_before_departure_is_recorded() {
        let fallback = SymbolTable::new().with('#', wall).with('t', traveler);
        let catalog = TemplateCatalog::new(fallback)
            .with(
                ZoneTemplate::new("a", "\n##t\n")
                    .on_enter(log_enter)
                    .on_leave(log_leave),
            )
            .and_then(|catalog| catalog.with(ZoneTemplate::new("b", "\n").on_enter(log_enter)))
            .expect("catalog");
        let mut world = World::new(catalog);
        world.boot("a").expect("boot");
        step_until(&mut world, "a active", |world| world.active_zones().len() == 1);
        let (traveler, _) = find(&world, "a", "t").expect("traveler");

        world.handle().request_enter("b", Some(traveler));
        step_until(&mut world, "arrival in b", |world| {
            find(world, "b", "t").is_some() && world.active_zones() == ["b".to_string()]
        });

        let log = HOOK_LOG.lock().expect("hook log lock").clone();
        assert_eq!(
            log,
            vec![
                "enter a first=true".to_string(),
                format!(
                    "leave a for b at={:?} recorded={:?}",
                    Some(GridPos::new(2, 0)),
                    None::<GridPos>
                ),
                "enter b first=true".to_string(),
            ]
        );
        assert_eq!(
            world
                .zone("a")
                .and_then(|zone| zone.state().departed_position("t")),
            Some(GridPos::new(2, 0))
        );
    }

    #[test]
    fn entering_the_current_zone_changes_nothing() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        step_until(&mut world, "x active", |world| world.active_zones().len() == 1);
        world.handle().request_enter("x", None);
        world.step().expect("world step");
        assert_eq!(world.current_zone(), Some("x"));
        assert_eq!(world.active_zones(), ["x".to_string()]);
    }

    #[test]
    fn control_step_is_ignored_while_locked() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        step_until(&mut world, "x active", |world| world.active_zones().len() == 1);
        let (traveler, _) = find(&world, "x", "t").expect("traveler");
        world.state.set_controlled(Some(traveler));

        world
            .zone_mut("x")
            .expect("zone x")
            .state_mut()
            .set_locked(true);
        assert!(world.input_locked());
        assert!(!world.control_step(-1, 0, Action::Move));

        world
            .zone_mut("x")
            .expect("zone x")
            .state_mut()
            .set_locked(false);
        assert!(world.control_step(-1, 0, Action::Move));
        assert_eq!(find(&world, "x", "t"), Some((traveler, GridPos::new(2, 4))));
    }

    #[test]
    fn task_counts_include_every_zone() {
        let mut world = World::new(catalog());
        world.boot("x").expect("boot");
        step_until(&mut world, "x active", |world| world.active_zones().len() == 1);
        let handle = world.zone("x").map(Zone::handle).expect("zone x");
        thread::spawn(move || handle.wait(1_000));
        step_until(&mut world, "wait submitted", |world| {
            world.task_counts().active == 1
        });
        assert_eq!(world.task_counts().dropped, 0);
    }
}
