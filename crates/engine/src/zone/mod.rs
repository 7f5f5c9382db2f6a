pub mod collision;
pub mod entity;
pub mod template;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::script::{primitives, Scheduler, Submitter, ZoneHandle};
use crate::world::WorldHandle;
use collision::{resolve, Effect};
use entity::{Action, Entity, EntityDesc, EntityId, EntityIdAllocator, GridPos, Rgba, Vec2};
use template::{SymbolTable, ZoneTemplate};

/// One drawable entry of the current zone, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub position: Vec2,
    pub image: String,
    pub tint: Option<Rgba>,
    pub mirror: bool,
    pub speech: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub zone: String,
    pub focus: Option<Vec2>,
    pub items: Vec<RenderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub tag: Option<String>,
    pub position: GridPos,
    pub image: String,
    pub blocking: bool,
    pub speech: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSnapshot {
    pub id: String,
    pub title: String,
    pub input_locked: bool,
    pub camera_target: Option<EntityId>,
    pub active_tasks: usize,
    pub entities: Vec<EntitySnapshot>,
}

/// Live state of one zone. Only that zone's step-polling pass mutates it.
pub struct ZoneState {
    id: Arc<str>,
    title: String,
    entities: Vec<Entity>,
    input_locked: bool,
    camera_target: Option<EntityId>,
    departed: HashMap<String, GridPos>,
    submitter: Submitter<ZoneState>,
    world: WorldHandle,
    ids: Arc<EntityIdAllocator>,
    effects: Vec<Effect>,
}

impl ZoneState {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id() == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// First entity carrying `tag`, in entity order.
    pub fn find_tagged(&self, tag: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|entity| entity.has_tag(tag))
            .map(Entity::id)
    }

    pub fn allocate(&self, desc: EntityDesc) -> Entity {
        desc.build(self.ids.allocate(), GridPos::default())
    }

    /// Adds `entity` at `position` and keeps the set stably ordered by layer.
    pub fn insert(&mut self, mut entity: Entity, position: GridPos) -> EntityId {
        let id = entity.id();
        entity.place_at(position);
        self.entities.push(entity);
        self.entities.sort_by_key(Entity::layer);
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|entity| entity.id() == id)?;
        let entity = self.entities.remove(index);
        if self.camera_target == Some(id) {
            self.camera_target = None;
        }
        Some(entity)
    }

    pub fn is_locked(&self) -> bool {
        self.input_locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.input_locked = locked;
    }

    pub fn camera_target(&self) -> Option<EntityId> {
        self.camera_target
    }

    pub fn set_camera_target(&mut self, target: Option<EntityId>) {
        self.camera_target = target;
    }

    pub fn record_departure(&mut self, tag: &str, position: GridPos) {
        self.departed.insert(tag.to_string(), position);
    }

    pub fn departed_position(&self, tag: &str) -> Option<GridPos> {
        self.departed.get(tag).copied()
    }

    pub fn handle(&self) -> ZoneHandle {
        ZoneHandle::new(
            Arc::clone(&self.id),
            self.submitter.clone(),
            self.world.clone(),
        )
    }

    /// Attempts to move `actor` into `dest`, consulting the resolver first.
    /// Returns whether the move happened.
    pub fn move_entity(&mut self, actor: EntityId, dest: GridPos, action: Action) -> bool {
        if !self.contains(actor) {
            return false;
        }
        let collision = resolve(&mut self.entities, actor, dest, action, &mut self.effects);
        self.dispatch_effects();
        if collision.is_some_and(|collision| collision.blocked) {
            return false;
        }
        match self.entity_mut(actor) {
            Some(entity) => {
                entity.set_position(dest);
                true
            }
            None => false,
        }
    }

    pub fn step_entity(&mut self, actor: EntityId, dx: i32, dy: i32, action: Action) -> bool {
        match self.entity(actor) {
            Some(entity) => {
                let dest = entity.position().offset(dx, dy);
                self.move_entity(actor, dest, action)
            }
            None => false,
        }
    }

    fn dispatch_effects(&mut self) {
        for effect in self.effects.drain(..) {
            debug!(zone = %self.id, ?effect, "capability_effect");
            match effect {
                Effect::Say { speaker, text } => {
                    self.submitter.spawn(primitives::say_task(speaker, text));
                }
                Effect::SetImage { entity, image } => {
                    self.submitter.spawn(move |state: &mut ZoneState| {
                        if let Some(target) = state.entity_mut(entity) {
                            target.set_image(image.clone());
                        }
                        Some(())
                    });
                }
                Effect::Travel { zone, traveler } => {
                    self.world.request_enter(zone, Some(traveler));
                }
            }
        }
    }

    pub fn converge(&mut self) {
        for entity in &mut self.entities {
            entity.converge_render_position();
        }
    }

    pub fn camera_focus(&self) -> Option<Vec2> {
        self.camera_target
            .and_then(|id| self.entity(id))
            .map(Entity::render_position)
    }

    pub fn render_frame(&self) -> RenderFrame {
        RenderFrame {
            zone: self.id.to_string(),
            focus: self.camera_focus(),
            items: self
                .entities
                .iter()
                .map(|entity| RenderItem {
                    position: entity.render_position(),
                    image: entity.image().to_string(),
                    tint: entity.tint(),
                    mirror: entity.mirror(),
                    speech: entity.speech_text().map(str::to_owned),
                })
                .collect(),
        }
    }
}

/// A template instantiated into live state, with its own scheduler.
pub struct Zone {
    template: Arc<ZoneTemplate>,
    state: ZoneState,
    scheduler: Scheduler<ZoneState>,
    created: bool,
}

impl Zone {
    pub(crate) fn new(
        template: Arc<ZoneTemplate>,
        world: WorldHandle,
        ids: Arc<EntityIdAllocator>,
    ) -> Self {
        let scheduler = Scheduler::new(format!("zone:{}", template.id()));
        let state = ZoneState {
            id: Arc::from(template.id()),
            title: template.display_title().to_string(),
            entities: Vec::new(),
            input_locked: false,
            camera_target: None,
            departed: HashMap::new(),
            submitter: scheduler.submitter(),
            world,
            ids,
            effects: Vec::new(),
        };
        Self {
            template,
            state,
            scheduler,
            created: false,
        }
    }

    /// Runs the template factories the first time only. Returns whether this
    /// call did so.
    pub fn instantiate(&mut self, fallback: &SymbolTable) -> bool {
        if self.created {
            return false;
        }
        for (position, desc) in self.template.placements(fallback) {
            let entity = self.state.allocate(desc);
            self.state.insert(entity, position);
        }
        self.created = true;
        info!(
            zone = %self.state.id,
            entities = self.state.entities.len(),
            "zone_instantiated"
        );
        true
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn template(&self) -> &Arc<ZoneTemplate> {
        &self.template
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn state(&self) -> &ZoneState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ZoneState {
        &mut self.state
    }

    pub fn handle(&self) -> ZoneHandle {
        self.state.handle()
    }

    pub fn run_tasks(&mut self) {
        self.scheduler.step(&mut self.state);
    }

    /// One full simulation step: task polls, then render convergence.
    pub fn step(&mut self) {
        self.run_tasks();
        self.state.converge();
    }

    pub fn active_tasks(&self) -> usize {
        self.scheduler.active_len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending_len()
    }

    pub fn steps(&self) -> u64 {
        self.scheduler.steps()
    }

    pub fn dropped_submissions(&self) -> u64 {
        self.scheduler.dropped_submissions()
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            id: self.state.id.to_string(),
            title: self.state.title.clone(),
            input_locked: self.state.input_locked,
            camera_target: self.state.camera_target,
            active_tasks: self.scheduler.active_len(),
            entities: self
                .state
                .entities
                .iter()
                .map(|entity| EntitySnapshot {
                    id: entity.id(),
                    tag: entity.tag().map(str::to_owned),
                    position: entity.position(),
                    image: entity.image().to_string(),
                    blocking: entity.blocking(),
                    speech: entity.speech_text().map(str::to_owned),
                })
                .collect(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::detached_zone;
    use super::*;
    use crate::zone::entity::Capability;
    use crate::zone::collision::Touch;

    fn player() -> Option<EntityDesc> {
        Some(EntityDesc::new("character").tag("player").layer(1))
    }

    fn wall() -> Option<EntityDesc> {
        Some(EntityDesc::new("woodwall"))
    }

    fn grass() -> Option<EntityDesc> {
        Some(EntityDesc::new("grass").passable())
    }

    fn symbols() -> SymbolTable {
        SymbolTable::new()
            .with('@', player)
            .with('#', wall)
            .with('.', grass)
    }

    #[test]
    fn instantiate_runs_factories_only_once() {
        let mut zone = detached_zone("\n#@.\n", symbols());
        assert!(zone.is_created());
        assert_eq!(zone.state().entities().len(), 3);
        assert!(!zone.instantiate(&SymbolTable::new()));
        assert_eq!(zone.state().entities().len(), 3);
    }

    #[test]
    fn entities_are_stably_ordered_by_layer() {
        let zone = detached_zone("\n@#.\n", symbols());
        let images: Vec<_> = zone
            .state()
            .entities()
            .iter()
            .map(|entity| entity.image().to_string())
            .collect();
        assert_eq!(images, vec!["woodwall", "grass", "character"]);
    }

    #[test]
    fn step_entity_respects_blocking_and_passable_cells() {
        let mut zone = detached_zone("\n#@.\n", symbols());
        let player = zone.state().find_tagged("player").expect("player");
        let state = zone.state_mut();

        assert!(!state.step_entity(player, -1, 0, Action::Move));
        assert_eq!(state.entity(player).map(Entity::position), Some(GridPos::new(1, 0)));

        assert!(state.step_entity(player, 1, 0, Action::Move));
        assert_eq!(state.entity(player).map(Entity::position), Some(GridPos::new(2, 0)));
    }

    #[test]
    fn capability_speech_is_scheduled_for_the_next_step() {
        fn grumpy(touch: &mut Touch<'_>) -> bool {
            touch.say("*thump*");
            true
        }
        fn sign() -> Option<EntityDesc> {
            Some(EntityDesc::new("sign").capability(Capability::new("grumpy", grumpy)))
        }
        let mut zone = detached_zone("\n@s\n", symbols().with('s', sign));
        let player = zone.state().find_tagged("player").expect("player");

        assert!(!zone.state_mut().step_entity(player, 1, 0, Action::Move));
        let sign_id = zone.state().entity(player).and_then(Entity::last_touched).expect("touched");
        assert_eq!(zone.state().entity(sign_id).and_then(Entity::speech_text), None);

        zone.step();
        assert_eq!(
            zone.state().entity(sign_id).and_then(Entity::speech_text),
            Some("*thump*")
        );
    }

    #[test]
    fn removing_the_camera_target_clears_it() {
        let mut zone = detached_zone("\n@\n", symbols());
        let player = zone.state().find_tagged("player").expect("player");
        zone.state_mut().set_camera_target(Some(player));
        assert!(zone.state_mut().remove(player).is_some());
        assert_eq!(zone.state().camera_target(), None);
        assert_eq!(zone.state().camera_focus(), None);
    }

    #[test]
    fn render_frame_follows_entity_order_and_focus() {
        let mut zone = detached_zone("\n.@\n", symbols());
        let player = zone.state().find_tagged("player").expect("player");
        zone.state_mut().set_camera_target(Some(player));
        let frame = zone.state().render_frame();
        assert_eq!(frame.items.len(), 2);
        assert_eq!(frame.items[1].image, "character");
        assert_eq!(frame.focus, Some(Vec2::new(16.0, 0.0)));
    }

    #[test]
    fn departed_positions_are_remembered_by_tag() {
        let mut zone = detached_zone("\n", SymbolTable::new());
        zone.state_mut().record_departure("t", GridPos::new(3, 4));
        assert_eq!(zone.state().departed_position("t"), Some(GridPos::new(3, 4)));
        assert_eq!(zone.state().departed_position("u"), None);
    }
}
