use super::entity::{Action, Entity, EntityId, GridPos};

/// Side effect requested by a capability, applied through the schedulers
/// once resolution has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Say { speaker: EntityId, text: String },
    SetImage { entity: EntityId, image: String },
    Travel { zone: String, traveler: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub occupant: EntityId,
    pub blocked: bool,
}

/// What a capability sees while it is being consulted.
pub struct Touch<'a> {
    target: &'a mut Entity,
    actor: EntityId,
    actor_tag: Option<String>,
    actor_last_touched: Option<EntityId>,
    action: Action,
    effects: &'a mut Vec<Effect>,
}

impl<'a> Touch<'a> {
    pub fn new(
        target: &'a mut Entity,
        actor: EntityId,
        actor_tag: Option<String>,
        actor_last_touched: Option<EntityId>,
        action: Action,
        effects: &'a mut Vec<Effect>,
    ) -> Self {
        Self {
            target,
            actor,
            actor_tag,
            actor_last_touched,
            action,
            effects,
        }
    }

    pub fn target(&self) -> &Entity {
        self.target
    }

    pub fn target_mut(&mut self) -> &mut Entity {
        self.target
    }

    pub fn actor(&self) -> EntityId {
        self.actor
    }

    pub fn actor_tag(&self) -> Option<&str> {
        self.actor_tag.as_deref()
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_interact(&self) -> bool {
        self.action == Action::Interact
    }

    /// The actor's previous interaction was with this same target.
    pub fn touched_before(&self) -> bool {
        self.actor_last_touched == Some(self.target.id())
    }

    pub fn say(&mut self, text: impl Into<String>) {
        let speaker = self.target.id();
        self.effects.push(Effect::Say {
            speaker,
            text: text.into(),
        });
    }

    pub fn actor_says(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::Say {
            speaker: self.actor,
            text: text.into(),
        });
    }

    pub fn set_image_later(&mut self, image: impl Into<String>) {
        let entity = self.target.id();
        self.effects.push(Effect::SetImage {
            entity,
            image: image.into(),
        });
    }

    pub fn travel(&mut self, zone: impl Into<String>) {
        self.effects.push(Effect::Travel {
            zone: zone.into(),
            traveler: self.actor,
        });
    }
}

/// Finds the first entity in list order occupying `dest`, other than the
/// actor, and asks it whether the actor's move is blocked.
///
/// The actor's `last_touched` is updated to the occupant whatever the
/// outcome. Returns `None` when the cell is empty.
pub fn resolve(
    entities: &mut [Entity],
    actor: EntityId,
    dest: GridPos,
    action: Action,
    effects: &mut Vec<Effect>,
) -> Option<Collision> {
    let actor_index = entities.iter().position(|entity| entity.id() == actor);
    let (actor_tag, actor_last_touched) = match actor_index {
        Some(index) => (
            entities[index].tag().map(str::to_owned),
            entities[index].last_touched(),
        ),
        None => (None, None),
    };

    let index = entities
        .iter()
        .position(|entity| entity.id() != actor && entity.position() == dest)?;

    let occupant = &mut entities[index];
    let occupant_id = occupant.id();
    let blocked = match occupant.capability() {
        Some(capability) => {
            let mut touch = Touch::new(
                occupant,
                actor,
                actor_tag,
                actor_last_touched,
                action,
                effects,
            );
            (capability.on_touch)(&mut touch)
        }
        None => occupant.blocking(),
    };

    if let Some(index) = actor_index {
        entities[index].set_last_touched(Some(occupant_id));
    }

    Some(Collision {
        occupant: occupant_id,
        blocked,
    })
}
