use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::collision::Touch;

/// Render units per grid cell.
pub const TILE_SIZE: f32 = 16.0;
/// Render units an entity's drawn position moves per step toward its cell.
pub const RENDER_UNITS_PER_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

/// Hands out ids that stay unique across every zone of a world.
#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: AtomicU64,
}

impl EntityIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> EntityId {
        EntityId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// One cell toward `target`, each axis independently.
    pub fn step_toward(self, target: GridPos) -> Self {
        Self::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
        )
    }

    /// Within one cell on both axes (diagonal neighbours count).
    pub fn within_one(self, other: GridPos) -> bool {
        (self.x - other.x).abs() < 2 && (self.y - other.y).abs() < 2
    }

    pub fn to_render(self) -> Vec2 {
        Vec2::new(self.x as f32 * TILE_SIZE, self.y as f32 * TILE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Action {
    #[default]
    Move,
    Interact,
}

/// Interaction behaviour consulted when something moves into the entity's cell.
/// Returns whether the move is blocked.
pub type TouchFn = fn(&mut Touch<'_>) -> bool;

#[derive(Clone, Copy)]
pub struct Capability {
    pub name: &'static str,
    pub on_touch: TouchFn,
}

impl Capability {
    pub const fn new(name: &'static str, on_touch: TouchFn) -> Self {
        Self { name, on_touch }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Speech {
    pub text: String,
    pub remaining_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    tag: Option<String>,
    position: GridPos,
    render_position: Vec2,
    image: String,
    tint: Option<Rgba>,
    layer: i32,
    mirror: bool,
    blocking: bool,
    capability: Option<Capability>,
    last_touched: Option<EntityId>,
    speech: Option<Speech>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    pub fn position(&self) -> GridPos {
        self.position
    }

    pub fn set_position(&mut self, position: GridPos) {
        self.position = position;
    }

    /// Moves the grid position and snaps the drawn position onto it.
    pub fn place_at(&mut self, position: GridPos) {
        self.position = position;
        self.render_position = position.to_render();
    }

    pub fn render_position(&self) -> Vec2 {
        self.render_position
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn set_image(&mut self, image: impl Into<String>) {
        self.image = image.into();
    }

    pub fn tint(&self) -> Option<Rgba> {
        self.tint
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn blocking(&self) -> bool {
        self.blocking
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    pub fn capability(&self) -> Option<Capability> {
        self.capability
    }

    pub fn last_touched(&self) -> Option<EntityId> {
        self.last_touched
    }

    pub(crate) fn set_last_touched(&mut self, other: Option<EntityId>) {
        self.last_touched = other;
    }

    pub fn speech(&self) -> Option<&Speech> {
        self.speech.as_ref()
    }

    pub fn speech_text(&self) -> Option<&str> {
        self.speech.as_ref().map(|speech| speech.text.as_str())
    }

    pub(crate) fn set_speech(&mut self, speech: Option<Speech>) {
        self.speech = speech;
    }

    /// Moves the drawn position one unit per axis toward the grid cell.
    pub fn converge_render_position(&mut self) {
        let target = self.position.to_render();
        self.render_position.x = approach(self.render_position.x, target.x);
        self.render_position.y = approach(self.render_position.y, target.y);
    }
}

fn approach(current: f32, target: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= RENDER_UNITS_PER_STEP {
        target
    } else {
        current + RENDER_UNITS_PER_STEP.copysign(delta)
    }
}

/// Blueprint for an entity that has not been given an id or a cell yet.
#[derive(Debug, Clone)]
pub struct EntityDesc {
    tag: Option<String>,
    image: String,
    tint: Option<Rgba>,
    layer: i32,
    mirror: bool,
    blocking: bool,
    capability: Option<Capability>,
}

impl EntityDesc {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            tag: None,
            image: image.into(),
            tint: None,
            layer: 0,
            mirror: false,
            blocking: true,
            capability: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tint(mut self, tint: Rgba) -> Self {
        self.tint = Some(tint);
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror = true;
        self
    }

    pub fn passable(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn build(self, id: EntityId, position: GridPos) -> Entity {
        Entity {
            id,
            tag: self.tag,
            position,
            render_position: position.to_render(),
            image: self.image,
            tint: self.tint,
            layer: self.layer,
            mirror: self.mirror,
            blocking: self.blocking,
            capability: self.capability,
            last_touched: None,
            speech: None,
        }
    }
}
