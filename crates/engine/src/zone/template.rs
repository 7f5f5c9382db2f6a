use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::entity::{EntityDesc, EntityId, GridPos};
use crate::script::ZoneHandle;
use crate::world::WorldError;

/// Builds the entity for one grid symbol. `None` leaves the cell empty.
pub type EntityFactory = fn() -> Option<EntityDesc>;

/// Runs on a script thread after the zone becomes current.
pub type EnterHook = fn(ZoneHandle, Arrival);

/// Runs on a script thread before the hand-off: `(leaving, next, traveler)`.
pub type LeaveHook = fn(ZoneHandle, ZoneHandle, Option<EntityId>);

/// Context handed to an enter hook.
#[derive(Clone)]
pub struct Arrival {
    pub previous: Option<ZoneHandle>,
    pub traveler: Option<EntityId>,
    pub first_visit: bool,
}

#[derive(Clone, Default)]
pub struct SymbolTable {
    factories: HashMap<char, EntityFactory>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: char, factory: EntityFactory) -> Self {
        self.factories.insert(symbol, factory);
        self
    }

    pub fn get(&self, symbol: char) -> Option<EntityFactory> {
        self.factories.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.factories.keys().collect();
        symbols.sort();
        f.debug_struct("SymbolTable")
            .field("symbols", &symbols)
            .finish()
    }
}

/// Immutable grid-plus-factories blueprint for one zone.
pub struct ZoneTemplate {
    id: String,
    title: String,
    tiles: String,
    symbols: SymbolTable,
    on_enter: Option<EnterHook>,
    on_leave: Option<LeaveHook>,
}

impl ZoneTemplate {
    pub fn new(id: impl Into<String>, tiles: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            tiles: tiles.into(),
            symbols: SymbolTable::new(),
            on_enter: None,
            on_leave: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn on_enter(mut self, hook: EnterHook) -> Self {
        self.on_enter = Some(hook);
        self
    }

    pub fn on_leave(mut self, hook: LeaveHook) -> Self {
        self.on_leave = Some(hook);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_title(&self) -> &str {
        &self.title
    }

    pub fn enter_hook(&self) -> Option<EnterHook> {
        self.on_enter
    }

    pub fn leave_hook(&self) -> Option<LeaveHook> {
        self.on_leave
    }

    /// Runs every factory in the grid, row by row, left to right.
    ///
    /// The literal's first line break is skipped so templates can open on a
    /// fresh line. Symbols missing from the zone's own table are looked up in
    /// `fallback`; symbols found in neither produce nothing.
    pub fn placements(&self, fallback: &SymbolTable) -> Vec<(GridPos, EntityDesc)> {
        let body = self.tiles.strip_prefix('\n').unwrap_or(&self.tiles);
        let mut placements = Vec::new();
        for (y, line) in body.lines().enumerate() {
            for (x, symbol) in line.chars().enumerate() {
                let Some(factory) = self.symbols.get(symbol).or_else(|| fallback.get(symbol))
                else {
                    continue;
                };
                if let Some(desc) = factory() {
                    placements.push((GridPos::new(x as i32, y as i32), desc));
                }
            }
        }
        placements
    }
}

impl fmt::Debug for ZoneTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneTemplate")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("symbols", &self.symbols)
            .field("has_enter_hook", &self.on_enter.is_some())
            .field("has_leave_hook", &self.on_leave.is_some())
            .finish()
    }
}

/// Every template a world can load, plus the global fallback symbols.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Arc<ZoneTemplate>>,
    fallback: SymbolTable,
}

impl TemplateCatalog {
    pub fn new(fallback: SymbolTable) -> Self {
        Self {
            templates: BTreeMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, template: ZoneTemplate) -> Result<(), WorldError> {
        if self.templates.contains_key(template.id()) {
            return Err(WorldError::DuplicateZone {
                zone: template.id().to_string(),
            });
        }
        self.templates
            .insert(template.id().to_string(), Arc::new(template));
        Ok(())
    }

    pub fn with(mut self, template: ZoneTemplate) -> Result<Self, WorldError> {
        self.register(template)?;
        Ok(self)
    }

    pub fn get(&self, zone: &str) -> Result<Arc<ZoneTemplate>, WorldError> {
        self.templates
            .get(zone)
            .cloned()
            .ok_or_else(|| WorldError::UnknownZone {
                zone: zone.to_string(),
            })
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.templates.contains_key(zone)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn fallback(&self) -> &SymbolTable {
        &self.fallback
    }
}
