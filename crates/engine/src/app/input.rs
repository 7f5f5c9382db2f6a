use crate::zone::entity::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 6;

/// Movement actions in the order they are applied within one tick.
const MOVE_ORDER: [(InputAction, i32, i32); 4] = [
    (InputAction::MoveLeft, -1, 0),
    (InputAction::MoveRight, 1, 0),
    (InputAction::MoveUp, 0, -1),
    (InputAction::MoveDown, 0, 1),
];

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Interact => 4,
            InputAction::Quit => 5,
        }
    }
}

/// Input for a single simulation tick: held keys plus keys newly pressed
/// since the previous tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    held: ActionStates,
    pressed: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(quit_requested: bool, held: ActionStates, pressed: ActionStates) -> Self {
        Self {
            quit_requested,
            held,
            pressed,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.held.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self.held.set(action, true);
        self
    }

    /// Holding interact turns every step of this tick into an interaction.
    pub fn step_action(&self) -> Action {
        if self.is_down(InputAction::Interact) {
            Action::Interact
        } else {
            Action::Move
        }
    }

    /// One grid step per movement key pressed this tick: left, right, up, down.
    pub fn steps(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        MOVE_ORDER
            .iter()
            .filter(|(action, _, _)| self.was_pressed(*action))
            .map(|&(_, dx, dy)| (dx, dy))
    }
}
