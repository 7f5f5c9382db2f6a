use crate::zone::entity::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Maps a render position to buffer pixels. With a focus the focused point
/// lands on the viewport center; without one the origin is the top-left
/// corner. Y grows downward, like grid rows.
pub fn world_to_screen_px(position: Vec2, focus: Option<Vec2>, viewport: Viewport) -> (i32, i32) {
    let (x, y) = match focus {
        Some(focus) => (
            position.x - focus.x + viewport.width as f32 * 0.5,
            position.y - focus.y + viewport.height as f32 * 0.5,
        ),
        None => (position.x, position.y),
    };
    (x.round() as i32, y.round() as i32)
}
