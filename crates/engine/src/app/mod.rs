mod input;
mod loop_runner;
mod metrics;
mod rendering;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, run_headless, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{
    validate_sprite_key, world_to_screen_px, Renderer, Sprite, SpriteCache, SpriteKeyError,
    Viewport,
};
