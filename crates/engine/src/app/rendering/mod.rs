mod assets;
mod canvas;
mod renderer;
mod text;
mod transform;

pub use assets::{validate_sprite_key, Sprite, SpriteCache, SpriteKeyError};
pub use renderer::Renderer;
pub use transform::{world_to_screen_px, Viewport};
