use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must not start with '/'")]
    LeadingSlash,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Sprite keys are relative paths below the sprite directory, without the
/// `.png` extension: lowercase ASCII, digits, `_`, `-` and `/`.
pub fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(SpriteKeyError::LeadingSlash);
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    match key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        Some(character) => Err(SpriteKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decoded sprites keyed by image name. Failed loads are cached as misses
/// and reported once per key.
#[derive(Debug)]
pub struct SpriteCache {
    sprite_dir: PathBuf,
    sprites: HashMap<String, Option<Sprite>>,
    warned_keys: HashSet<String>,
}

impl SpriteCache {
    pub fn new(assets_dir: &Path) -> Self {
        Self {
            sprite_dir: assets_dir.join("sprites"),
            sprites: HashMap::new(),
            warned_keys: HashSet::new(),
        }
    }

    pub fn sprite_path(&self, key: &str) -> PathBuf {
        self.sprite_dir.join(format!("{key}.png"))
    }

    pub fn get(&mut self, key: &str) -> Option<&Sprite> {
        if !self.sprites.contains_key(key) {
            let loaded = self.load(key);
            self.sprites.insert(key.to_string(), loaded);
        }
        self.sprites.get(key).and_then(Option::as_ref)
    }

    pub fn cached_len(&self) -> usize {
        self.sprites.len()
    }

    fn load(&mut self, key: &str) -> Option<Sprite> {
        if let Err(error) = validate_sprite_key(key) {
            self.warn_once(key, None, &format!("invalid_key:{error}"));
            return None;
        }
        let path = self.sprite_path(key);
        match load_sprite_rgba(&path) {
            Ok(sprite) => Some(sprite),
            Err(reason) => {
                self.warn_once(key, Some(&path), &reason);
                None
            }
        }
    }

    fn warn_once(&mut self, key: &str, path: Option<&Path>, reason: &str) {
        if !self.warned_keys.insert(key.to_string()) {
            return;
        }
        let path_display = path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<unresolved>".to_string());
        warn!(
            sprite_key = key,
            path = %path_display,
            reason,
            "sprite_load_failed_using_placeholder"
        );
    }
}

fn load_sprite_rgba(path: &Path) -> Result<Sprite, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(Sprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn accepts_sprite_names_used_by_content() {
        for key in ["character", "tree-hideable", "chair_left", "ui/tps"] {
            assert!(validate_sprite_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_keys_that_escape_or_need_escaping() {
        for key in ["", "/abs", "../secret", "a/../b", "Door", "door.png", "east door"] {
            assert!(validate_sprite_key(key).is_err(), "key={key}");
        }
    }

    #[test]
    fn loads_png_sprites_from_the_sprite_directory() {
        let assets = TempDir::new().expect("temp dir");
        let sprite_dir = assets.path().join("sprites");
        std::fs::create_dir_all(&sprite_dir).expect("sprite dir");
        let mut image = RgbaImage::new(2, 3);
        image.put_pixel(1, 2, Rgba([10, 20, 30, 255]));
        image.save(sprite_dir.join("grass.png")).expect("write png");

        let mut cache = SpriteCache::new(assets.path());
        let sprite = cache.get("grass").expect("sprite loads");
        assert_eq!((sprite.width, sprite.height), (2, 3));
        let offset = ((2 * 2 + 1) * 4) as usize;
        assert_eq!(&sprite.rgba[offset..offset + 4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_sprites_are_cached_as_misses() {
        let assets = TempDir::new().expect("temp dir");
        let mut cache = SpriteCache::new(assets.path());
        assert!(cache.get("froge").is_none());
        assert!(cache.get("froge").is_none());
        assert_eq!(cache.cached_len(), 1);
        assert!(cache.warned_keys.contains("froge"));
    }
}
