use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod script;
pub mod world;
pub mod zone;

pub use app::{
    run_app, run_headless, AppError, InputAction, InputSnapshot, LoopConfig, LoopMetricsSnapshot,
    Renderer, SpriteCache, Viewport, SLOW_FRAME_ENV_VAR,
};
pub use script::{Scheduler, Submitter, TaskStatus, ZoneHandle, SUBMISSION_CAPACITY};
pub use world::{TaskCounts, World, WorldError, WorldHandle, WorldSnapshot, WorldState};
pub use zone::collision::{Collision, Effect, Touch};
pub use zone::entity::{
    Action, Capability, Entity, EntityDesc, EntityId, GridPos, Rgba, Vec2, TILE_SIZE,
};
pub use zone::template::{Arrival, SymbolTable, TemplateCatalog, ZoneTemplate};
pub use zone::{RenderFrame, RenderItem, Zone, ZoneSnapshot, ZoneState};

pub const ROOT_ENV_VAR: &str = "EBB_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "EBB_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
export {env_var}=\"/path/to/ebb\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Locates the project root and the sprite assets below it. Missing sprite
/// files are not an error; they render as placeholders.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let assets_dir = root.join("assets");
    Ok(AppPaths { root, assets_dir })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_root_from(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn root_is_found_from_a_nested_build_directory() {
        let root = TempDir::new().expect("temp dir");
        fs::write(root.path().join("Cargo.toml"), "[workspace]\n").expect("write manifest");
        fs::create_dir_all(root.path().join("assets")).expect("assets dir");
        let nested = root.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested dir");

        let found = find_root_from(&nested).expect("root found");
        assert_eq!(found, normalize_path(root.path()));
    }

    #[test]
    fn directory_without_markers_has_no_root() {
        let dir = TempDir::new().expect("temp dir");
        assert!(!is_repo_marker(dir.path()));
    }
}
