//! `bevy_reskin` — prompt-driven texture reskinning for product models in Bevy.
//!
//! # Architecture
//! A spawned glTF product model is marked with [`ReskinModel`]; the plugin
//! finds the allow-listed skin meshes ([`TargetNames`]) inside the instance
//! and keeps them bound to a single shared
//! [`StandardMaterial`](bevy::prelude::StandardMaterial) — the current
//! generated texture, or a flat gray fallback so a fresh model is never
//! shown unmaterialed.
//!
//! Setting a desired URL on [`ReskinPipeline`] fetches and decodes the image
//! on a private worker pool; a monotonic generation counter guarantees that
//! of several in-flight loads only the newest may touch the scene, and the
//! settle callback fires exactly once per request that is not superseded.
//! The [`remote`] module holds the two-step prompt-rewrite +
//! image-generation client that produces such URLs from free text.

pub mod material;
pub mod pipeline;
pub mod remote;
pub mod resolver;
pub mod targets;

pub use material::{MaterialSpec, standard_material};
pub use pipeline::{LoadOutcome, PipelineState, ReskinPipeline};
pub use remote::{
    GenerateError, GeneratorConfig, PendingSkinPrompt, RemoteGenerator, SkinPromptResult,
};
pub use resolver::{DecodedTexture, LoadError};
pub use targets::{DEFAULT_TARGET_NAMES, ReskinModel, ReskinTarget, TargetNames, collect_targets};

use bevy::prelude::*;

/// Bevy plugin — registers the pipeline resource and its polling systems.
pub struct ReskinPlugin;

impl Plugin for ReskinPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ReskinPipeline>()
            .init_resource::<TargetNames>()
            .add_systems(
                Update,
                (
                    remote::poll_prompt_tasks,
                    targets::resolve_targets,
                    pipeline::poll_fetch_tasks,
                    pipeline::apply_current_material,
                )
                    .chain(),
            );
    }
}
