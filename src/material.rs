//! Material construction for the skin meshes.
//!
//! Every target carries the same material at all times — either the current
//! generated texture or the flat gray fallback.  Both variants share the
//! mid-rough, mid-metallic surface the product model was tuned for.

use bevy::prelude::*;

/// What the skin meshes should currently show.
#[derive(Clone, Debug)]
pub enum MaterialSpec {
    /// Tile the decoded texture across the skin UVs.
    Textured(Handle<Image>),
    /// Flat gray fallback, shown before any texture resolves and after a
    /// clear.
    Flat,
}

/// Build the [`StandardMaterial`] for `spec`.
///
/// Roughness and metalness sit at 0.5 for both variants so swapping a
/// texture in or out never changes the perceived surface, only its color.
pub fn standard_material(spec: &MaterialSpec) -> StandardMaterial {
    match spec {
        MaterialSpec::Textured(image) => StandardMaterial {
            base_color_texture: Some(image.clone()),
            perceptual_roughness: 0.5,
            metallic: 0.5,
            ..Default::default()
        },
        MaterialSpec::Flat => StandardMaterial {
            base_color: Color::srgb_u8(170, 170, 170),
            perceptual_roughness: 0.5,
            metallic: 0.5,
            ..Default::default()
        },
    }
}
