//! Selection of the skin meshes inside a spawned product model.
//!
//! The shell marks its glTF [`SceneRoot`](bevy::scene::SceneRoot) entity with
//! [`ReskinModel`].  Once the scene instance has spawned, [`resolve_targets`]
//! walks the instance depth-first, tags the meshes of every node whose
//! [`Name`] is on the [`TargetNames`] allow-list with [`ReskinTarget`], and validates the
//! configured names against what the asset actually contains — absent names
//! are logged once per model, not per frame.
//!
//! An empty selection is valid: a model without the expected skin regions
//! simply has nothing to reskin.

use bevy::prelude::*;

/// Skin mesh names targeted when no [`TargetNames`] override is supplied.
pub const DEFAULT_TARGET_NAMES: [&str; 4] =
    ["base-bottom", "base-main", "base-top", "main-section"];

/// Allow-list of mesh names eligible for reskinning.
///
/// A resource rather than a compiled-in constant so the list can follow the
/// product asset; [`Default`] matches the reference model's skin regions.
#[derive(Resource, Clone, Debug)]
pub struct TargetNames(pub Vec<String>);

impl Default for TargetNames {
    fn default() -> Self {
        Self(DEFAULT_TARGET_NAMES.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl TargetNames {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }
}

/// Marks the scene-root entity of the product model to reskin.
///
/// Place it on the same entity as the `SceneRoot`; swapping the scene handle
/// on that entity triggers a rescan once the new instance spawns.
#[derive(Component)]
pub struct ReskinModel;

/// Marks one selected skin mesh.  Inserted by [`resolve_targets`]; the
/// material systems treat the set of tagged entities as the current targets.
#[derive(Component)]
pub struct ReskinTarget;

/// Inserted on a [`ReskinModel`] root after its instance has been scanned,
/// so selection and validation run once per spawned instance.
#[derive(Component)]
pub struct TargetsResolved;

/// One depth-first pass over a spawned instance.
pub(crate) struct ScanReport {
    /// Allow-listed mesh entities, in traversal order.
    pub targets: Vec<Entity>,
    /// Names of `targets`, index-aligned.
    pub target_names: Vec<String>,
    /// Total meshes seen — zero means the scene has not spawned yet.
    pub mesh_count: usize,
}

/// Collect every [`Mesh3d`] entity in the subtree rooted at `entity`,
/// including `entity` itself, in traversal order.
///
/// The glTF importer puts a node's `Name` on the node entity and the mesh
/// primitives on child entities, so an allow-listed node binds all meshes
/// below it.  A node carrying its own `Mesh3d` binds just itself.
fn subtree_meshes(
    entity: Entity,
    children: &Query<&Children>,
    meshes: &Query<(), With<Mesh3d>>,
    out: &mut Vec<Entity>,
) {
    let mut stack = vec![entity];
    while let Some(entity) = stack.pop() {
        if meshes.contains(entity) {
            out.push(entity);
        }
        if let Ok(kids) = children.get(entity) {
            let kids: &[Entity] = kids;
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
    }
}

pub(crate) fn scan_instance(
    root: Entity,
    children: &Query<&Children>,
    names: &Query<&Name>,
    meshes: &Query<(), With<Mesh3d>>,
    allow: &TargetNames,
) -> ScanReport {
    let mut report = ScanReport {
        targets: Vec::new(),
        target_names: Vec::new(),
        mesh_count: 0,
    };
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if meshes.contains(entity) {
            report.mesh_count += 1;
        }
        if let Ok(name) = names.get(entity)
            && allow.contains(name.as_str())
        {
            let mut matched = Vec::new();
            subtree_meshes(entity, children, meshes, &mut matched);
            for mesh in matched {
                // A primitive can carry the same name as its node; don't
                // bind it twice.
                if !report.targets.contains(&mesh) {
                    report.targets.push(mesh);
                    report.target_names.push(name.as_str().to_owned());
                }
            }
        }
        if let Ok(kids) = children.get(entity) {
            let kids: &[Entity] = kids;
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
    }
    report
}

/// Collect the allow-listed mesh entities under `root`, in traversal order.
///
/// Deterministic single depth-first pass; returns an empty vec when the
/// asset has no matching nodes.
pub fn collect_targets(
    root: Entity,
    children: &Query<&Children>,
    names: &Query<&Name>,
    meshes: &Query<(), With<Mesh3d>>,
    allow: &TargetNames,
) -> Vec<Entity> {
    scan_instance(root, children, names, meshes, allow).targets
}

/// Bevy system — tags skin meshes of freshly spawned model instances.
///
/// Runs the scan the first frame a [`ReskinModel`] root has mesh
/// descendants (a scene instance spawns atomically, so at that point the
/// whole model is present).  A changed `SceneRoot` handle clears the
/// resolved flag so the replacement instance is scanned in turn.
pub fn resolve_targets(
    mut commands: Commands,
    reloaded: Query<Entity, (With<ReskinModel>, With<TargetsResolved>, Changed<SceneRoot>)>,
    pending: Query<Entity, (With<ReskinModel>, Without<TargetsResolved>)>,
    children: Query<&Children>,
    names: Query<&Name>,
    meshes: Query<(), With<Mesh3d>>,
    allow: Res<TargetNames>,
) {
    for root in &reloaded {
        commands.entity(root).remove::<TargetsResolved>();
    }

    for root in &pending {
        let report = scan_instance(root, &children, &names, &meshes, &allow);
        if report.mesh_count == 0 {
            continue;
        }

        for name in &allow.0 {
            if !report.target_names.iter().any(|n| n == name) {
                bevy::log::warn!("configured target mesh '{name}' is absent from the loaded model");
            }
        }
        if report.targets.is_empty() {
            bevy::log::info!("model has no allow-listed skin meshes; nothing to reskin");
        }

        for (entity, name) in report.targets.iter().zip(&report.target_names) {
            bevy::log::debug!("target mesh found: {name}");
            commands.entity(*entity).insert(ReskinTarget);
        }
        commands.entity(root).insert(TargetsResolved);
    }
}
