//! `configurator` — minimal driver for the reskinning pipeline.
//!
//! Run with:
//!   cargo run --example configurator -- models/product.glb --texture-url https://example.com/pattern.png
//!
//! or, with `RESKIN_REWRITE_URL` / `RESKIN_GENERATE_URL` pointing at the
//! generation endpoints:
//!   cargo run --example configurator -- models/product.glb --prompt "koi fish"

use bevy::prelude::*;
use bevy_reskin::{
    GeneratorConfig, PendingSkinPrompt, RemoteGenerator, ReskinModel, ReskinPipeline, ReskinPlugin,
    SkinPromptResult,
};

#[derive(Resource, Clone)]
struct DemoArgs {
    model_path: String,
    texture_url: Option<String>,
    prompt: Option<String>,
}

fn parse_args() -> DemoArgs {
    let mut args = std::env::args().skip(1);
    let mut parsed = DemoArgs {
        model_path: "models/product.glb".to_owned(),
        texture_url: None,
        prompt: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--texture-url" => parsed.texture_url = args.next(),
            "--prompt" => parsed.prompt = args.next(),
            path => parsed.model_path = path.to_owned(),
        }
    }
    parsed
}

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "bevy_reskin — configurator".into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(ReskinPlugin)
        .insert_resource(parse_args())
        .add_systems(Startup, setup)
        .add_systems(Update, feed_prompt_results)
        .run();
}

fn setup(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut pipeline: ResMut<ReskinPipeline>,
    args: Res<DemoArgs>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-4.8, 3.1, 13.5).looking_at(Vec3::new(0.0, 1.0, 0.0), Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(5.0, 8.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        SceneRoot(asset_server.load(GltfAssetLabel::Scene(0).from_asset(args.model_path.clone()))),
        ReskinModel,
    ));

    pipeline.on_settled(|outcome| bevy::log::info!("pipeline settled: {outcome:?}"));

    if let Some(url) = &args.texture_url {
        pipeline.set_desired_url(Some(url));
    } else if let Some(prompt) = &args.prompt {
        match GeneratorConfig::from_env() {
            Some(config) => {
                commands.spawn(PendingSkinPrompt::submit(
                    RemoteGenerator::new(config),
                    prompt.clone(),
                    None,
                ));
            }
            None => bevy::log::error!(
                "--prompt needs RESKIN_REWRITE_URL and RESKIN_GENERATE_URL to be set"
            ),
        }
    }
}

/// Feed finished generations into the pipeline.
fn feed_prompt_results(
    mut commands: Commands,
    results: Query<(Entity, &SkinPromptResult)>,
    mut pipeline: ResMut<ReskinPipeline>,
) {
    for (entity, result) in &results {
        if let Ok(url) = &result.0 {
            pipeline.set_desired_url(Some(url));
        }
        // Errors were already logged by the poll system; a real shell would
        // surface them in its UI here.
        commands.entity(entity).despawn();
    }
}
