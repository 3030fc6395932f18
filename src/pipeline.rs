//! The texture pipeline controller.
//!
//! [`PipelineCore`] is the state machine proper: a plain struct with an
//! explicit transition function, independent of Bevy, generic over the
//! resolved payload so tests can drive it without assets or threads.  Every
//! desired-URL change (including a clear) bumps a monotonic generation
//! counter, and a completion is only honored when its generation still
//! matches — a late response from a superseded request can never undo a
//! newer texture.  That counter replaces the boolean "is loading" flag such
//! pipelines tend to start with; treat it as the invariant, not a detail.
//!
//! [`ReskinPipeline`] wraps the core as a Bevy resource: it spawns the
//! fetch/decode work on the private worker pool, owns the receiving end for
//! the latest generation only (superseding a load drops the old receiver and
//! flags its task as cancelled), uploads accepted results into
//! [`Assets<Image>`], and keeps the single shared skin material current.
//! [`poll_fetch_tasks`] drains completions each frame and
//! [`apply_current_material`] rebinds any target whose assignment differs
//! from the current material — by handle identity, so unrelated frames cause
//! no redundant GPU re-uploads.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
    mpsc,
};

use bevy::prelude::*;

use crate::{
    material::{MaterialSpec, standard_material},
    resolver::{DecodedTexture, LoadError, decoded_to_image, fetch_decoded, worker_pool},
    targets::ReskinTarget,
};

/// Where the pipeline currently stands for the desired URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// No desired URL; targets show the flat fallback.
    Idle,
    /// A fetch for `url` is in flight at `generation`.
    Loading { url: String, generation: u64 },
    /// `url` resolved and its texture is on the targets.
    Applied { url: String },
    /// `url` failed to resolve; the previous material was left in place.
    Failed { url: String },
}

/// Settle notification, delivered exactly once per request that is not
/// superseded before its work finishes.  Superseded requests settle never.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The texture from `url` is now on the targets.
    Applied { url: String },
    /// `url` could not be loaded; the prior material is untouched.
    Failed { url: String, error: LoadError },
    /// The desired URL was cleared; targets revert to the flat fallback.
    Cleared,
}

/// What a [`PipelineCore::request`] call asks the caller to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// Begin resolving `url`; report back with `generation`.
    StartLoad { url: String, generation: u64 },
    /// Drop the current texture and show the flat fallback now.
    Clear,
    /// The URL is already the desired one; nothing to do.
    Ignored,
}

/// What a [`PipelineCore::complete`] call did.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    Applied { url: String },
    Failed { url: String, error: LoadError },
    /// The result belonged to a superseded generation and was discarded.
    Stale,
}

/// Generation-counted request state machine.
///
/// `T` is the resolved payload — [`Handle<Image>`] in production, anything
/// cheap in tests.  Exactly one current payload exists at a time; a newly
/// applied or cleared payload drops the previous one.
pub struct PipelineCore<T> {
    state: PipelineState,
    generation: u64,
    current: Option<(String, T)>,
}

impl<T> Default for PipelineCore<T> {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            generation: 0,
            current: None,
        }
    }
}

impl<T> PipelineCore<T> {
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The URL of the most recent request, `None` after a clear.
    pub fn desired_url(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Idle => None,
            PipelineState::Loading { url, .. }
            | PipelineState::Applied { url }
            | PipelineState::Failed { url } => Some(url),
        }
    }

    /// The currently applied payload and the URL it was resolved from.
    ///
    /// Survives a failed newer request — a broken URL must not blank the
    /// model.
    pub fn current(&self) -> Option<(&str, &T)> {
        self.current.as_ref().map(|(url, t)| (url.as_str(), t))
    }

    pub(crate) fn loading_url(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Loading { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Change the desired URL.
    ///
    /// Any change supersedes in-flight work by bumping the generation.  A
    /// URL equal to the current desired one is ignored, except as a retry
    /// when that URL is in the `Failed` state — re-submitting is the only
    /// retry path this pipeline has.
    pub(crate) fn request(&mut self, url: Option<String>) -> Action {
        match url {
            None => {
                self.generation += 1;
                self.state = PipelineState::Idle;
                self.current = None;
                Action::Clear
            }
            Some(url) => {
                let retry_failed =
                    matches!(&self.state, PipelineState::Failed { url: failed } if *failed == url);
                if self.desired_url() == Some(url.as_str()) && !retry_failed {
                    return Action::Ignored;
                }
                self.generation += 1;
                self.state = PipelineState::Loading {
                    url: url.clone(),
                    generation: self.generation,
                };
                Action::StartLoad {
                    url,
                    generation: self.generation,
                }
            }
        }
    }

    /// Report the result of the load started at `generation`.
    ///
    /// A stale generation is discarded silently — no state change, no
    /// settle.  On success the previous payload is dropped and replaced; on
    /// failure the previous payload is kept.
    pub(crate) fn complete(&mut self, generation: u64, result: Result<T, LoadError>) -> Completion {
        if generation != self.generation {
            return Completion::Stale;
        }
        let PipelineState::Loading { url, .. } = &self.state else {
            return Completion::Stale;
        };
        let url = url.clone();
        match result {
            Ok(payload) => {
                self.current = Some((url.clone(), payload));
                self.state = PipelineState::Applied { url: url.clone() };
                Completion::Applied { url }
            }
            Err(error) => {
                self.state = PipelineState::Failed { url: url.clone() };
                Completion::Failed { url, error }
            }
        }
    }
}

/// Receiver side of one in-flight fetch.  Dropping it (on supersede or
/// clear) flags the task as cancelled so unstarted work exits early and a
/// late result dies at the closed channel.
struct InFlight {
    generation: u64,
    // Wrapped in Mutex so the resource is Sync, which Bevy requires.
    rx: Mutex<mpsc::Receiver<Result<DecodedTexture, LoadError>>>,
    cancelled: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// The texture pipeline, exposed to the presentation layer as a resource.
///
/// Drive it with [`set_desired_url`](Self::set_desired_url); observe it
/// through [`on_settled`](Self::on_settled) (for spinner-style UI that needs
/// the exactly-once completion signal) or by polling [`state`](Self::state).
#[derive(Resource, Default)]
pub struct ReskinPipeline {
    core: PipelineCore<Handle<Image>>,
    in_flight: Option<InFlight>,
    /// Material currently carrying the applied texture, if any.
    material: Option<Handle<StandardMaterial>>,
    /// Lazily created flat fallback, shared by all targets while no texture
    /// is applied.
    flat_material: Option<Handle<StandardMaterial>>,
    on_settled: Option<Box<dyn Fn(&LoadOutcome) + Send + Sync>>,
}

impl ReskinPipeline {
    pub fn state(&self) -> &PipelineState {
        self.core.state()
    }

    pub fn desired_url(&self) -> Option<&str> {
        self.core.desired_url()
    }

    /// The applied texture and its source URL, if one has resolved.
    pub fn current_texture(&self) -> Option<(&str, &Handle<Image>)> {
        self.core.current()
    }

    /// Register the settle callback.  Called exactly once per
    /// `set_desired_url` call that is not superseded before completing;
    /// superseded requests produce no call at all.
    pub fn on_settled(&mut self, callback: impl Fn(&LoadOutcome) + Send + Sync + 'static) {
        self.on_settled = Some(Box::new(callback));
    }

    /// Change the texture the model should show.
    ///
    /// `Some(url)` starts an off-thread fetch; any previous in-flight load
    /// is abandoned.  `None` clears the texture and reverts the targets to
    /// the flat fallback immediately, settling `Cleared` synchronously.
    pub fn set_desired_url(&mut self, url: Option<&str>) {
        match self.core.request(url.map(str::to_owned)) {
            Action::Ignored => {}
            Action::Clear => {
                self.in_flight = None;
                self.material = None;
                self.settle(LoadOutcome::Cleared);
            }
            Action::StartLoad { url, generation } => {
                let cancelled = Arc::new(AtomicBool::new(false));
                let flag = Arc::clone(&cancelled);
                let (tx, rx) = mpsc::sync_channel(1);
                worker_pool().spawn(move || {
                    // Skip the fetch entirely if a newer request already
                    // superseded this one.
                    if !flag.load(Ordering::Relaxed) {
                        tx.send(fetch_decoded(&url)).ok();
                    }
                });
                self.in_flight = Some(InFlight {
                    generation,
                    rx: Mutex::new(rx),
                    cancelled,
                });
            }
        }
    }

    /// Drain the in-flight fetch, upload an accepted result, and settle.
    pub(crate) fn poll(
        &mut self,
        images: &mut Assets<Image>,
        materials: &mut Assets<StandardMaterial>,
    ) {
        let Some(in_flight) = &self.in_flight else {
            return;
        };
        let generation = in_flight.generation;
        let message = in_flight
            .rx
            .lock()
            .expect("texture fetch thread poisoned")
            .try_recv();
        let result = match message {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return,
            Err(mpsc::TryRecvError::Disconnected) => Err(LoadError::Transport {
                url: self.core.loading_url().unwrap_or_default().to_owned(),
                message: "texture fetch thread exited without a result".to_owned(),
            }),
        };
        self.in_flight = None;

        let result = result.map(|decoded| images.add(decoded_to_image(decoded)));
        match self.core.complete(generation, result) {
            Completion::Applied { url } => {
                let (_, image) = self.core.current().expect("applied without a texture");
                let spec = MaterialSpec::Textured(image.clone());
                self.material = Some(materials.add(standard_material(&spec)));
                bevy::log::info!("applied generated texture from {url}");
                self.settle(LoadOutcome::Applied { url });
            }
            Completion::Failed { url, error } => {
                bevy::log::error!("texture load failed: {error}");
                self.settle(LoadOutcome::Failed { url, error });
            }
            Completion::Stale => {}
        }
    }

    /// The material every target should carry right now.
    pub(crate) fn desired_material(
        &mut self,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        if let Some(handle) = &self.material {
            return handle.clone();
        }
        self.flat_material
            .get_or_insert_with(|| materials.add(standard_material(&MaterialSpec::Flat)))
            .clone()
    }

    fn settle(&self, outcome: LoadOutcome) {
        if let Some(callback) = &self.on_settled {
            callback(&outcome);
        }
    }
}

/// Bevy system — drains the in-flight fetch each frame.
pub fn poll_fetch_tasks(
    mut pipeline: ResMut<ReskinPipeline>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    pipeline.poll(&mut images, &mut materials);
}

/// Bevy system — keeps every target bound to the current material.
///
/// Also what puts the flat fallback on a freshly resolved model before any
/// texture has loaded, so targets are never left unmaterialed.  Rebinds by
/// handle identity, making repeated runs with an unchanged spec no-ops.
pub fn apply_current_material(
    mut pipeline: ResMut<ReskinPipeline>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    targets: Query<(Entity, Option<&MeshMaterial3d<StandardMaterial>>), With<ReskinTarget>>,
    mut commands: Commands,
) {
    if targets.is_empty() {
        return;
    }
    let desired = pipeline.desired_material(&mut materials);
    for (entity, assigned) in &targets {
        if assigned.is_some_and(|m| m.0 == desired) {
            continue;
        }
        commands.entity(entity).insert(MeshMaterial3d(desired.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_png_bytes;
    use bevy::ecs::system::RunSystemOnce as _;
    use std::thread;
    use std::time::{Duration, Instant};

    fn transport_error(url: &str) -> LoadError {
        LoadError::Transport {
            url: url.to_owned(),
            message: "boom".to_owned(),
        }
    }

    #[test]
    fn happy_path_applies_and_reports() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { url, generation } =
            core.request(Some("https://x/good.png".to_owned()))
        else {
            panic!("expected a load to start");
        };
        assert_eq!(url, "https://x/good.png");
        assert!(matches!(core.state(), PipelineState::Loading { .. }));

        let completion = core.complete(generation, Ok(7));
        assert_eq!(
            completion,
            Completion::Applied {
                url: "https://x/good.png".to_owned()
            }
        );
        assert_eq!(core.current(), Some(("https://x/good.png", &7)));
        assert!(matches!(core.state(), PipelineState::Applied { .. }));
    }

    #[test]
    fn late_result_of_superseded_request_is_stale() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { generation: gen_a, .. } =
            core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        let Action::StartLoad { generation: gen_b, .. } =
            core.request(Some("https://x/b.png".to_owned()))
        else {
            panic!()
        };

        // B resolves first, then A's response straggles in.
        assert!(matches!(
            core.complete(gen_b, Ok(2)),
            Completion::Applied { .. }
        ));
        assert_eq!(core.complete(gen_a, Ok(1)), Completion::Stale);
        assert_eq!(core.current(), Some(("https://x/b.png", &2)));
    }

    #[test]
    fn stale_result_cannot_preempt_a_pending_newer_load() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { generation: gen_a, .. } =
            core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        let Action::StartLoad { generation: gen_b, .. } =
            core.request(Some("https://x/b.png".to_owned()))
        else {
            panic!()
        };

        // A arrives while B is still loading: discarded, B still pending.
        assert_eq!(core.complete(gen_a, Ok(1)), Completion::Stale);
        assert!(matches!(core.state(), PipelineState::Loading { .. }));
        assert!(matches!(
            core.complete(gen_b, Ok(2)),
            Completion::Applied { .. }
        ));
        assert_eq!(core.current(), Some(("https://x/b.png", &2)));
    }

    #[test]
    fn failure_keeps_the_previous_texture() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { generation, .. } = core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        core.complete(generation, Ok(1));

        let Action::StartLoad { generation, .. } = core.request(Some("https://x/b.png".to_owned()))
        else {
            panic!()
        };
        let completion = core.complete(generation, Err(transport_error("https://x/b.png")));
        assert!(matches!(completion, Completion::Failed { .. }));
        assert!(matches!(core.state(), PipelineState::Failed { .. }));
        // The model is not blanked: A's texture is still the current one.
        assert_eq!(core.current(), Some(("https://x/a.png", &1)));
    }

    #[test]
    fn clear_supersedes_in_flight_work() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { generation, .. } = core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        assert_eq!(core.request(None), Action::Clear);
        assert_eq!(core.state(), &PipelineState::Idle);
        // The abandoned load completes afterwards; it must not resurrect.
        assert_eq!(core.complete(generation, Ok(1)), Completion::Stale);
        assert_eq!(core.current(), None);
    }

    #[test]
    fn unchanged_url_is_ignored_but_failed_url_retries() {
        let mut core: PipelineCore<u32> = PipelineCore::default();
        let Action::StartLoad { generation, .. } = core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        assert_eq!(
            core.request(Some("https://x/a.png".to_owned())),
            Action::Ignored
        );
        core.complete(generation, Err(transport_error("https://x/a.png")));
        // Re-submitting the failed URL is the retry path.
        assert!(matches!(
            core.request(Some("https://x/a.png".to_owned())),
            Action::StartLoad { .. }
        ));
    }

    #[test]
    fn applying_and_clearing_releases_superseded_payloads() {
        let mut core: PipelineCore<Arc<()>> = PipelineCore::default();
        let first = Arc::new(());

        let Action::StartLoad { generation, .. } = core.request(Some("https://x/a.png".to_owned()))
        else {
            panic!()
        };
        core.complete(generation, Ok(Arc::clone(&first)));
        assert_eq!(Arc::strong_count(&first), 2);

        // A newer texture replaces the old payload, which must be dropped.
        let Action::StartLoad { generation, .. } = core.request(Some("https://x/b.png".to_owned()))
        else {
            panic!()
        };
        let second = Arc::new(());
        core.complete(generation, Ok(Arc::clone(&second)));
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(Arc::strong_count(&second), 2);

        // Clearing drops the current payload too.
        core.request(None);
        assert_eq!(Arc::strong_count(&second), 1);
    }

    // --- resource-level tests against a local texture host ------------------

    struct Recorder {
        outcomes: Arc<Mutex<Vec<LoadOutcome>>>,
    }

    impl Recorder {
        fn install(pipeline: &mut ReskinPipeline) -> Self {
            let outcomes = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&outcomes);
            pipeline.on_settled(move |outcome| sink.lock().unwrap().push(outcome.clone()));
            Self { outcomes }
        }

        fn outcomes(&self) -> Vec<LoadOutcome> {
            self.outcomes.lock().unwrap().clone()
        }
    }

    /// Serve the same PNG for every request on a background thread.
    fn spawn_png_host() -> u16 {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let body = test_png_bytes(8, 8);
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let response = if request.url().contains("bad") {
                    tiny_http::Response::from_data(b"no such texture".to_vec())
                        .with_status_code(404)
                } else {
                    tiny_http::Response::from_data(body.clone())
                };
                let _ = request.respond(response);
            }
        });
        port
    }

    fn poll_until_settled(
        pipeline: &mut ReskinPipeline,
        images: &mut Assets<Image>,
        materials: &mut Assets<StandardMaterial>,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while matches!(pipeline.state(), PipelineState::Loading { .. }) {
            assert!(Instant::now() < deadline, "fetch never completed");
            pipeline.poll(images, materials);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn fetch_applies_texture_and_settles_once() {
        let port = spawn_png_host();
        let url = format!("http://127.0.0.1:{port}/good.png");

        let mut pipeline = ReskinPipeline::default();
        let recorder = Recorder::install(&mut pipeline);
        let mut images = Assets::<Image>::default();
        let mut materials = Assets::<StandardMaterial>::default();

        pipeline.set_desired_url(Some(&url));
        poll_until_settled(&mut pipeline, &mut images, &mut materials);

        assert_eq!(pipeline.state(), &PipelineState::Applied { url: url.clone() });
        assert_eq!(recorder.outcomes(), vec![LoadOutcome::Applied { url: url.clone() }]);

        let (tagged_url, image_handle) = pipeline.current_texture().unwrap();
        assert_eq!(tagged_url, url);
        let material_handle = pipeline.material.clone().unwrap();
        let material = materials.get(&material_handle).unwrap();
        assert_eq!(material.base_color_texture.as_ref(), Some(image_handle));

        // Extra polls must not settle again.
        pipeline.poll(&mut images, &mut materials);
        assert_eq!(recorder.outcomes().len(), 1);
    }

    #[test]
    fn failed_fetch_settles_once_and_keeps_prior_material() {
        let port = spawn_png_host();
        let good = format!("http://127.0.0.1:{port}/good.png");
        let bad = format!("http://127.0.0.1:{port}/bad.png");

        let mut pipeline = ReskinPipeline::default();
        let recorder = Recorder::install(&mut pipeline);
        let mut images = Assets::<Image>::default();
        let mut materials = Assets::<StandardMaterial>::default();

        pipeline.set_desired_url(Some(&good));
        poll_until_settled(&mut pipeline, &mut images, &mut materials);
        let applied_material = pipeline.material.clone();

        pipeline.set_desired_url(Some(&bad));
        poll_until_settled(&mut pipeline, &mut images, &mut materials);

        assert_eq!(pipeline.state(), &PipelineState::Failed { url: bad.clone() });
        assert_eq!(
            recorder.outcomes(),
            vec![
                LoadOutcome::Applied { url: good.clone() },
                LoadOutcome::Failed {
                    url: bad,
                    error: LoadError::Http {
                        url: format!("http://127.0.0.1:{port}/bad.png"),
                        status: 404,
                    },
                },
            ]
        );
        // The good texture's material is still the one on the targets.
        assert_eq!(pipeline.material, applied_material);
        assert_eq!(pipeline.current_texture().unwrap().0, good);
    }

    #[test]
    fn rapid_fire_urls_settle_only_for_the_last() {
        let port = spawn_png_host();
        let url_a = format!("http://127.0.0.1:{port}/a.png");
        let url_b = format!("http://127.0.0.1:{port}/b.png");

        let mut pipeline = ReskinPipeline::default();
        let recorder = Recorder::install(&mut pipeline);
        let mut images = Assets::<Image>::default();
        let mut materials = Assets::<StandardMaterial>::default();

        // B supersedes A before anything is polled; A's receiver is dropped,
        // so whichever order the fetches finish in, only B can land.
        pipeline.set_desired_url(Some(&url_a));
        pipeline.set_desired_url(Some(&url_b));
        poll_until_settled(&mut pipeline, &mut images, &mut materials);

        assert_eq!(
            recorder.outcomes(),
            vec![LoadOutcome::Applied { url: url_b.clone() }]
        );
        assert_eq!(pipeline.current_texture().unwrap().0, url_b);
    }

    #[test]
    fn clearing_reverts_to_flat_and_settles_cleared() {
        let port = spawn_png_host();
        let url = format!("http://127.0.0.1:{port}/good.png");

        let mut pipeline = ReskinPipeline::default();
        let recorder = Recorder::install(&mut pipeline);
        let mut images = Assets::<Image>::default();
        let mut materials = Assets::<StandardMaterial>::default();

        pipeline.set_desired_url(Some(&url));
        poll_until_settled(&mut pipeline, &mut images, &mut materials);

        pipeline.set_desired_url(None);
        assert_eq!(pipeline.state(), &PipelineState::Idle);
        assert!(pipeline.current_texture().is_none());
        assert_eq!(
            recorder.outcomes(),
            vec![LoadOutcome::Applied { url }, LoadOutcome::Cleared]
        );
        // With no applied material the targets get the flat fallback again.
        let desired = pipeline.desired_material(&mut materials);
        assert!(materials.get(&desired).unwrap().base_color_texture.is_none());
    }

    // --- apply system --------------------------------------------------------

    #[test]
    fn apply_assigns_one_shared_flat_material_to_all_targets() {
        let mut world = World::new();
        world.init_resource::<ReskinPipeline>();
        world.init_resource::<Assets<StandardMaterial>>();
        let a = world.spawn((ReskinTarget, Mesh3d(Handle::default()))).id();
        let b = world.spawn((ReskinTarget, Mesh3d(Handle::default()))).id();

        world.run_system_once(apply_current_material).unwrap();

        let handle_a = world
            .entity(a)
            .get::<MeshMaterial3d<StandardMaterial>>()
            .unwrap()
            .0
            .clone();
        let handle_b = world
            .entity(b)
            .get::<MeshMaterial3d<StandardMaterial>>()
            .unwrap()
            .0
            .clone();
        assert_eq!(handle_a, handle_b);

        let materials = world.resource::<Assets<StandardMaterial>>();
        let material = materials.get(&handle_a).unwrap();
        assert!(material.base_color_texture.is_none());
        assert_eq!(material.perceptual_roughness, 0.5);
    }

    #[test]
    fn apply_is_idempotent_and_switches_with_the_current_material() {
        let mut world = World::new();
        world.init_resource::<ReskinPipeline>();
        world.init_resource::<Assets<StandardMaterial>>();
        let target = world.spawn((ReskinTarget, Mesh3d(Handle::default()))).id();

        world.run_system_once(apply_current_material).unwrap();
        let flat = world
            .entity(target)
            .get::<MeshMaterial3d<StandardMaterial>>()
            .unwrap()
            .0
            .clone();

        // Re-running with an unchanged spec keeps the identical handle.
        world.run_system_once(apply_current_material).unwrap();
        assert_eq!(
            world
                .entity(target)
                .get::<MeshMaterial3d<StandardMaterial>>()
                .unwrap()
                .0,
            flat
        );

        // Simulate a resolved texture; every target follows the new handle.
        let image: Handle<Image> = Handle::default();
        let textured = world
            .resource_mut::<Assets<StandardMaterial>>()
            .add(standard_material(&MaterialSpec::Textured(image)));
        world.resource_mut::<ReskinPipeline>().material = Some(textured.clone());

        world.run_system_once(apply_current_material).unwrap();
        assert_eq!(
            world
                .entity(target)
                .get::<MeshMaterial3d<StandardMaterial>>()
                .unwrap()
                .0,
            textured
        );
    }
}
