//! Remote prompt-rewrite + image-generation client.
//!
//! Free text becomes a texture URL in two sequential calls: the rewrite
//! endpoint turns the user's description into a concise seamless-pattern
//! prompt, and the generation endpoint turns that prompt into a hosted
//! image.  Both are plain JSON POSTs; [`RemoteGenerator`] speaks the wire
//! contract and nothing else — what the services do internally is their
//! business.
//!
//! The blocking client never runs on the main thread.  Spawn a
//! [`PendingSkinPrompt`] component and `poll_prompt_tasks` will replace it
//! with a [`SkinPromptResult`] when the calls finish; the presentation layer
//! decides what to do with the URL (usually feed it to
//! [`ReskinPipeline::set_desired_url`](crate::ReskinPipeline::set_desired_url))
//! or how to display the error.
//!
//! # Usage
//! ```rust,ignore
//! let config = GeneratorConfig::from_env().expect("endpoint env vars not set");
//! commands.spawn(PendingSkinPrompt::submit(
//!     RemoteGenerator::new(config),
//!     "weathered brass with verdigris",
//!     None,
//! ));
//!
//! // Later, query for SkinPromptResult to consume the URL.
//! ```

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
    mpsc,
};

use bevy::prelude::*;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::resolver::worker_pool;

/// Endpoint locations for the two-step generation flow.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Prompt-rewrite endpoint: `{ input }` → `{ seamlessPatternPrompt }`.
    pub rewrite_url: String,
    /// Image-generation endpoint: `{ prompt, seed }` → `{ images: [{ url }] }`.
    pub generate_url: String,
}

impl GeneratorConfig {
    /// Read the endpoints from `RESKIN_REWRITE_URL` and
    /// `RESKIN_GENERATE_URL`.  Returns `None` when either is unset.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            rewrite_url: std::env::var("RESKIN_REWRITE_URL").ok()?,
            generate_url: std::env::var("RESKIN_GENERATE_URL").ok()?,
        })
    }
}

#[derive(Serialize)]
struct RewriteRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    seamless_pattern_prompt: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    seed: u64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    images: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: String,
}

/// Error body both endpoints use for non-2xx responses.
#[derive(Deserialize, Default)]
struct ApiErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Error returned when the generation flow cannot produce a texture URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The endpoint answered non-2xx; `message` is its reported error.
    Api { status: u16, message: String },
    /// The request never produced a response.
    Transport { message: String },
    /// A 2xx response did not match the wire contract.
    Malformed { message: String },
    /// The generation endpoint returned an empty `images` array.
    NoImages,
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::Api { status, message } => {
                write!(f, "generation service returned status {status}: {message}")
            }
            GenerateError::Transport { message } => {
                write!(f, "generation service unreachable: {message}")
            }
            GenerateError::Malformed { message } => {
                write!(f, "generation service response was malformed: {message}")
            }
            GenerateError::NoImages => write!(f, "generation service returned no images"),
        }
    }
}

impl std::error::Error for GenerateError {}

fn post_json<B: Serialize, R: DeserializeOwned>(url: &str, body: &B) -> Result<R, GenerateError> {
    match ureq::post(url).send_json(body) {
        Ok(response) => {
            let text = response.into_string().map_err(|e| GenerateError::Transport {
                message: e.to_string(),
            })?;
            serde_json::from_str(&text).map_err(|e| GenerateError::Malformed {
                message: e.to_string(),
            })
        }
        Err(ureq::Error::Status(status, response)) => {
            let text = response.into_string().unwrap_or_default();
            let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let mut message = body
                .error
                .unwrap_or_else(|| "no error message provided".to_owned());
            if let Some(details) = body.details {
                message = format!("{message}: {details}");
            }
            Err(GenerateError::Api { status, message })
        }
        Err(e) => Err(GenerateError::Transport {
            message: e.to_string(),
        }),
    }
}

/// Blocking two-step client.  Run it on the worker pool, not the main
/// thread — both calls can take several seconds.
#[derive(Clone, Debug)]
pub struct RemoteGenerator {
    config: GeneratorConfig,
}

impl RemoteGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Turn a free-text description into a seamless-pattern prompt.
    pub fn rewrite_prompt(&self, input: &str) -> Result<String, GenerateError> {
        let response: RewriteResponse =
            post_json(&self.config.rewrite_url, &RewriteRequest { input })?;
        Ok(response.seamless_pattern_prompt)
    }

    /// Generate an image for `prompt` and return its hosted URL.
    ///
    /// A missing `seed` is replaced with a random one so repeated
    /// submissions of the same prompt produce fresh variations.  An empty
    /// `images` array counts as a failure, same as a non-2xx response.
    pub fn generate_image(&self, prompt: &str, seed: Option<u64>) -> Result<String, GenerateError> {
        let seed = seed.unwrap_or_else(rand::random);
        let response: GenerateResponse =
            post_json(&self.config.generate_url, &GenerateRequest { prompt, seed })?;
        response
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or(GenerateError::NoImages)
    }

    /// The full flow: rewrite `input`, then generate from the rewritten
    /// prompt.
    pub fn generate_texture_url(
        &self,
        input: &str,
        seed: Option<u64>,
    ) -> Result<String, GenerateError> {
        let prompt = self.rewrite_prompt(input)?;
        bevy::log::debug!("rewritten pattern prompt: {prompt}");
        self.generate_image(&prompt, seed)
    }
}

/// Spawned onto an entity to run the generation flow in the background.
///
/// Dropping it (e.g. when the entity is despawned) sets a cancellation flag;
/// tasks that have not yet started see the flag and exit without making any
/// network calls.
#[derive(Component)]
pub struct PendingSkinPrompt {
    // Wrapped in Mutex so the struct is Sync, which Bevy's Component bound requires.
    rx: Mutex<mpsc::Receiver<Result<String, GenerateError>>>,
    /// Set to `true` on drop; the background task checks this before starting.
    cancelled: Arc<AtomicBool>,
}

impl Drop for PendingSkinPrompt {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl PendingSkinPrompt {
    /// Submit `input` for rewriting and generation on the worker pool.
    pub fn submit(generator: RemoteGenerator, input: impl Into<String>, seed: Option<u64>) -> Self {
        let input = input.into();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let (tx, rx) = mpsc::sync_channel(1);
        worker_pool().spawn(move || {
            // Skip the calls entirely if the entity was already despawned.
            if !flag.load(Ordering::Relaxed) {
                tx.send(generator.generate_texture_url(&input, seed)).ok();
            }
        });
        Self {
            rx: Mutex::new(rx),
            cancelled,
        }
    }
}

/// Added to the entity by [`poll_prompt_tasks`] when the flow finishes.
///
/// Displaying the error (or feeding the URL onward) is the presentation
/// layer's job; the texture pipeline proper only starts once a concrete URL
/// is handed to it.
#[derive(Component)]
pub struct SkinPromptResult(pub Result<String, GenerateError>);

/// Bevy system — polls pending generation tasks and publishes results.
pub fn poll_prompt_tasks(mut commands: Commands, tasks: Query<(Entity, &PendingSkinPrompt)>) {
    for (entity, pending) in &tasks {
        let poll = pending
            .rx
            .lock()
            .expect("prompt generation thread poisoned")
            .try_recv();
        let result = match poll {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => continue,
            Err(mpsc::TryRecvError::Disconnected) => Err(GenerateError::Transport {
                message: "prompt generation thread exited without a result".to_owned(),
            }),
        };
        if let Err(error) = &result {
            bevy::log::error!("skin generation failed: {error}");
        }
        commands
            .entity(entity)
            .remove::<PendingSkinPrompt>()
            .insert(SkinPromptResult(result));
    }
}
