//! Readiness state of the primary (voice-cloning) engine.
//!
//! [`TtsReadiness`] moves through its states exactly once per process:
//!
//! ```text
//! Unloaded ──spawn_primary_loader──▶ Loading ──load ok──▶ Ready
//!                                            ──load err─▶ LoadFailed
//! ```
//!
//! [`ReadinessFlag`] stores the state in an `Arc<AtomicU8>`.  Clones share
//! the same flag; request paths only ever call [`ReadinessFlag::get`] and
//! never wait for loading to finish.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::engine::PrimarySynthesizer;

// ---------------------------------------------------------------------------
// TtsReadiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsReadiness {
    /// Loading has not started (or the engine is disabled).
    #[default]
    Unloaded,
    /// The background loader is running.
    Loading,
    /// The primary engine accepts requests.
    Ready,
    /// Loading failed; the secondary engine handles every request.
    LoadFailed,
}

impl TtsReadiness {
    /// `true` only for [`TtsReadiness::Ready`].
    ///
    /// ```
    /// use sound_filter::tts::TtsReadiness;
    ///
    /// assert!(!TtsReadiness::Unloaded.is_ready());
    /// assert!(!TtsReadiness::Loading.is_ready());
    /// assert!(TtsReadiness::Ready.is_ready());
    /// assert!(!TtsReadiness::LoadFailed.is_ready());
    /// ```
    pub fn is_ready(&self) -> bool {
        matches!(self, TtsReadiness::Ready)
    }

    /// `true` once loading has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, TtsReadiness::Ready | TtsReadiness::LoadFailed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TtsReadiness::Unloaded => "Unloaded",
            TtsReadiness::Loading => "Loading",
            TtsReadiness::Ready => "Ready",
            TtsReadiness::LoadFailed => "Load failed",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            TtsReadiness::Unloaded => 0,
            TtsReadiness::Loading => 1,
            TtsReadiness::Ready => 2,
            TtsReadiness::LoadFailed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TtsReadiness::Loading,
            2 => TtsReadiness::Ready,
            3 => TtsReadiness::LoadFailed,
            _ => TtsReadiness::Unloaded,
        }
    }
}

// ---------------------------------------------------------------------------
// ReadinessFlag
// ---------------------------------------------------------------------------

/// Shared, lock-free readiness state.  Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicU8>);

impl ReadinessFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag pinned to `state`, for engines that are configured rather than
    /// loaded (and for tests).
    pub fn with_state(state: TtsReadiness) -> Self {
        Self(Arc::new(AtomicU8::new(state.to_u8())))
    }

    pub fn get(&self) -> TtsReadiness {
        TtsReadiness::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Unloaded → Loading`.  Returns `false` if loading already started.
    fn begin_loading(&self) -> bool {
        self.0
            .compare_exchange(
                TtsReadiness::Unloaded.to_u8(),
                TtsReadiness::Loading.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Loading → Ready | LoadFailed`.
    fn finish(&self, ok: bool) {
        let target = if ok {
            TtsReadiness::Ready
        } else {
            TtsReadiness::LoadFailed
        };
        let _ = self.0.compare_exchange(
            TtsReadiness::Loading.to_u8(),
            target.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Load `engine` on a background task, driving `flag` through its states.
///
/// Returns `None` when loading was already started through this flag.
pub fn spawn_primary_loader(
    flag: &ReadinessFlag,
    engine: Arc<dyn PrimarySynthesizer>,
) -> Option<JoinHandle<()>> {
    if !flag.begin_loading() {
        log::debug!("primary TTS loader already started ({})", flag.get().label());
        return None;
    }

    let flag = flag.clone();
    Some(tokio::spawn(async move {
        log::info!("loading primary TTS engine '{}'", engine.name());
        match engine.load().await {
            Ok(()) => {
                flag.finish(true);
                log::info!("primary TTS engine ready");
            }
            Err(e) => {
                flag.finish(false);
                log::warn!("primary TTS engine failed to load: {e}; using the secondary engine");
            }
        }
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
