// Presentation Registry - sessions and the presentations they own
//
// One registry per process, handed to the server state explicitly. Each
// presentation sits behind its own async mutex; registry maps are only ever
// touched between awaits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use fieldview_script::ScriptBridge;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{PresentationError, PresentationResult};
use crate::presentation::params::{PresentationParams, VariantKind, VariantParams};
use crate::presentation::{DisplayOptions, Presentation, PresentationState, PresentationSummary};
use crate::types::{FieldDescriptor, PresentationId, SessionId};

/// A registered presentation and the session that owns it
#[derive(Clone)]
struct Entry {
    session: SessionId,
    presentation: Arc<Mutex<Presentation>>,
}

/// Creates, updates and disposes presentations on behalf of client sessions
///
/// # Example
///
/// ```rust,ignore
/// let registry = PresentationRegistry::new(bridge, DisplayOptions::default());
/// let session = registry.open_session();
///
/// let id = registry
///     .create_presentation(session, VariantKind::ScalarMap, "mesh.med", field)
///     .await?;
/// registry.dispose_presentation(id).await?;
/// registry.close_session(session).await?;
/// ```
pub struct PresentationRegistry {
    bridge: ScriptBridge,
    /// Display options for presentations created without explicit parameters
    defaults: DisplayOptions,
    next_id: AtomicU64,
    presentations: DashMap<PresentationId, Entry>,
    sessions: DashMap<SessionId, BTreeSet<PresentationId>>,
}

impl PresentationRegistry {
    pub fn new(bridge: ScriptBridge, defaults: DisplayOptions) -> Self {
        Self {
            bridge,
            defaults,
            next_id: AtomicU64::new(1),
            presentations: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    pub fn defaults(&self) -> &DisplayOptions {
        &self.defaults
    }

    /// Open a new client session
    pub fn open_session(&self) -> SessionId {
        let session = SessionId::new();
        self.sessions.insert(session, BTreeSet::new());
        tracing::info!(session = %session, "Opened session");
        session
    }

    /// Create a presentation with the configured display defaults and the
    /// variant's default settings
    pub async fn create_presentation(
        &self,
        session: SessionId,
        variant: VariantKind,
        locator: &str,
        field: FieldDescriptor,
    ) -> PresentationResult<PresentationId> {
        let params = PresentationParams::new(self.defaults.clone(), VariantParams::defaults_for(variant));
        self.create_presentation_with(session, locator, field, params).await
    }

    /// Create a presentation with explicit parameters
    pub async fn create_presentation_with(
        &self,
        session: SessionId,
        locator: &str,
        field: FieldDescriptor,
        params: PresentationParams,
    ) -> PresentationResult<PresentationId> {
        if !self.sessions.contains_key(&session) {
            return Err(PresentationError::NotFound(format!("session {}", session)));
        }

        let id = PresentationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let presentation = Arc::new(Mutex::new(Presentation::new(id, session, locator, field, params)?));
        // Uncontended: nobody else can see this presentation yet.
        let mut guard = presentation.clone().lock_owned().await;

        {
            let Some(mut owned) = self.sessions.get_mut(&session) else {
                return Err(PresentationError::NotFound(format!("session {}", session)));
            };
            self.presentations.insert(
                id,
                Entry {
                    session,
                    presentation,
                },
            );
            owned.insert(id);
        }

        if let Err(e) = guard.create(&self.bridge).await {
            tracing::warn!(presentation = %id, session = %session, "Create failed: {}", e);
            self.forget(id, session);
            return Err(e);
        }

        Ok(id)
    }

    /// Change the parameters of a presentation
    pub async fn update_presentation(&self, id: PresentationId, params: PresentationParams) -> PresentationResult<()> {
        let entry = self.entry(id).ok_or_else(|| not_found(id))?;
        let mut presentation = entry.presentation.lock().await;
        if presentation.state() == PresentationState::Disposed {
            return Err(not_found(id));
        }
        presentation.update(&self.bridge, params).await
    }

    /// Update a presentation from a partial set of parameter keys
    ///
    /// The keys are merged over the current parameters while the presentation
    /// is locked, so concurrent patches never drop each other's keys.
    pub async fn patch_presentation(&self, id: PresentationId, overrides: Map<String, Value>) -> PresentationResult<()> {
        let entry = self.entry(id).ok_or_else(|| not_found(id))?;
        let mut presentation = entry.presentation.lock().await;
        if presentation.state() == PresentationState::Disposed {
            return Err(not_found(id));
        }
        let params = presentation.params().overlay(overrides)?;
        presentation.update(&self.bridge, params).await
    }

    /// Dispose a presentation
    ///
    /// Disposing an id that was already disposed is a no-op.
    pub async fn dispose_presentation(&self, id: PresentationId) -> PresentationResult<()> {
        let Some(entry) = self.entry(id) else {
            if self.was_issued(id) {
                tracing::debug!(presentation = %id, "Already disposed");
                return Ok(());
            }
            return Err(not_found(id));
        };

        let mut presentation = entry.presentation.lock().await;
        presentation.dispose(&self.bridge).await?;
        drop(presentation);
        self.forget(id, entry.session);
        Ok(())
    }

    /// Close a session, disposing every presentation it owns
    ///
    /// Waits for in-flight operations on those presentations.
    pub async fn close_session(&self, session: SessionId) -> PresentationResult<()> {
        let (_, ids) = self
            .sessions
            .remove(&session)
            .ok_or_else(|| PresentationError::NotFound(format!("session {}", session)))?;

        let count = ids.len();
        for id in ids {
            let Some(entry) = self.entry(id) else {
                continue;
            };
            let mut presentation = entry.presentation.lock().await;
            if let Err(e) = presentation.dispose(&self.bridge).await {
                tracing::warn!(presentation = %id, session = %session, "Error disposing: {}", e);
            }
            drop(presentation);
            self.presentations.remove(&id);
        }

        tracing::info!(session = %session, "Closed session ({} presentations)", count);
        Ok(())
    }

    /// Close every open session
    pub async fn shutdown(&self) {
        let sessions: Vec<SessionId> = self.sessions.iter().map(|s| *s.key()).collect();
        tracing::info!("Shutting down {} sessions", sessions.len());
        for session in sessions {
            // A connection may close its own session concurrently.
            if let Err(e) = self.close_session(session).await {
                tracing::debug!(session = %session, "Skipped on shutdown: {}", e);
            }
        }
    }

    /// Summaries of a session's presentations, in id order
    pub async fn list_presentations(&self, session: SessionId) -> PresentationResult<Vec<PresentationSummary>> {
        let ids: Vec<PresentationId> = self
            .sessions
            .get(&session)
            .map(|ids| ids.iter().copied().collect())
            .ok_or_else(|| PresentationError::NotFound(format!("session {}", session)))?;

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.entry(id) {
                summaries.push(entry.presentation.lock().await.summary());
            }
        }
        Ok(summaries)
    }

    pub async fn presentation_properties(&self, id: PresentationId) -> PresentationResult<BTreeMap<String, String>> {
        let entry = self.entry(id).ok_or_else(|| not_found(id))?;
        let presentation = entry.presentation.lock().await;
        match presentation.engine_properties(&self.bridge).await {
            Ok(props) => Ok(props),
            Err(e) => {
                tracing::warn!(presentation = %id, "Reporting stored visibility: {}", e);
                Ok(presentation.properties())
            }
        }
    }

    /// Every command executed for a presentation, in order
    pub async fn script_dump(&self, id: PresentationId) -> PresentationResult<Vec<String>> {
        let entry = self.entry(id).ok_or_else(|| not_found(id))?;
        let presentation = entry.presentation.lock().await;
        Ok(presentation.script_dump().to_vec())
    }

    pub fn presentation(&self, id: PresentationId) -> Option<Arc<Mutex<Presentation>>> {
        self.entry(id).map(|entry| entry.presentation)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn presentation_count(&self) -> usize {
        self.presentations.len()
    }

    fn entry(&self, id: PresentationId) -> Option<Entry> {
        self.presentations.get(&id).map(|entry| entry.clone())
    }

    fn was_issued(&self, id: PresentationId) -> bool {
        id.0 >= 1 && id.0 < self.next_id.load(Ordering::SeqCst)
    }

    fn forget(&self, id: PresentationId, session: SessionId) {
        self.presentations.remove(&id);
        if let Some(mut ids) = self.sessions.get_mut(&session) {
            ids.remove(&id);
        }
    }
}

fn not_found(id: PresentationId) -> PresentationError {
    PresentationError::NotFound(format!("presentation {}", id))
}
