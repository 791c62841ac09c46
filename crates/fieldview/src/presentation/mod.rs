//! Presentations
//!
//! A presentation is one visualization request: a pipeline of stages built in
//! the render engine, plus the handles needed to change or tear it down later.
//!
//! ```text
//! Uninitialized ──create──▶ Built ──update──▶ Updated ◀─┐
//!       │                     │                 │  └─update
//!       └──────dispose────────┴─────dispose─────┴──▶ Disposed
//! ```
//!
//! A presentation is not thread-safe by itself; the registry keeps each one
//! behind its own async mutex, held for the whole of every operation.

pub mod params;
pub mod recipe;
mod variants;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use fieldview_script::{BridgeError, ObjectRef, Script, ScriptBridge, ScriptSession};
use serde::Serialize;

use crate::error::{PresentationError, PresentationResult};
use crate::types::{FieldDescriptor, PresentationId, SessionId};

use params::{PresentationParams, VariantKind, VariantParams};
use recipe::{Built, RecipeContext, StageLayout, StageNames, StageRecipe};

pub use params::{
    ColorMap, DisplayOptions, IntegrationDirection, MeshMode, ScalarBarRange, SliceOrientation, ViewMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresentationState {
    Uninitialized,
    Built,
    Updated,
    Disposed,
}

impl PresentationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationState::Uninitialized => "Uninitialized",
            PresentationState::Built => "Built",
            PresentationState::Updated => "Updated",
            PresentationState::Disposed => "Disposed",
        }
    }

    /// Whether stage handles may be read in this state.
    pub fn has_pipeline(&self) -> bool {
        matches!(self, PresentationState::Built | PresentationState::Updated)
    }
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipeline stage: a processing object and, for the primary stage, the
/// display object showing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageHandle {
    pub processing: ObjectRef,
    pub display: Option<ObjectRef>,
}

/// What the registry reports about a presentation.
#[derive(Debug, Clone, Serialize)]
pub struct PresentationSummary {
    pub id: PresentationId,
    pub variant: VariantKind,
    pub dataset: String,
    pub field: FieldDescriptor,
    pub state: PresentationState,
    pub created_at: DateTime<Utc>,
}

pub struct Presentation {
    id: PresentationId,
    session: SessionId,
    dataset: String,
    field: FieldDescriptor,
    params: PresentationParams,
    recipe: &'static dyn StageRecipe,
    names: StageNames,
    stages: Vec<StageHandle>,
    /// Built the first time data outside the custom range is hidden, then
    /// kept until dispose.
    threshold: Option<StageHandle>,
    view: Option<ObjectRef>,
    state: PresentationState,
    history: Vec<String>,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presentation")
            .field("id", &self.id)
            .field("variant", &self.kind())
            .field("dataset", &self.dataset)
            .field("field", &self.field)
            .field("state", &self.state)
            .field("stages", &self.stages.len())
            .field("thresholded", &self.threshold.is_some())
            .finish()
    }
}

impl Presentation {
    /// A presentation in state `Uninitialized`. Fails if `params` are invalid.
    pub fn new(
        id: PresentationId,
        session: SessionId,
        dataset: impl Into<String>,
        field: FieldDescriptor,
        params: PresentationParams,
    ) -> PresentationResult<Self> {
        params.validate()?;
        Ok(Self {
            id,
            session,
            dataset: dataset.into(),
            field,
            recipe: recipe::recipe_for(params.kind()),
            params,
            names: StageNames::new(id),
            stages: Vec::new(),
            threshold: None,
            view: None,
            state: PresentationState::Uninitialized,
            history: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> PresentationId {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn kind(&self) -> VariantKind {
        self.recipe.kind()
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    pub fn params(&self) -> &PresentationParams {
        &self.params
    }

    /// Owner tag of this presentation's engine objects.
    pub fn owner(&self) -> String {
        self.id.owner_tag()
    }

    /// Stage handles in creation order. Only available once built.
    pub fn stages(&self) -> PresentationResult<&[StageHandle]> {
        if !self.state.has_pipeline() {
            return Err(PresentationError::invalid_state("read the stages of", self.state));
        }
        Ok(&self.stages)
    }

    /// The last stage, which carries the display object.
    pub fn primary(&self) -> PresentationResult<&StageHandle> {
        self.stages()?
            .last()
            .ok_or_else(|| PresentationError::invalid_state("read the stages of", self.state))
    }

    /// The threshold stage, if one has been built.
    pub fn threshold(&self) -> PresentationResult<Option<&StageHandle>> {
        self.stages()?;
        Ok(self.threshold.as_ref())
    }

    /// The display the user currently sees: the threshold's while data
    /// outside the custom range is hidden, the primary one otherwise.
    pub fn active_display(&self) -> PresentationResult<&ObjectRef> {
        let stage = match &self.threshold {
            Some(threshold) if self.recipe.colored() && self.params.display.thresholded() => threshold,
            _ => self.primary()?,
        };
        stage
            .display
            .as_ref()
            .ok_or_else(|| PresentationError::invalid_state("read the display of", self.state))
    }

    pub fn view(&self) -> PresentationResult<&ObjectRef> {
        self.stages()?;
        self.view
            .as_ref()
            .ok_or_else(|| PresentationError::invalid_state("read the view of", self.state))
    }

    /// Every command that executed successfully, in order.
    pub fn script_dump(&self) -> &[String] {
        &self.history
    }

    pub fn summary(&self) -> PresentationSummary {
        PresentationSummary {
            id: self.id,
            variant: self.kind(),
            dataset: self.dataset.clone(),
            field: self.field.clone(),
            state: self.state,
            created_at: self.created_at,
        }
    }

    /// Build the pipeline.
    ///
    /// On failure the state stays `Uninitialized` with no handles, and the
    /// engine holds nothing on behalf of this presentation.
    pub async fn create(&mut self, bridge: &ScriptBridge) -> PresentationResult<()> {
        if self.state != PresentationState::Uninitialized {
            return Err(PresentationError::invalid_state("create", self.state));
        }

        let owner = self.owner();
        let ctx = RecipeContext {
            field: &self.field,
            params: &self.params,
        };
        let assembly = recipe::assemble(self.recipe, &self.names, &self.dataset, &ctx);

        let session = bridge.lock().await;
        session.execute_as(&owner, &assembly.script).await?;

        let fetched = fetch_all(&session, &assembly.layout, assembly.threshold.as_ref(), &assembly.view).await;
        let (stages, threshold, view) = match fetched {
            Ok(handles) => handles,
            Err(e) => {
                tracing::warn!(presentation = %self.id, "Failed to fetch handles after create: {}", e);
                if let Err(purge_err) = session.purge(&owner).await {
                    tracing::warn!(presentation = %self.id, "Purge failed: {}", purge_err);
                }
                return Err(e.into());
            }
        };
        drop(session);

        self.stages = stages;
        self.threshold = threshold;
        self.view = Some(view);
        self.history.push(assembly.script.render());
        self.state = PresentationState::Built;
        tracing::info!(
            presentation = %self.id,
            session = %self.session,
            "Built {} for {} ({} stages)",
            self.kind(),
            self.field,
            self.stages.len()
        );
        Ok(())
    }

    /// Change the parameters of a built pipeline in place.
    pub async fn update(&mut self, bridge: &ScriptBridge, params: PresentationParams) -> PresentationResult<()> {
        if !self.state.has_pipeline() {
            return Err(PresentationError::invalid_state("update", self.state));
        }
        if params.kind() != self.kind() {
            return Err(PresentationError::invalid_parameters(format!(
                "presentation {} is a {}, got {} parameters",
                self.id,
                self.kind(),
                params.kind()
            )));
        }
        params.validate()?;

        let mut params = params;
        if params.display.view_mode != self.params.display.view_mode {
            tracing::debug!(
                presentation = %self.id,
                "Ignoring view mode change to {}",
                params.display.view_mode.as_str()
            );
            params.display.view_mode = self.params.display.view_mode;
        }

        let view = self
            .view
            .clone()
            .ok_or_else(|| PresentationError::invalid_state("update", self.state))?;
        let script = {
            let ctx = RecipeContext {
                field: &self.field,
                params: &params,
            };
            let built = Built {
                names: &self.names,
                stages: &self.stages,
                threshold: self.threshold.as_ref(),
                view: &view,
            };
            recipe::reassemble(self.recipe, &ctx, &self.params, &built)
        };

        if !script.is_empty() {
            let owner = self.owner();
            let session = bridge.lock().await;
            session.execute_as(&owner, &script).await?;
            let layout: Vec<StageLayout> = self
                .stages
                .iter()
                .map(|stage| StageLayout {
                    processing: stage.processing.name.clone(),
                    display: stage.display.as_ref().map(|d| d.name.clone()),
                })
                .collect();
            let threshold = (self.threshold.is_some() || (self.recipe.colored() && params.display.thresholded()))
                .then(|| self.names.threshold_layout());
            let (stages, threshold, view) = fetch_all(&session, &layout, threshold.as_ref(), &view.name).await?;
            drop(session);

            self.stages = stages;
            self.threshold = threshold;
            self.view = Some(view);
            self.history.push(script.render());
        } else {
            tracing::debug!(presentation = %self.id, "Update changes nothing in the engine");
        }

        self.params = params;
        self.state = PresentationState::Updated;
        tracing::info!(presentation = %self.id, "Updated {}", self.kind());
        Ok(())
    }

    /// Release the pipeline. Idempotent, and never fails on engine errors:
    /// local bookkeeping is cleared regardless.
    pub async fn dispose(&mut self, bridge: &ScriptBridge) -> PresentationResult<()> {
        match self.state {
            PresentationState::Disposed => return Ok(()),
            PresentationState::Uninitialized => {
                self.state = PresentationState::Disposed;
                return Ok(());
            }
            PresentationState::Built | PresentationState::Updated => {}
        }

        let script = self.release_script();
        let owner = self.owner();
        {
            let session = bridge.lock().await;
            match session.execute_as(&owner, &script).await {
                Ok(()) => self.history.push(script.render()),
                Err(e) => {
                    tracing::warn!(presentation = %self.id, "Dispose failed, purging: {}", e);
                    match session.purge(&owner).await {
                        Ok(released) => {
                            tracing::debug!(presentation = %self.id, "Purged {} objects", released)
                        }
                        Err(e) => tracing::warn!(presentation = %self.id, "Purge failed: {}", e),
                    }
                }
            }
        }

        self.stages.clear();
        self.threshold = None;
        self.view = None;
        self.state = PresentationState::Disposed;
        tracing::info!(presentation = %self.id, session = %self.session, "Disposed {}", self.kind());
        Ok(())
    }

    /// Reverse creation order, each display before its processing object.
    fn release_script(&self) -> Script {
        let mut script = Script::new();
        for stage in self.threshold.iter().chain(self.stages.iter().rev()) {
            if let Some(display) = &stage.display {
                script.release(display);
            }
            script.release(&stage.processing);
        }
        if let Some(view) = &self.view {
            script.unbind(&view.name);
        }
        script
    }

    /// A string map describing the presentation.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let display = &self.params.display;
        let mut props = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            props.insert(key.to_string(), value);
        };

        set("name", self.kind().to_string());
        set("state", self.state.to_string());
        set("dataset", self.dataset.clone());
        set("fieldKind", self.field.kind.clone());
        set("fieldName", self.field.name.clone());
        set("colorMap", display.color_map.as_str().to_string());
        set("scalarBarRange", display.scalar_bar_range.as_str().to_string());
        set("visibility", display.visibility.to_string());
        set("scalarBarVisibility", display.scalar_bar_visibility.to_string());
        set("scalarBarMinValue", display.scalar_bar_min.to_string());
        set("scalarBarMaxValue", display.scalar_bar_max.to_string());
        set(
            "hideDataOutsideCustomRange",
            display.hide_data_outside_custom_range.to_string(),
        );
        set("viewMode", display.view_mode.as_str().to_string());

        match &self.params.variant {
            VariantParams::ScalarMap { component } => {
                set("displayedComponent", component.clone().unwrap_or_default());
            }
            VariantParams::Contour {
                nb_contours,
                component,
            } => {
                set("nbContours", nb_contours.to_string());
                set("contourComponent", component.clone().unwrap_or_default());
            }
            VariantParams::VectorField { scale_factor }
            | VariantParams::DeflectionShape { scale_factor } => {
                set("scaleFactor", scale_factor.to_string());
            }
            VariantParams::Slices {
                nb_slices,
                orientation,
            } => {
                set("nbSlices", nb_slices.to_string());
                set("sliceOrientation", orientation.as_str().to_string());
            }
            VariantParams::PointSprite { component, radius } => {
                set("displayedComponent", component.clone().unwrap_or_default());
                set("radius", radius.to_string());
            }
            VariantParams::MeshView { mesh_mode } => {
                set("meshMode", mesh_mode.as_str().to_string());
            }
            VariantParams::Plot3D {
                plane_normal,
                plane_pos,
            } => {
                set("planeNormalX", plane_normal[0].to_string());
                set("planeNormalY", plane_normal[1].to_string());
                set("planeNormalZ", plane_normal[2].to_string());
                set("planePos", plane_pos.to_string());
            }
            VariantParams::StreamLines {
                integration_direction,
            } => {
                set("intDirType", integration_direction.as_str().to_string());
            }
            VariantParams::CutSegment { point1, point2 } => {
                for (axis, (a, b)) in ["X", "Y", "Z"].iter().zip(point1.iter().zip(point2.iter())) {
                    set(&format!("cutPoint1_{}", axis), a.to_string());
                    set(&format!("cutPoint2_{}", axis), b.to_string());
                }
            }
        }

        props
    }

    /// [`properties`](Self::properties), with `visibility` read back from the
    /// engine. Another presentation opened in `Replace` mode hides this one's
    /// display without changing its parameters.
    pub async fn engine_properties(&self, bridge: &ScriptBridge) -> PresentationResult<BTreeMap<String, String>> {
        let mut props = self.properties();
        if !self.state.has_pipeline() {
            return Ok(props);
        }
        let described = bridge.describe(self.active_display()?).await?;
        if let Some(visible) = described["props"]["Visibility"].as_bool() {
            props.insert("visibility".to_string(), visible.to_string());
        }
        Ok(props)
    }
}

type Fetched = (Vec<StageHandle>, Option<StageHandle>, ObjectRef);

/// Fetch every stage handle, the threshold stage and the view handle.
async fn fetch_all(
    session: &ScriptSession<'_>,
    layout: &[StageLayout],
    threshold: Option<&StageLayout>,
    view: &str,
) -> Result<Fetched, BridgeError> {
    let mut stages = Vec::with_capacity(layout.len());
    for stage in layout {
        stages.push(fetch_stage(session, stage).await?);
    }
    let threshold = match threshold {
        Some(stage) => Some(fetch_stage(session, stage).await?),
        None => None,
    };
    let view = session.fetch_handle(view).await?;
    Ok((stages, threshold, view))
}

async fn fetch_stage(session: &ScriptSession<'_>, stage: &StageLayout) -> Result<StageHandle, BridgeError> {
    let processing = session.fetch_handle(&stage.processing).await?;
    let display = match &stage.display {
        Some(name) => Some(session.fetch_handle(name).await?),
        None => None,
    };
    Ok(StageHandle {
        processing,
        display,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldview_script::{spawn_quickjs_bridge, BridgeOptions};
    use tokio_test::{assert_err, assert_ok};

    fn bridge() -> ScriptBridge {
        spawn_quickjs_bridge(BridgeOptions::default()).unwrap()
    }

    fn presentation(id: u64, kind: VariantKind, field: FieldDescriptor) -> Presentation {
        Presentation::new(
            PresentationId(id),
            SessionId::new(),
            "mesh.med",
            field,
            PresentationParams::defaults_for(kind),
        )
        .unwrap()
    }

    fn field_for(kind: VariantKind) -> FieldDescriptor {
        match kind {
            VariantKind::VectorField | VariantKind::DeflectionShape | VariantKind::StreamLines => {
                FieldDescriptor::new("VECTOR", "displacement")
            }
            VariantKind::Contour => FieldDescriptor::new("CELLS", "pressure"),
            _ => FieldDescriptor::new("POINTS", "temperature"),
        }
    }

    #[tokio::test]
    async fn test_create_dispose_leaves_nothing_for_every_variant() {
        let bridge = bridge();
        for (i, kind) in VariantKind::ALL.into_iter().enumerate() {
            let mut p = presentation(i as u64 + 1, kind, field_for(kind));
            assert_ok!(p.create(&bridge).await);
            assert_eq!(p.state(), PresentationState::Built);
            assert!(bridge.live_objects(&p.owner()).await.unwrap() >= 2, "{}", kind);

            assert_ok!(p.dispose(&bridge).await);
            assert_eq!(p.state(), PresentationState::Disposed);
            assert_eq!(bridge.live_objects(&p.owner()).await.unwrap(), 0, "{}", kind);
            assert_err!(p.stages());
        }
    }

    #[tokio::test]
    async fn test_primary_stage_has_both_handles() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::DeflectionShape, field_for(VariantKind::DeflectionShape));
        p.create(&bridge).await.unwrap();

        let stages = p.stages().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].processing.kind, "MEDReader");
        assert!(stages[0].display.is_none());
        let primary = p.primary().unwrap();
        assert_eq!(primary.processing.kind, "WarpByVector");
        assert_eq!(primary.display.as_ref().unwrap().kind, "Representation");
        assert_eq!(p.view().unwrap().kind, "RenderView");
        for stage in stages {
            assert!(stage.processing.name.starts_with("p1_"));
        }
    }

    #[tokio::test]
    async fn test_stages_unreadable_before_create() {
        let p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        assert!(matches!(
            p.stages(),
            Err(PresentationError::InvalidState { state: PresentationState::Uninitialized, .. })
        ));
    }

    #[tokio::test]
    async fn test_create_twice_is_invalid() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        p.create(&bridge).await.unwrap();
        let err = p.create(&bridge).await.unwrap_err();
        assert!(matches!(err, PresentationError::InvalidState { operation: "create", .. }));
    }

    #[tokio::test]
    async fn test_failed_create_stays_uninitialized() {
        let bridge = bridge();
        // Empty locator is rejected by the reader.
        let mut p = Presentation::new(
            PresentationId(1),
            SessionId::new(),
            "",
            FieldDescriptor::new("POINTS", "t"),
            PresentationParams::defaults_for(VariantKind::ScalarMap),
        )
        .unwrap();
        let err = p.create(&bridge).await.unwrap_err();
        assert!(matches!(err, PresentationError::Engine(ref e) if e.is_engine()));
        assert_eq!(p.state(), PresentationState::Uninitialized);
        assert!(p.script_dump().is_empty());
        assert_eq!(bridge.live_objects(&p.owner()).await.unwrap(), 0);
        assert_err!(bridge.fetch_handle("p1_src").await);
    }

    #[tokio::test]
    async fn test_two_updates_leave_latest_parameters() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::Slices, field_for(VariantKind::Slices));
        p.create(&bridge).await.unwrap();

        let mut first = p.params().clone();
        first.variant = VariantParams::Slices {
            nb_slices: 3,
            orientation: SliceOrientation::NormalToY,
        };
        p.update(&bridge, first).await.unwrap();

        let mut second = p.params().clone();
        second.variant = VariantParams::Slices {
            nb_slices: 5,
            orientation: SliceOrientation::NormalToXYZ,
        };
        second.display.color_map = ColorMap::CoolToWarm;
        p.update(&bridge, second).await.unwrap();
        assert_eq!(p.state(), PresentationState::Updated);

        let primary = p.primary().unwrap().clone();
        let slice = bridge.describe(&primary.processing).await.unwrap();
        assert_eq!(slice["props"]["NumberOfSlices"], 5);
        let normal: Vec<f64> = slice["props"]["Normal"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(normal, [1.0, 1.0, 1.0]);
        let display = bridge.describe(primary.display.as_ref().unwrap()).await.unwrap();
        assert_eq!(display["props"]["ColorMap"], "Cool to Warm");

        for stage in p.stages().unwrap() {
            let fetched = bridge.fetch_handle(&stage.processing.name).await.unwrap();
            assert_eq!(fetched.id, stage.processing.id);
        }
        assert_eq!(p.properties()["nbSlices"], "5");
        assert_eq!(p.properties()["sliceOrientation"], "NormalToXYZ");
    }

    #[tokio::test]
    async fn test_update_without_changes_issues_nothing() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::MeshView, field_for(VariantKind::MeshView));
        p.create(&bridge).await.unwrap();
        let before = p.stages().unwrap().to_vec();

        p.update(&bridge, p.params().clone()).await.unwrap();
        assert_eq!(p.state(), PresentationState::Updated);
        assert_eq!(p.script_dump().len(), 1);
        assert_eq!(p.stages().unwrap(), before.as_slice());
    }

    #[tokio::test]
    async fn test_update_rejects_other_variant_and_bad_values() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::Contour, field_for(VariantKind::Contour));
        p.create(&bridge).await.unwrap();

        let err = p
            .update(&bridge, PresentationParams::defaults_for(VariantKind::ScalarMap))
            .await
            .unwrap_err();
        assert!(matches!(err, PresentationError::InvalidParameters(_)));

        let mut bad = p.params().clone();
        bad.variant = VariantParams::Contour {
            nb_contours: 0,
            component: None,
        };
        let err = p.update(&bridge, bad).await.unwrap_err();
        assert!(matches!(err, PresentationError::InvalidParameters(_)));
        assert_eq!(p.state(), PresentationState::Built);
        assert_eq!(p.properties()["nbContours"], "10");
    }

    #[tokio::test]
    async fn test_update_before_create_is_invalid() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        let params = p.params().clone();
        let err = p.update(&bridge, params).await.unwrap_err();
        assert!(matches!(err, PresentationError::InvalidState { operation: "update", .. }));
    }

    #[tokio::test]
    async fn test_view_mode_is_fixed_at_creation() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        p.create(&bridge).await.unwrap();
        let mut params = p.params().clone();
        params.display.view_mode = ViewMode::NewLayout;
        p.update(&bridge, params).await.unwrap();
        assert_eq!(p.params().display.view_mode, ViewMode::Overlap);
    }

    #[tokio::test]
    async fn test_hide_and_show_again() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::PointSprite, field_for(VariantKind::PointSprite));
        p.create(&bridge).await.unwrap();
        let display = p.primary().unwrap().display.clone().unwrap();

        let mut hidden = p.params().clone();
        hidden.display.visibility = false;
        p.update(&bridge, hidden).await.unwrap();
        assert_eq!(bridge.describe(&display).await.unwrap()["props"]["Visibility"], false);

        let mut shown = p.params().clone();
        shown.display.visibility = true;
        shown.variant = VariantParams::PointSprite {
            component: None,
            radius: 0.5,
        };
        p.update(&bridge, shown).await.unwrap();
        let props = bridge.describe(&display).await.unwrap()["props"].clone();
        assert_eq!(props["Visibility"], true);
        assert_eq!(props["Radius"], 0.5);
        assert_eq!(props["Representation"], "Point Gaussian");
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_best_effort() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::VectorField, field_for(VariantKind::VectorField));
        p.create(&bridge).await.unwrap();

        // Releasing the display behind the presentation's back makes the
        // release script fail; dispose still succeeds and cleans up.
        let display = p.primary().unwrap().display.clone().unwrap();
        let mut steal = Script::new();
        steal.release(&display);
        bridge.execute_as(&p.owner(), &steal).await.unwrap();

        assert_ok!(p.dispose(&bridge).await);
        assert_eq!(p.state(), PresentationState::Disposed);
        assert_eq!(bridge.live_objects(&p.owner()).await.unwrap(), 0);
        assert_ok!(p.dispose(&bridge).await);
    }

    #[tokio::test]
    async fn test_quotes_and_newlines_reach_the_engine_verbatim() {
        let bridge = bridge();
        let dataset = "/data/it's \"odd\"\nname.med\"); pvs.Delete(x); (\"";
        let field = FieldDescriptor::new("POINTS", "temp\"\\'\n");
        let mut p = Presentation::new(
            PresentationId(1),
            SessionId::new(),
            dataset,
            field.clone(),
            PresentationParams::defaults_for(VariantKind::ScalarMap),
        )
        .unwrap();
        p.create(&bridge).await.unwrap();

        let reader = p.stages().unwrap()[0].processing.clone();
        let props = bridge.describe(&reader).await.unwrap()["props"].clone();
        assert_eq!(props["FileName"], dataset);
        assert_eq!(props["Field"], serde_json::json!(["POINTS", field.name]));
    }

    #[tokio::test]
    async fn test_script_dump_records_each_command() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::Contour, field_for(VariantKind::Contour));
        p.create(&bridge).await.unwrap();
        let mut params = p.params().clone();
        params.variant = VariantParams::Contour {
            nb_contours: 4,
            component: Some("X".into()),
        };
        p.update(&bridge, params).await.unwrap();
        p.dispose(&bridge).await.unwrap();

        let dump = p.script_dump();
        assert_eq!(dump.len(), 3);
        assert!(dump[0].contains("pvs.MEDReader("));
        assert!(dump[1].contains("NumberOfContours: 4"));
        assert!(dump[2].contains("pvs.Delete("));
    }

    fn numbers(value: &serde_json::Value) -> Vec<f64> {
        value.as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).collect()
    }

    async fn visible(bridge: &ScriptBridge, display: &ObjectRef) -> serde_json::Value {
        bridge.describe(display).await.unwrap()["props"]["Visibility"].clone()
    }

    /// Live objects owned by no presentation, such as shared views.
    async fn shared_objects(bridge: &ScriptBridge) -> serde_json::Value {
        bridge.evaluate("__fv.liveCount(null)").await.unwrap()
    }

    #[tokio::test]
    async fn test_engine_error_leaves_update_unapplied() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        p.create(&bridge).await.unwrap();
        let before = p.stages().unwrap().to_vec();

        let display = p.primary().unwrap().display.clone().unwrap();
        let mut steal = Script::new();
        steal.release(&display);
        bridge.execute_as(&p.owner(), &steal).await.unwrap();

        let mut params = p.params().clone();
        params.display.color_map = ColorMap::CoolToWarm;
        let err = p.update(&bridge, params).await.unwrap_err();
        assert!(matches!(err, PresentationError::Engine(ref e) if e.is_engine()));
        assert_eq!(p.state(), PresentationState::Built);
        assert_eq!(p.params().display.color_map, ColorMap::BlueToRedRainbow);
        assert_eq!(p.stages().unwrap(), before.as_slice());
        assert_eq!(p.script_dump().len(), 1);

        assert_ok!(p.dispose(&bridge).await);
        assert_eq!(bridge.live_objects(&p.owner()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_range_reaches_the_display() {
        let bridge = bridge();
        let mut params = PresentationParams::defaults_for(VariantKind::ScalarMap);
        params.display.scalar_bar_range = ScalarBarRange::CustomRange;
        params.display.scalar_bar_min = -1.0;
        params.display.scalar_bar_max = 5.0;
        let mut p = Presentation::new(
            PresentationId(1),
            SessionId::new(),
            "mesh.med",
            field_for(VariantKind::ScalarMap),
            params,
        )
        .unwrap();
        p.create(&bridge).await.unwrap();

        let display = p.primary().unwrap().display.clone().unwrap();
        let props = bridge.describe(&display).await.unwrap()["props"].clone();
        assert_eq!(props["ScalarRangeMode"], "CustomRange");
        assert_eq!(numbers(&props["ScalarRange"]), [-1.0, 5.0]);
        assert!(p.threshold().unwrap().is_none());
        assert_eq!(p.properties()["scalarBarMaxValue"], "5");
    }

    #[tokio::test]
    async fn test_hiding_data_outside_range_swaps_to_threshold() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        p.create(&bridge).await.unwrap();
        let primary = p.primary().unwrap().display.clone().unwrap();

        let mut hidden = p.params().clone();
        hidden.display.scalar_bar_range = ScalarBarRange::CustomRange;
        hidden.display.scalar_bar_min = 2.0;
        hidden.display.scalar_bar_max = 8.0;
        hidden.display.hide_data_outside_custom_range = true;
        p.update(&bridge, hidden).await.unwrap();

        let threshold = p.threshold().unwrap().cloned().unwrap();
        assert_eq!(threshold.processing.kind, "Threshold");
        let filter = bridge.describe(&threshold.processing).await.unwrap()["props"].clone();
        assert_eq!(numbers(&filter["ThresholdRange"]), [2.0, 8.0]);
        let shown = threshold.display.clone().unwrap();
        assert_eq!(p.active_display().unwrap(), &shown);
        assert_eq!(visible(&bridge, &primary).await, false);
        let props = bridge.describe(&shown).await.unwrap()["props"].clone();
        assert_eq!(props["Visibility"], true);
        assert_eq!(numbers(&props["ScalarRange"]), [2.0, 8.0]);

        // Narrowing the range moves the existing threshold.
        let mut narrower = p.params().clone();
        narrower.display.scalar_bar_max = 4.0;
        p.update(&bridge, narrower).await.unwrap();
        assert_eq!(p.threshold().unwrap().unwrap().processing.id, threshold.processing.id);
        let filter = bridge.describe(&threshold.processing).await.unwrap()["props"].clone();
        assert_eq!(numbers(&filter["ThresholdRange"]), [2.0, 4.0]);

        let mut full = p.params().clone();
        full.display.hide_data_outside_custom_range = false;
        p.update(&bridge, full).await.unwrap();
        assert_eq!(visible(&bridge, &primary).await, true);
        assert_eq!(visible(&bridge, &shown).await, false);
        assert_eq!(p.active_display().unwrap(), &primary);
        assert!(p.threshold().unwrap().is_some());

        assert_ok!(p.dispose(&bridge).await);
        assert_eq!(bridge.live_objects(&p.owner()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_new_layout_views_go_with_their_presentation() {
        let bridge = bridge();
        let before = shared_objects(&bridge).await;

        for (i, mode) in [ViewMode::NewLayout, ViewMode::SplitView].into_iter().enumerate() {
            let mut params = PresentationParams::defaults_for(VariantKind::MeshView);
            params.display.view_mode = mode;
            let mut p = Presentation::new(
                PresentationId(i as u64 + 1),
                SessionId::new(),
                "mesh.med",
                field_for(VariantKind::MeshView),
                params,
            )
            .unwrap();
            p.create(&bridge).await.unwrap();
            assert_ne!(shared_objects(&bridge).await, before);
            p.dispose(&bridge).await.unwrap();
            assert_eq!(shared_objects(&bridge).await, before, "{}", mode.as_str());
        }

        let mut p = presentation(3, VariantKind::MeshView, field_for(VariantKind::MeshView));
        p.create(&bridge).await.unwrap();
        let view = p.view().unwrap().clone();
        p.dispose(&bridge).await.unwrap();
        assert_eq!(bridge.describe(&view).await.unwrap()["alive"], true);
    }

    #[tokio::test]
    async fn test_replaced_presentation_reports_hidden() {
        let bridge = bridge();
        let mut first = presentation(1, VariantKind::ScalarMap, field_for(VariantKind::ScalarMap));
        first.create(&bridge).await.unwrap();
        assert_eq!(first.engine_properties(&bridge).await.unwrap()["visibility"], "true");

        let mut params = PresentationParams::defaults_for(VariantKind::MeshView);
        params.display.view_mode = ViewMode::Replace;
        let mut second = Presentation::new(
            PresentationId(2),
            SessionId::new(),
            "mesh.med",
            field_for(VariantKind::MeshView),
            params,
        )
        .unwrap();
        second.create(&bridge).await.unwrap();

        assert_eq!(first.properties()["visibility"], "true");
        assert_eq!(first.engine_properties(&bridge).await.unwrap()["visibility"], "false");
        assert_eq!(second.engine_properties(&bridge).await.unwrap()["visibility"], "true");
    }

    #[tokio::test]
    async fn test_plot3d_moves_its_plane() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::Plot3D, FieldDescriptor::new("CELLS", "pressure"));
        p.create(&bridge).await.unwrap();
        let kinds: Vec<&str> = p.stages().unwrap().iter().map(|s| s.processing.kind.as_str()).collect();
        assert_eq!(kinds, ["MEDReader", "Slice", "CellDatatoPointData", "WarpByScalar"]);

        let mut params = p.params().clone();
        params.variant = VariantParams::Plot3D {
            plane_normal: [1.0, 0.0, 0.0],
            plane_pos: 0.25,
        };
        p.update(&bridge, params).await.unwrap();
        let slice = bridge.describe(&p.stages().unwrap()[1].processing).await.unwrap()["props"].clone();
        assert_eq!(numbers(&slice["Normal"]), [1.0, 0.0, 0.0]);
        assert_eq!(slice["Position"].as_f64(), Some(0.25));
        assert_eq!(p.properties()["planePos"], "0.25");
        assert_eq!(p.properties()["planeNormalX"], "1");
    }

    #[tokio::test]
    async fn test_stream_lines_change_direction() {
        let bridge = bridge();
        let mut p = presentation(1, VariantKind::StreamLines, field_for(VariantKind::StreamLines));
        p.create(&bridge).await.unwrap();
        let tracer = p.primary().unwrap().processing.clone();
        assert_eq!(tracer.kind, "StreamTracer");
        assert_eq!(
            bridge.describe(&tracer).await.unwrap()["props"]["IntegrationDirection"],
            "BOTH"
        );

        let mut params = p.params().clone();
        params.variant = VariantParams::StreamLines {
            integration_direction: IntegrationDirection::Backward,
        };
        p.update(&bridge, params).await.unwrap();
        assert_eq!(
            bridge.describe(&tracer).await.unwrap()["props"]["IntegrationDirection"],
            "BACKWARD"
        );
        assert_eq!(p.properties()["intDirType"], "Backward");
    }
}
