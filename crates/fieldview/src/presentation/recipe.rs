//! Stage recipes.
//!
//! A recipe knows which processing stages one variant puts between the
//! dataset reader and the display, and how to bind the display to the field.
//! Everything else a pipeline needs (reader, view, colour map, camera) is
//! assembled here and is the same for every variant.

use fieldview_script::{Arg, Call, ObjectRef, Script};

use super::params::{DisplayOptions, PresentationParams, ScalarBarRange, VariantKind, VariantParams};
use super::variants;
use super::StageHandle;
use crate::types::{Association, FieldDescriptor, PresentationId};

/// View type every presentation is shown in.
pub const RENDER_VIEW: &str = "RenderView";

/// One visualization kind.
pub trait StageRecipe: Send + Sync {
    fn kind(&self) -> VariantKind;

    /// Append the processing stages that follow the reader.
    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>);

    /// Bind the freshly shown display object to the field.
    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        script.call(
            Call::engine("ColorBy")
                .arg(display)
                .arg(ctx.color_array(None)),
        );
    }

    /// Emit the statements that bring an existing pipeline from `old` to
    /// `ctx.params`. Emits nothing when nothing this variant owns changed.
    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script);

    /// Whether the display is coloured by the field at all.
    fn colored(&self) -> bool {
        true
    }

    /// Association of the data reaching the display.
    fn color_association(&self, ctx: &RecipeContext<'_>) -> Association {
        ctx.field.association()
    }
}

/// Look up the recipe for a variant tag.
pub fn recipe_for(kind: VariantKind) -> &'static dyn StageRecipe {
    match kind {
        VariantKind::ScalarMap => &variants::ScalarMap,
        VariantKind::Contour => &variants::Contour,
        VariantKind::VectorField => &variants::VectorField,
        VariantKind::Slices => &variants::Slices,
        VariantKind::DeflectionShape => &variants::DeflectionShape,
        VariantKind::PointSprite => &variants::PointSprite,
        VariantKind::MeshView => &variants::MeshView,
        VariantKind::Plot3D => &variants::Plot3D,
        VariantKind::StreamLines => &variants::StreamLines,
        VariantKind::CutSegment => &variants::CutSegment,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Naming
// ─────────────────────────────────────────────────────────────────────────────

/// Interpreter binding names owned by one presentation, all prefixed `p<id>_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNames {
    prefix: String,
}

impl StageNames {
    pub fn new(id: PresentationId) -> Self {
        Self {
            prefix: format!("p{}_", id.0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn source(&self) -> String {
        format!("{}src", self.prefix)
    }

    pub fn stage(&self, index: usize) -> String {
        format!("{}obj{}", self.prefix, index)
    }

    pub fn display(&self) -> String {
        format!("{}disp", self.prefix)
    }

    pub fn view(&self) -> String {
        format!("{}view", self.prefix)
    }

    /// The threshold filter cutting away data outside the custom range.
    pub fn threshold(&self) -> String {
        format!("{}thr", self.prefix)
    }

    pub fn threshold_display(&self) -> String {
        format!("{}thr_disp", self.prefix)
    }

    pub fn threshold_layout(&self) -> StageLayout {
        StageLayout {
            processing: self.threshold(),
            display: Some(self.threshold_display()),
        }
    }
}

/// Binding names of one stage, before the handles are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    pub processing: String,
    pub display: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Recipe inputs
// ─────────────────────────────────────────────────────────────────────────────

pub struct RecipeContext<'a> {
    pub field: &'a FieldDescriptor,
    pub params: &'a PresentationParams,
}

impl RecipeContext<'_> {
    /// `[association, field]`, with an optional component.
    pub fn color_array(&self, component: Option<&str>) -> Arg {
        let mut items = vec![
            Arg::from(self.field.association().as_str()),
            Arg::from(&self.field.name),
        ];
        if let Some(component) = component {
            items.push(Arg::from(component));
        }
        Arg::List(items)
    }

    /// `[association, field]` as the array selector of a filter.
    pub fn field_array(&self) -> Arg {
        self.color_array(None)
    }

    /// `[association, field]` for an explicit association.
    pub fn array_at(&self, association: Association) -> Arg {
        Arg::list([association.as_str(), self.field.name.as_str()])
    }
}

/// Stages of a pipeline under construction.
pub struct Pipeline<'a> {
    names: &'a StageNames,
    script: Script,
    processing: Vec<String>,
}

impl<'a> Pipeline<'a> {
    /// Open the dataset and select the field.
    fn open(names: &'a StageNames, dataset: &str, field: &FieldDescriptor) -> Self {
        let source = names.source();
        let mut script = Script::new();
        script
            .bind(
                &source,
                Call::engine("MEDReader").arg(Arg::Options(vec![(
                    "FileName",
                    strip_file_scheme(dataset).into(),
                )])),
            )
            .call(
                Call::engine("SelectField")
                    .arg(Arg::name(&source))
                    .arg(&field.kind)
                    .arg(&field.name),
            );
        Self {
            names,
            script,
            processing: vec![source],
        }
    }

    /// The output of the last stage so far.
    pub fn input(&self) -> Arg {
        Arg::name(self.last())
    }

    /// Bind `call` as the next processing stage.
    pub fn filter(&mut self, call: Call) {
        let name = self.names.stage(self.processing.len() - 1);
        self.script.bind(&name, call);
        self.processing.push(name);
    }

    fn last(&self) -> &str {
        self.processing
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// A pipeline that exists in the engine.
pub struct Built<'a> {
    pub names: &'a StageNames,
    pub stages: &'a [StageHandle],
    /// The threshold stage, once one has been built.
    pub threshold: Option<&'a StageHandle>,
    pub view: &'a ObjectRef,
}

impl Built<'_> {
    pub fn primary(&self) -> Option<&StageHandle> {
        self.stages.last()
    }

    /// Processing object of the primary stage.
    pub fn processing(&self) -> Option<Arg> {
        self.primary().map(|stage| Arg::from(&stage.processing))
    }

    /// Display object of the primary stage.
    pub fn display(&self) -> Option<Arg> {
        self.primary()
            .and_then(|stage| stage.display.as_ref())
            .map(Arg::from)
    }

    /// The variant's own filter, i.e. the primary processing object unless it
    /// is the reader.
    pub fn filter(&self) -> Option<Arg> {
        if self.stages.len() > 1 {
            self.processing()
        } else {
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Assembly
// ─────────────────────────────────────────────────────────────────────────────

/// The creation command and the names it binds.
pub struct Assembly {
    pub script: Script,
    pub layout: Vec<StageLayout>,
    /// Present when the presentation starts out thresholded.
    pub threshold: Option<StageLayout>,
    pub view: String,
}

/// Build the creation command for a presentation.
pub fn assemble(
    recipe: &dyn StageRecipe,
    names: &StageNames,
    dataset: &str,
    ctx: &RecipeContext<'_>,
) -> Assembly {
    let mut pipeline = Pipeline::open(names, dataset, ctx.field);
    recipe.build(ctx, &mut pipeline);

    let Pipeline {
        mut script,
        processing,
        ..
    } = pipeline;
    let primary = processing.last().cloned().unwrap_or_else(|| names.source());
    let view = names.view();
    let display = names.display();
    let options = &ctx.params.display;
    let thresholded = recipe.colored() && options.thresholded();

    script
        .bind(
            &view,
            Call::engine("FindOrCreateView")
                .arg(RENDER_VIEW)
                .arg(options.view_mode.as_str()),
        )
        .bind(
            &display,
            Call::engine("Show")
                .arg(Arg::name(&primary))
                .arg(Arg::name(&view)),
        );

    recipe.style(ctx, Arg::name(&display), &mut script);

    let mut shown = Arg::name(&primary);
    if thresholded {
        build_threshold(recipe, ctx, names, Arg::name(&primary), Arg::name(&view), &mut script);
        script.call(
            Call::engine("Hide")
                .arg(Arg::name(&primary))
                .arg(Arg::name(&view)),
        );
        style_display(options, Arg::name(names.threshold_display()), Arg::name(&view), &mut script);
        shown = Arg::name(names.threshold());
    } else if recipe.colored() {
        style_display(options, Arg::name(&display), Arg::name(&view), &mut script);
    }

    if !options.visibility {
        script.call(Call::engine("Hide").arg(shown).arg(Arg::name(&view)));
    }

    script
        .call(Call::engine("ResetCamera").arg(Arg::name(&view)))
        .call(Call::engine("Render").arg(Arg::name(&view)));

    let count = processing.len();
    let layout = processing
        .into_iter()
        .enumerate()
        .map(|(i, processing)| StageLayout {
            processing,
            display: (i + 1 == count).then(|| display.clone()),
        })
        .collect();

    Assembly {
        script,
        layout,
        threshold: thresholded.then(|| names.threshold_layout()),
        view,
    }
}

/// Build the command that moves a built pipeline from `old` to `ctx.params`.
///
/// The result is empty when nothing differs. When the new parameters turn the
/// threshold on for the first time, the command binds the threshold stage
/// under [`StageNames::threshold_layout`].
pub fn reassemble(
    recipe: &dyn StageRecipe,
    ctx: &RecipeContext<'_>,
    old: &PresentationParams,
    built: &Built<'_>,
) -> Script {
    let mut script = Script::new();
    let (Some(processing), Some(display)) = (built.processing(), built.display()) else {
        return script;
    };
    let view = Arg::from(built.view);
    let new = &ctx.params.display;
    let old_display = &old.display;
    let was = recipe.colored() && old_display.thresholded();
    let now = recipe.colored() && new.thresholded();

    match (was, now) {
        (false, false) => {
            if recipe.colored() {
                restyle(new, old_display, display, view.clone(), &mut script);
            }
            if new.visibility != old_display.visibility {
                script.call(visibility(new.visibility, processing, view.clone()));
            }
        }
        (true, true) => {
            if let Some(threshold) = built.threshold {
                let filter = Arg::from(&threshold.processing);
                if new.custom_range() != old_display.custom_range() {
                    script.call(
                        Call::engine("Set")
                            .arg(filter.clone())
                            .arg(Arg::Options(vec![("ThresholdRange", range(new))])),
                    );
                }
                if let Some(shown) = threshold.display.as_ref().map(Arg::from) {
                    restyle(new, old_display, shown, view.clone(), &mut script);
                }
                if new.visibility != old_display.visibility {
                    script.call(visibility(new.visibility, filter, view.clone()));
                }
            }
        }
        (false, true) => {
            let (filter, shown) = match built.threshold {
                Some(threshold) => {
                    let filter = Arg::from(&threshold.processing);
                    script
                        .call(
                            Call::engine("Set")
                                .arg(filter.clone())
                                .arg(Arg::Options(vec![("ThresholdRange", range(new))])),
                        )
                        .call(Call::engine("Show").arg(filter.clone()).arg(view.clone()));
                    let shown = threshold
                        .display
                        .as_ref()
                        .map_or_else(|| Arg::name(built.names.threshold_display()), Arg::from);
                    (filter, shown)
                }
                None => {
                    build_threshold(recipe, ctx, built.names, processing.clone(), view.clone(), &mut script);
                    (
                        Arg::name(built.names.threshold()),
                        Arg::name(built.names.threshold_display()),
                    )
                }
            };
            script
                .call(Call::engine("Hide").arg(processing).arg(view.clone()))
                .call(
                    Call::engine("SetScalarBarVisibility")
                        .arg(display)
                        .arg(view.clone())
                        .arg(false),
                );
            style_display(new, shown, view.clone(), &mut script);
            if !new.visibility {
                script.call(visibility(false, filter, view.clone()));
            }
        }
        (true, false) => {
            if let Some(threshold) = built.threshold {
                script.call(
                    Call::engine("Hide")
                        .arg(&threshold.processing)
                        .arg(view.clone()),
                );
                if let Some(shown) = &threshold.display {
                    script.call(
                        Call::engine("SetScalarBarVisibility")
                            .arg(shown)
                            .arg(view.clone())
                            .arg(false),
                    );
                }
            }
            if new.visibility {
                script.call(visibility(true, processing, view.clone()));
            }
            if recipe.colored() {
                style_display(new, display, view.clone(), &mut script);
            }
        }
    }

    recipe.rebuild(ctx, &old.variant, built, &mut script);

    if !script.is_empty() {
        script.call(Call::engine("Render").arg(view));
    }
    script
}

/// Bind the threshold filter on `input` and show it in `view`.
fn build_threshold(
    recipe: &dyn StageRecipe,
    ctx: &RecipeContext<'_>,
    names: &StageNames,
    input: Arg,
    view: Arg,
    script: &mut Script,
) {
    let array = ctx.array_at(recipe.color_association(ctx));
    let filter = names.threshold();
    let display = names.threshold_display();
    script
        .bind(
            &filter,
            Call::engine("Threshold").arg(input).arg(Arg::Options(vec![
                ("Scalars", array.clone()),
                ("ThresholdRange", range(&ctx.params.display)),
            ])),
        )
        .bind(&display, Call::engine("Show").arg(Arg::name(&filter)).arg(view))
        .call(Call::engine("ColorBy").arg(Arg::name(&display)).arg(array));
}

/// Colour map, range and scalar bar of the display currently shown.
fn style_display(options: &DisplayOptions, display: Arg, view: Arg, script: &mut Script) {
    script
        .call(
            Call::engine("SetColorMap")
                .arg(display.clone())
                .arg(options.color_map.engine_name()),
        )
        .call(rescale(options, display.clone()))
        .call(
            Call::engine("SetScalarBarVisibility")
                .arg(display)
                .arg(view)
                .arg(options.scalar_bar_visibility),
        );
}

/// The parts of [`style_display`] that differ between `old` and `new`.
fn restyle(new: &DisplayOptions, old: &DisplayOptions, display: Arg, view: Arg, script: &mut Script) {
    if new.color_map != old.color_map {
        script.call(
            Call::engine("SetColorMap")
                .arg(display.clone())
                .arg(new.color_map.engine_name()),
        );
    }
    let custom = new.scalar_bar_range == ScalarBarRange::CustomRange;
    if new.scalar_bar_range != old.scalar_bar_range || (custom && new.custom_range() != old.custom_range()) {
        script.call(rescale(new, display.clone()));
    }
    if new.scalar_bar_visibility != old.scalar_bar_visibility {
        script.call(
            Call::engine("SetScalarBarVisibility")
                .arg(display)
                .arg(view)
                .arg(new.scalar_bar_visibility),
        );
    }
}

fn rescale(options: &DisplayOptions, display: Arg) -> Call {
    let call = Call::engine("RescaleTransferFunction")
        .arg(display)
        .arg(options.scalar_bar_range.as_str());
    match options.scalar_bar_range {
        ScalarBarRange::CustomRange => call.arg(options.scalar_bar_min).arg(options.scalar_bar_max),
        ScalarBarRange::AllTimesteps | ScalarBarRange::CurrentTimestep => call,
    }
}

fn range(options: &DisplayOptions) -> Arg {
    Arg::list([options.scalar_bar_min, options.scalar_bar_max])
}

fn visibility(visible: bool, processing: Arg, view: Arg) -> Call {
    let function = if visible { "Show" } else { "Hide" };
    Call::engine(function).arg(processing).arg(view)
}

fn strip_file_scheme(dataset: &str) -> &str {
    dataset.strip_prefix("file://").unwrap_or(dataset)
}
