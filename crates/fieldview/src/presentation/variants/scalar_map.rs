use fieldview_script::{Arg, Call, Script};

use super::color_by;
use crate::presentation::params::{VariantKind, VariantParams};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// The field painted on the dataset surface.
pub struct ScalarMap;

fn component(params: &VariantParams) -> Option<&str> {
    match params {
        VariantParams::ScalarMap { component } => component.as_deref(),
        _ => None,
    }
}

impl StageRecipe for ScalarMap {
    fn kind(&self) -> VariantKind {
        VariantKind::ScalarMap
    }

    fn build(&self, _ctx: &RecipeContext<'_>, _pipeline: &mut Pipeline<'_>) {}

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        color_by(ctx, display.clone(), component(&ctx.params.variant), script);
        script.call(
            Call::engine("SetRepresentation")
                .arg(display)
                .arg("Surface"),
        );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let new = component(&ctx.params.variant);
        if new != component(old) {
            if let Some(display) = built.display() {
                color_by(ctx, display, new, script);
            }
        }
    }
}
