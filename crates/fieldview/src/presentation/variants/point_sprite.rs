use fieldview_script::{Arg, Call, Script};

use super::color_by;
use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_RADIUS};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

const POINT_GAUSSIAN: &str = "Point Gaussian";

/// Every point drawn as a coloured sprite.
pub struct PointSprite;

fn settings(params: &VariantParams) -> (Option<&str>, f64) {
    match params {
        VariantParams::PointSprite { component, radius } => (component.as_deref(), *radius),
        _ => (None, DEFAULT_RADIUS),
    }
}

fn sprites(display: Arg, radius: f64) -> Call {
    Call::engine("SetRepresentation")
        .arg(display)
        .arg(POINT_GAUSSIAN)
        .arg(Arg::Options(vec![("Radius", radius.into())]))
}

impl StageRecipe for PointSprite {
    fn kind(&self) -> VariantKind {
        VariantKind::PointSprite
    }

    fn build(&self, _ctx: &RecipeContext<'_>, _pipeline: &mut Pipeline<'_>) {}

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        let (component, radius) = settings(&ctx.params.variant);
        color_by(ctx, display.clone(), component, script);
        script.call(sprites(display, radius));
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let Some(display) = built.display() else {
            return;
        };
        let (component, radius) = settings(&ctx.params.variant);
        let (old_component, old_radius) = settings(old);
        if component != old_component {
            color_by(ctx, display.clone(), component, script);
        }
        if radius != old_radius {
            script.call(sprites(display, radius));
        }
    }
}
