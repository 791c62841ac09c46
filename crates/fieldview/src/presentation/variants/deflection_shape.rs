use fieldview_script::{Arg, Call, Script};

use super::color_by;
use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_SCALE_FACTOR};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// Geometry warped by a vector field, then coloured by it.
pub struct DeflectionShape;

fn scale_factor(params: &VariantParams) -> f64 {
    match params {
        VariantParams::DeflectionShape { scale_factor } => *scale_factor,
        _ => DEFAULT_SCALE_FACTOR,
    }
}

impl StageRecipe for DeflectionShape {
    fn kind(&self) -> VariantKind {
        VariantKind::DeflectionShape
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        pipeline.filter(
            Call::engine("WarpByVector").arg(pipeline.input()).arg(Arg::Options(vec![
                ("Vectors", ctx.field_array()),
                ("ScaleFactor", scale_factor(&ctx.params.variant).into()),
            ])),
        );
    }

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        color_by(ctx, display, Some("Magnitude"), script);
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let new = scale_factor(&ctx.params.variant);
        if new != scale_factor(old) {
            if let Some(warp) = built.filter() {
                script.call(
                    Call::engine("Set")
                        .arg(warp)
                        .arg(Arg::Options(vec![("ScaleFactor", new.into())])),
                );
            }
        }
    }
}
