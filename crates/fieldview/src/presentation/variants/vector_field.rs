use fieldview_script::{Arg, Call, Script};

use super::color_by;
use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_SCALE_FACTOR};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// Arrow glyphs oriented and scaled by a vector field.
pub struct VectorField;

fn scale_factor(params: &VariantParams) -> f64 {
    match params {
        VariantParams::VectorField { scale_factor } => *scale_factor,
        _ => DEFAULT_SCALE_FACTOR,
    }
}

impl StageRecipe for VectorField {
    fn kind(&self) -> VariantKind {
        VariantKind::VectorField
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        pipeline.filter(
            Call::engine("Glyph").arg(pipeline.input()).arg(Arg::Options(vec![
                ("GlyphType", "Arrow".into()),
                ("OrientationArray", ctx.field_array()),
                ("ScaleArray", ctx.field_array()),
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
            if let Some(glyph) = built.filter() {
                script.call(
                    Call::engine("Set")
                        .arg(glyph)
                        .arg(Arg::Options(vec![("ScaleFactor", new.into())])),
                );
            }
        }
    }
}
