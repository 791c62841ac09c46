use fieldview_script::{Arg, Call, Script};

use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_POINT1, DEFAULT_POINT2};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// The field sampled along the segment from `point1` to `point2`.
pub struct CutSegment;

fn points(params: &VariantParams) -> ([f64; 3], [f64; 3]) {
    match params {
        VariantParams::CutSegment { point1, point2 } => (*point1, *point2),
        _ => (DEFAULT_POINT1, DEFAULT_POINT2),
    }
}

impl StageRecipe for CutSegment {
    fn kind(&self) -> VariantKind {
        VariantKind::CutSegment
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        let (point1, point2) = points(&ctx.params.variant);
        pipeline.filter(
            Call::engine("PlotOverLine").arg(pipeline.input()).arg(Arg::Options(vec![
                ("Point1", Arg::list(point1)),
                ("Point2", Arg::list(point2)),
            ])),
        );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let (point1, point2) = points(&ctx.params.variant);
        let (old1, old2) = points(old);

        let mut changes = Vec::new();
        if point1 != old1 {
            changes.push(("Point1", Arg::list(point1)));
        }
        if point2 != old2 {
            changes.push(("Point2", Arg::list(point2)));
        }
        if changes.is_empty() {
            return;
        }
        if let Some(line) = built.filter() {
            script.call(Call::engine("Set").arg(line).arg(Arg::Options(changes)));
        }
    }
}
