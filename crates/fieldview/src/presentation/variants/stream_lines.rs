use fieldview_script::{Arg, Call, Script};

use crate::presentation::params::{IntegrationDirection, VariantKind, VariantParams};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};
use crate::types::Association;

/// Lines traced through a vector field from a cloud of seed points.
pub struct StreamLines;

fn direction(params: &VariantParams) -> IntegrationDirection {
    match params {
        VariantParams::StreamLines {
            integration_direction,
        } => *integration_direction,
        _ => IntegrationDirection::default(),
    }
}

impl StageRecipe for StreamLines {
    fn kind(&self) -> VariantKind {
        VariantKind::StreamLines
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        if ctx.field.association() == Association::Cells {
            pipeline.filter(Call::engine("CellDatatoPointData").arg(pipeline.input()));
        }
        pipeline.filter(
            Call::engine("StreamTracer").arg(pipeline.input()).arg(Arg::Options(vec![
                ("Vectors", ctx.array_at(Association::Points)),
                ("SeedType", "Point Cloud".into()),
                (
                    "IntegrationDirection",
                    direction(&ctx.params.variant).engine_name().into(),
                ),
            ])),
        );
    }

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        script.call(
            Call::engine("ColorBy")
                .arg(display)
                .arg(ctx.array_at(Association::Points)),
        );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let new = direction(&ctx.params.variant);
        if new == direction(old) {
            return;
        }
        if let Some(tracer) = built.filter() {
            script.call(Call::engine("Set").arg(tracer).arg(Arg::Options(vec![(
                "IntegrationDirection",
                new.engine_name().into(),
            )])));
        }
    }

    fn color_association(&self, _ctx: &RecipeContext<'_>) -> Association {
        Association::Points
    }
}
