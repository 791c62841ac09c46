use fieldview_script::{Arg, Call, Script};

use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_PLANE_NORMAL, DEFAULT_PLANE_POS};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};
use crate::types::Association;

/// A planar cut through the dataset, lifted along the plane normal by the
/// field values.
///
/// The cut is converted to point data before warping, so the display is
/// always coloured at points.
pub struct Plot3D;

fn settings(params: &VariantParams) -> ([f64; 3], f64) {
    match params {
        VariantParams::Plot3D {
            plane_normal,
            plane_pos,
        } => (*plane_normal, *plane_pos),
        _ => (DEFAULT_PLANE_NORMAL, DEFAULT_PLANE_POS),
    }
}

impl StageRecipe for Plot3D {
    fn kind(&self) -> VariantKind {
        VariantKind::Plot3D
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        let (normal, position) = settings(&ctx.params.variant);
        pipeline.filter(
            Call::engine("Slice").arg(pipeline.input()).arg(Arg::Options(vec![
                ("SliceType", "Plane".into()),
                ("Normal", Arg::list(normal)),
                ("NumberOfSlices", 1u32.into()),
                ("Position", position.into()),
            ])),
        );
        if ctx.field.association() == Association::Cells {
            pipeline.filter(Call::engine("CellDatatoPointData").arg(pipeline.input()));
        }
        pipeline.filter(
            Call::engine("WarpByScalar").arg(pipeline.input()).arg(Arg::Options(vec![
                ("Scalars", ctx.array_at(Association::Points)),
                ("Normal", Arg::list(normal)),
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
        let (normal, position) = settings(&ctx.params.variant);
        let (old_normal, old_position) = settings(old);
        if normal == old_normal && position == old_position {
            return;
        }

        // Stage 0 is the reader; the cut follows it directly.
        if let Some(slice) = built.stages.get(1) {
            let mut changes = Vec::new();
            if normal != old_normal {
                changes.push(("Normal", Arg::list(normal)));
            }
            if position != old_position {
                changes.push(("Position", position.into()));
            }
            script.call(Call::engine("Set").arg(&slice.processing).arg(Arg::Options(changes)));
        }
        if normal != old_normal {
            if let Some(warp) = built.filter() {
                script.call(
                    Call::engine("Set")
                        .arg(warp)
                        .arg(Arg::Options(vec![("Normal", Arg::list(normal))])),
                );
            }
        }
    }

    fn color_association(&self, _ctx: &RecipeContext<'_>) -> Association {
        Association::Points
    }
}
