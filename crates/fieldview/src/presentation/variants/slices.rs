use fieldview_script::{Arg, Call, Script};

use crate::presentation::params::{SliceOrientation, VariantKind, VariantParams, DEFAULT_NB_SLICES};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// Parallel planar cuts through the dataset.
pub struct Slices;

fn settings(params: &VariantParams) -> (u32, SliceOrientation) {
    match params {
        VariantParams::Slices {
            nb_slices,
            orientation,
        } => (*nb_slices, *orientation),
        _ => (DEFAULT_NB_SLICES, SliceOrientation::default()),
    }
}

fn normal(orientation: SliceOrientation) -> Arg {
    Arg::list(orientation.normal())
}

impl StageRecipe for Slices {
    fn kind(&self) -> VariantKind {
        VariantKind::Slices
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        let (nb_slices, orientation) = settings(&ctx.params.variant);
        pipeline.filter(
            Call::engine("Slice").arg(pipeline.input()).arg(Arg::Options(vec![
                ("SliceType", "Plane".into()),
                ("Normal", normal(orientation)),
                ("NumberOfSlices", nb_slices.into()),
            ])),
        );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let (nb_slices, orientation) = settings(&ctx.params.variant);
        let (old_nb, old_orientation) = settings(old);

        let mut changes = Vec::new();
        if orientation != old_orientation {
            changes.push(("Normal", normal(orientation)));
        }
        if nb_slices != old_nb {
            changes.push(("NumberOfSlices", nb_slices.into()));
        }
        if changes.is_empty() {
            return;
        }
        if let Some(slice) = built.filter() {
            script.call(Call::engine("Set").arg(slice).arg(Arg::Options(changes)));
        }
    }
}
