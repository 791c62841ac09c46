use fieldview_script::{Arg, Call, Script};

use super::optional;
use crate::presentation::params::{VariantKind, VariantParams, DEFAULT_NB_CONTOURS};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};
use crate::types::Association;

/// Iso-surfaces of the field.
///
/// Contouring needs point data, so a cell field is converted first. The
/// contour output is coloured at points whatever the field's own association.
pub struct Contour;

fn settings(params: &VariantParams) -> (u32, Option<&str>) {
    match params {
        VariantParams::Contour {
            nb_contours,
            component,
        } => (*nb_contours, component.as_deref()),
        _ => (DEFAULT_NB_CONTOURS, None),
    }
}

fn point_array(ctx: &RecipeContext<'_>, component: Option<&str>) -> Arg {
    let mut items = vec![
        Arg::from(Association::Points.as_str()),
        Arg::from(&ctx.field.name),
    ];
    if let Some(component) = component {
        items.push(Arg::from(component));
    }
    Arg::List(items)
}

impl StageRecipe for Contour {
    fn kind(&self) -> VariantKind {
        VariantKind::Contour
    }

    fn build(&self, ctx: &RecipeContext<'_>, pipeline: &mut Pipeline<'_>) {
        let (nb_contours, component) = settings(&ctx.params.variant);
        if ctx.field.association() == Association::Cells {
            pipeline.filter(Call::engine("CellDatatoPointData").arg(pipeline.input()));
        }
        pipeline.filter(
            Call::engine("Contour").arg(pipeline.input()).arg(Arg::Options(vec![
                ("ContourBy", point_array(ctx, None)),
                ("NumberOfContours", nb_contours.into()),
                ("Component", optional(component)),
            ])),
        );
    }

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        let (_, component) = settings(&ctx.params.variant);
        script.call(
            Call::engine("ColorBy")
                .arg(display)
                .arg(point_array(ctx, component)),
        );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let (nb_contours, component) = settings(&ctx.params.variant);
        let (old_nb, old_component) = settings(old);

        if nb_contours != old_nb || component != old_component {
            if let Some(filter) = built.filter() {
                script.call(Call::engine("Set").arg(filter).arg(Arg::Options(vec![
                    ("NumberOfContours", nb_contours.into()),
                    ("Component", optional(component)),
                ])));
            }
        }
        if component != old_component {
            if let Some(display) = built.display() {
                script.call(
                    Call::engine("ColorBy")
                        .arg(display)
                        .arg(point_array(ctx, component)),
                );
            }
        }
    }

    fn color_association(&self, _ctx: &RecipeContext<'_>) -> Association {
        Association::Points
    }
}
