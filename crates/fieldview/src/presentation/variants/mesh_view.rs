use fieldview_script::{Arg, Call, Script};

use crate::presentation::params::{MeshMode, VariantKind, VariantParams};
use crate::presentation::recipe::{Built, Pipeline, RecipeContext, StageRecipe};

/// The bare mesh, without any field colouring.
pub struct MeshView;

fn mesh_mode(params: &VariantParams) -> MeshMode {
    match params {
        VariantParams::MeshView { mesh_mode } => *mesh_mode,
        _ => MeshMode::default(),
    }
}

impl StageRecipe for MeshView {
    fn kind(&self) -> VariantKind {
        VariantKind::MeshView
    }

    fn build(&self, _ctx: &RecipeContext<'_>, _pipeline: &mut Pipeline<'_>) {}

    fn style(&self, ctx: &RecipeContext<'_>, display: Arg, script: &mut Script) {
        script
            .call(Call::engine("ColorBy").arg(display.clone()).arg(Arg::Null))
            .call(
                Call::engine("SetRepresentation")
                    .arg(display)
                    .arg(mesh_mode(&ctx.params.variant).engine_name()),
            );
    }

    fn rebuild(&self, ctx: &RecipeContext<'_>, old: &VariantParams, built: &Built<'_>, script: &mut Script) {
        let new = mesh_mode(&ctx.params.variant);
        if new == mesh_mode(old) {
            return;
        }
        if let Some(display) = built.display() {
            script.call(
                Call::engine("SetRepresentation")
                    .arg(display)
                    .arg(new.engine_name()),
            );
        }
    }

    fn colored(&self) -> bool {
        false
    }
}
