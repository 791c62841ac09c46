//! The presentation variants.
//!
//! Each variant is a unit struct implementing [`StageRecipe`](super::recipe::StageRecipe).

mod contour;
mod cut_segment;
mod deflection_shape;
mod mesh_view;
mod plot3d;
mod point_sprite;
mod scalar_map;
mod slices;
mod stream_lines;
mod vector_field;

pub use contour::Contour;
pub use cut_segment::CutSegment;
pub use deflection_shape::DeflectionShape;
pub use mesh_view::MeshView;
pub use plot3d::Plot3D;
pub use point_sprite::PointSprite;
pub use scalar_map::ScalarMap;
pub use slices::Slices;
pub use stream_lines::StreamLines;
pub use vector_field::VectorField;

use fieldview_script::{Arg, Call, Script};

use super::recipe::RecipeContext;

/// `ColorBy(display, [association, field, component?])`.
fn color_by(ctx: &RecipeContext<'_>, display: Arg, component: Option<&str>, script: &mut Script) {
    script.call(
        Call::engine("ColorBy")
            .arg(display)
            .arg(ctx.color_array(component)),
    );
}

fn optional(value: Option<&str>) -> Arg {
    value.map_or(Arg::Null, Arg::from)
}
