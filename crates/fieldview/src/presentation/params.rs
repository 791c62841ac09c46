//! Presentation parameters and the display enumerations.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PresentationError, PresentationResult};

/// Tag naming one of the presentation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    ScalarMap,
    Contour,
    VectorField,
    Slices,
    DeflectionShape,
    PointSprite,
    MeshView,
    Plot3D,
    StreamLines,
    CutSegment,
}

impl VariantKind {
    pub const ALL: [VariantKind; 10] = [
        VariantKind::ScalarMap,
        VariantKind::Contour,
        VariantKind::VectorField,
        VariantKind::Slices,
        VariantKind::DeflectionShape,
        VariantKind::PointSprite,
        VariantKind::MeshView,
        VariantKind::Plot3D,
        VariantKind::StreamLines,
        VariantKind::CutSegment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::ScalarMap => "ScalarMap",
            VariantKind::Contour => "Contour",
            VariantKind::VectorField => "VectorField",
            VariantKind::Slices => "Slices",
            VariantKind::DeflectionShape => "DeflectionShape",
            VariantKind::PointSprite => "PointSprite",
            VariantKind::MeshView => "MeshView",
            VariantKind::Plot3D => "Plot3D",
            VariantKind::StreamLines => "StreamLines",
            VariantKind::CutSegment => "CutSegment",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// How the render view is chosen when a presentation is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    Replace,
    #[default]
    Overlap,
    NewLayout,
    SplitView,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Replace => "Replace",
            ViewMode::Overlap => "Overlap",
            ViewMode::NewLayout => "NewLayout",
            ViewMode::SplitView => "SplitView",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMap {
    #[default]
    BlueToRedRainbow,
    CoolToWarm,
}

impl ColorMap {
    /// Preset name understood by the engine.
    pub fn engine_name(&self) -> &'static str {
        match self {
            ColorMap::BlueToRedRainbow => "Blue to Red Rainbow",
            ColorMap::CoolToWarm => "Cool to Warm",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMap::BlueToRedRainbow => "BlueToRedRainbow",
            ColorMap::CoolToWarm => "CoolToWarm",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarBarRange {
    #[default]
    AllTimesteps,
    CurrentTimestep,
    /// The range given by `scalarBarMinValue` and `scalarBarMaxValue`.
    CustomRange,
}

impl ScalarBarRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarBarRange::AllTimesteps => "AllTimesteps",
            ScalarBarRange::CurrentTimestep => "CurrentTimestep",
            ScalarBarRange::CustomRange => "CustomRange",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshMode {
    #[default]
    Wireframe,
    Surface,
    SurfaceWithEdges,
}

impl MeshMode {
    /// Representation name understood by the engine.
    pub fn engine_name(&self) -> &'static str {
        match self {
            MeshMode::Wireframe => "Wireframe",
            MeshMode::Surface => "Surface",
            MeshMode::SurfaceWithEdges => "Surface With Edges",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeshMode::Wireframe => "Wireframe",
            MeshMode::Surface => "Surface",
            MeshMode::SurfaceWithEdges => "SurfaceWithEdges",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceOrientation {
    #[default]
    NormalToX,
    NormalToY,
    NormalToZ,
    NormalToXY,
    NormalToXZ,
    NormalToYZ,
    NormalToXYZ,
}

impl SliceOrientation {
    /// Plane normal for this orientation.
    pub fn normal(&self) -> [f64; 3] {
        match self {
            SliceOrientation::NormalToX => [1.0, 0.0, 0.0],
            SliceOrientation::NormalToY => [0.0, 1.0, 0.0],
            SliceOrientation::NormalToZ => [0.0, 0.0, 1.0],
            SliceOrientation::NormalToXY => [1.0, 1.0, 0.0],
            SliceOrientation::NormalToXZ => [1.0, 0.0, 1.0],
            SliceOrientation::NormalToYZ => [0.0, 1.0, 1.0],
            SliceOrientation::NormalToXYZ => [1.0, 1.0, 1.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SliceOrientation::NormalToX => "NormalToX",
            SliceOrientation::NormalToY => "NormalToY",
            SliceOrientation::NormalToZ => "NormalToZ",
            SliceOrientation::NormalToXY => "NormalToXY",
            SliceOrientation::NormalToXZ => "NormalToXZ",
            SliceOrientation::NormalToYZ => "NormalToYZ",
            SliceOrientation::NormalToXYZ => "NormalToXYZ",
        }
    }
}

/// Direction stream lines are integrated in from their seeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationDirection {
    #[default]
    Both,
    Forward,
    Backward,
}

impl IntegrationDirection {
    pub fn engine_name(&self) -> &'static str {
        match self {
            IntegrationDirection::Both => "BOTH",
            IntegrationDirection::Forward => "FORWARD",
            IntegrationDirection::Backward => "BACKWARD",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationDirection::Both => "Both",
            IntegrationDirection::Forward => "Forward",
            IntegrationDirection::Backward => "Backward",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// Settings shared by every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, rename = "viewMode")]
    pub view_mode: ViewMode,
    #[serde(default, rename = "colorMap")]
    pub color_map: ColorMap,
    #[serde(default, rename = "scalarBarRange")]
    pub scalar_bar_range: ScalarBarRange,
    #[serde(default = "default_true")]
    pub visibility: bool,
    #[serde(default = "default_true", rename = "scalarBarVisibility")]
    pub scalar_bar_visibility: bool,
    /// Lower bound of the custom range
    #[serde(default = "default_scalar_bar_min", rename = "scalarBarMinValue")]
    pub scalar_bar_min: f64,
    /// Upper bound of the custom range
    #[serde(default = "default_scalar_bar_max", rename = "scalarBarMaxValue")]
    pub scalar_bar_max: f64,
    /// Show only the cells whose values fall inside the custom range.
    #[serde(default, rename = "hideDataOutsideCustomRange")]
    pub hide_data_outside_custom_range: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::default(),
            color_map: ColorMap::default(),
            scalar_bar_range: ScalarBarRange::default(),
            visibility: true,
            scalar_bar_visibility: true,
            scalar_bar_min: DEFAULT_SCALAR_BAR_MIN,
            scalar_bar_max: DEFAULT_SCALAR_BAR_MAX,
            hide_data_outside_custom_range: false,
        }
    }
}

impl DisplayOptions {
    /// `(min, max)` of the custom range.
    pub fn custom_range(&self) -> (f64, f64) {
        (self.scalar_bar_min, self.scalar_bar_max)
    }

    /// Whether data outside the custom range is cut away. Only a custom
    /// range can hide data.
    pub fn thresholded(&self) -> bool {
        self.hide_data_outside_custom_range && self.scalar_bar_range == ScalarBarRange::CustomRange
    }

    pub fn validate(&self) -> PresentationResult<()> {
        let (min, max) = self.custom_range();
        if !min.is_finite() || !max.is_finite() {
            return Err(PresentationError::invalid_parameters(format!(
                "scalar bar bounds must be finite, got [{}, {}]",
                min, max
            )));
        }
        if self.scalar_bar_range == ScalarBarRange::CustomRange && min >= max {
            return Err(PresentationError::invalid_parameters(format!(
                "scalarBarMinValue must be below scalarBarMaxValue, got [{}, {}]",
                min, max
            )));
        }
        Ok(())
    }
}

pub const DEFAULT_SCALAR_BAR_MIN: f64 = 0.0;
pub const DEFAULT_SCALAR_BAR_MAX: f64 = 100.0;

pub const DEFAULT_NB_CONTOURS: u32 = 10;
pub const DEFAULT_NB_SLICES: u32 = 1;
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;
pub const DEFAULT_RADIUS: f64 = 0.05;
pub const DEFAULT_PLANE_NORMAL: [f64; 3] = [0.0, 0.0, 1.0];
/// Relative position of the cut plane along its normal, from 0 to 1.
pub const DEFAULT_PLANE_POS: f64 = 0.5;
pub const DEFAULT_POINT1: [f64; 3] = [0.0, 0.0, 0.0];
pub const DEFAULT_POINT2: [f64; 3] = [1.0, 1.0, 1.0];

fn default_scalar_bar_min() -> f64 {
    DEFAULT_SCALAR_BAR_MIN
}

fn default_scalar_bar_max() -> f64 {
    DEFAULT_SCALAR_BAR_MAX
}

fn default_nb_contours() -> u32 {
    DEFAULT_NB_CONTOURS
}

fn default_nb_slices() -> u32 {
    DEFAULT_NB_SLICES
}

fn default_scale_factor() -> f64 {
    DEFAULT_SCALE_FACTOR
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS
}

fn default_plane_normal() -> [f64; 3] {
    DEFAULT_PLANE_NORMAL
}

fn default_plane_pos() -> f64 {
    DEFAULT_PLANE_POS
}

fn default_point1() -> [f64; 3] {
    DEFAULT_POINT1
}

fn default_point2() -> [f64; 3] {
    DEFAULT_POINT2
}

fn all_finite(v: &[f64; 3]) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Variant-specific settings, tagged by `variant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum VariantParams {
    ScalarMap {
        #[serde(default)]
        component: Option<String>,
    },
    Contour {
        #[serde(default = "default_nb_contours", rename = "nbContours")]
        nb_contours: u32,
        #[serde(default)]
        component: Option<String>,
    },
    VectorField {
        #[serde(default = "default_scale_factor", rename = "scaleFactor")]
        scale_factor: f64,
    },
    Slices {
        #[serde(default = "default_nb_slices", rename = "nbSlices")]
        nb_slices: u32,
        #[serde(default)]
        orientation: SliceOrientation,
    },
    DeflectionShape {
        #[serde(default = "default_scale_factor", rename = "scaleFactor")]
        scale_factor: f64,
    },
    PointSprite {
        #[serde(default)]
        component: Option<String>,
        #[serde(default = "default_radius")]
        radius: f64,
    },
    MeshView {
        #[serde(default, rename = "meshMode")]
        mesh_mode: MeshMode,
    },
    /// A planar cut warped out of its plane by the field values.
    Plot3D {
        #[serde(default = "default_plane_normal", rename = "planeNormal")]
        plane_normal: [f64; 3],
        #[serde(default = "default_plane_pos", rename = "planePos")]
        plane_pos: f64,
    },
    StreamLines {
        #[serde(default, rename = "integrDir")]
        integration_direction: IntegrationDirection,
    },
    /// The field sampled along a segment.
    CutSegment {
        #[serde(default = "default_point1")]
        point1: [f64; 3],
        #[serde(default = "default_point2")]
        point2: [f64; 3],
    },
}

impl VariantParams {
    pub fn defaults_for(kind: VariantKind) -> Self {
        match kind {
            VariantKind::ScalarMap => VariantParams::ScalarMap { component: None },
            VariantKind::Contour => VariantParams::Contour {
                nb_contours: DEFAULT_NB_CONTOURS,
                component: None,
            },
            VariantKind::VectorField => VariantParams::VectorField {
                scale_factor: DEFAULT_SCALE_FACTOR,
            },
            VariantKind::Slices => VariantParams::Slices {
                nb_slices: DEFAULT_NB_SLICES,
                orientation: SliceOrientation::default(),
            },
            VariantKind::DeflectionShape => VariantParams::DeflectionShape {
                scale_factor: DEFAULT_SCALE_FACTOR,
            },
            VariantKind::PointSprite => VariantParams::PointSprite {
                component: None,
                radius: DEFAULT_RADIUS,
            },
            VariantKind::MeshView => VariantParams::MeshView {
                mesh_mode: MeshMode::default(),
            },
            VariantKind::Plot3D => VariantParams::Plot3D {
                plane_normal: DEFAULT_PLANE_NORMAL,
                plane_pos: DEFAULT_PLANE_POS,
            },
            VariantKind::StreamLines => VariantParams::StreamLines {
                integration_direction: IntegrationDirection::default(),
            },
            VariantKind::CutSegment => VariantParams::CutSegment {
                point1: DEFAULT_POINT1,
                point2: DEFAULT_POINT2,
            },
        }
    }

    pub fn kind(&self) -> VariantKind {
        match self {
            VariantParams::ScalarMap { .. } => VariantKind::ScalarMap,
            VariantParams::Contour { .. } => VariantKind::Contour,
            VariantParams::VectorField { .. } => VariantKind::VectorField,
            VariantParams::Slices { .. } => VariantKind::Slices,
            VariantParams::DeflectionShape { .. } => VariantKind::DeflectionShape,
            VariantParams::PointSprite { .. } => VariantKind::PointSprite,
            VariantParams::MeshView { .. } => VariantKind::MeshView,
            VariantParams::Plot3D { .. } => VariantKind::Plot3D,
            VariantParams::StreamLines { .. } => VariantKind::StreamLines,
            VariantParams::CutSegment { .. } => VariantKind::CutSegment,
        }
    }

    pub fn validate(&self) -> PresentationResult<()> {
        match self {
            VariantParams::Contour { nb_contours, .. } if *nb_contours < 1 => Err(
                PresentationError::invalid_parameters("nbContours must be at least 1"),
            ),
            VariantParams::Slices { nb_slices, .. } if *nb_slices < 1 => Err(
                PresentationError::invalid_parameters("nbSlices must be at least 1"),
            ),
            VariantParams::VectorField { scale_factor }
            | VariantParams::DeflectionShape { scale_factor }
                if !scale_factor.is_finite() =>
            {
                Err(PresentationError::invalid_parameters(format!(
                    "scaleFactor must be finite, got {}",
                    scale_factor
                )))
            }
            VariantParams::PointSprite { radius, .. } if !radius.is_finite() || *radius <= 0.0 => {
                Err(PresentationError::invalid_parameters(format!(
                    "radius must be a positive finite number, got {}",
                    radius
                )))
            }
            VariantParams::Plot3D { plane_normal, .. }
                if !all_finite(plane_normal) || plane_normal.iter().all(|c| *c == 0.0) =>
            {
                Err(PresentationError::invalid_parameters(format!(
                    "planeNormal must be a finite non-zero vector, got {:?}",
                    plane_normal
                )))
            }
            VariantParams::Plot3D { plane_pos, .. } if !(0.0..=1.0).contains(plane_pos) => {
                Err(PresentationError::invalid_parameters(format!(
                    "planePos must be between 0 and 1, got {}",
                    plane_pos
                )))
            }
            VariantParams::CutSegment { point1, point2 } if !all_finite(point1) || !all_finite(point2) => {
                Err(PresentationError::invalid_parameters("segment points must be finite"))
            }
            VariantParams::CutSegment { point1, point2 } if point1 == point2 => Err(
                PresentationError::invalid_parameters("segment points must differ"),
            ),
            _ => Ok(()),
        }
    }
}

/// Everything a client can set on a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationParams {
    #[serde(flatten)]
    pub display: DisplayOptions,
    #[serde(flatten)]
    pub variant: VariantParams,
}

impl PresentationParams {
    pub fn new(display: DisplayOptions, variant: VariantParams) -> Self {
        Self { display, variant }
    }

    /// Default display options and the variant's default settings.
    pub fn defaults_for(kind: VariantKind) -> Self {
        Self::new(DisplayOptions::default(), VariantParams::defaults_for(kind))
    }

    pub fn kind(&self) -> VariantKind {
        self.variant.kind()
    }

    pub fn validate(&self) -> PresentationResult<()> {
        self.display.validate()?;
        self.variant.validate()
    }

    /// Apply client-supplied keys on top of these parameters. Keys the
    /// resulting variant does not know are ignored.
    pub fn overlay(&self, overrides: Map<String, Value>) -> PresentationResult<Self> {
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        };
        merged.extend(overrides);
        serde_json::from_value(Value::Object(merged)).map_err(|e| PresentationError::InvalidParameters(e.to_string()))
    }
}
