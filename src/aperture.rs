//! Standard aperture resolution and the aperture table.

use std::collections::HashMap;
use std::f64::consts::PI;

use gerber_types::{Aperture, ApertureDefinition, ApertureMacro, Command, ExtendedCode};
use log::{debug, info, warn};

use crate::error::ApertureError;
use crate::geometry::{regular_polygon_vertices, ArcGeometry, BoundingBox};
use crate::macros::MacroAperture;
use crate::replay::GerberStatement;
use crate::spacial::distance;
use crate::types::Exposure;
use crate::Position;

/// Flashable geometry relative to the flash point, in file units.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapePrimitive {
    Circle {
        center: Position,
        diameter: f64,
    },
    /// Stadium, the shorter dimension is the diameter of the round ends.
    Obround {
        center: Position,
        width: f64,
        height: f64,
    },
    Outline {
        vertices: Vec<Position>,
    },
}

impl ShapePrimitive {
    /// Largest distance from the origin covered by the shape.
    pub fn max_extent(&self) -> f64 {
        let origin = Position::origin();
        match self {
            ShapePrimitive::Circle {
                center,
                diameter,
            } => distance(origin, *center) + diameter / 2.0,
            ShapePrimitive::Obround {
                center,
                width,
                height,
            } => distance(origin, *center) + width.max(*height) / 2.0,
            ShapePrimitive::Outline {
                vertices,
            } => vertices
                .iter()
                .map(|vertex| distance(origin, *vertex))
                .fold(0.0, f64::max),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            ShapePrimitive::Circle {
                center,
                diameter,
            } => BoundingBox::around(*center, diameter / 2.0),
            ShapePrimitive::Obround {
                center,
                width,
                height,
            } => BoundingBox {
                min: Position::new(center.x - width / 2.0, center.y - height / 2.0),
                max: Position::new(center.x + width / 2.0, center.y + height / 2.0),
            },
            ShapePrimitive::Outline {
                vertices,
            } => BoundingBox::from_points(vertices),
        }
    }
}

/// Vertices of an obround, the round ends approximated with `steps` points each.
pub fn obround_vertices(center: Position, width: f64, height: f64, steps: usize) -> Vec<Position> {
    let steps = steps.max(2);
    let mut vertices = Vec::with_capacity(steps * 2);
    let radius = width.min(height) / 2.0;
    let (cap_offset, start_angle) = if width >= height {
        (Position::new(width / 2.0 - radius, 0.0), -PI / 2.0)
    } else {
        (Position::new(0.0, height / 2.0 - radius), 0.0)
    };

    for (cap_center, cap_start) in [
        (center + cap_offset.coords, start_angle),
        (center - cap_offset.coords, start_angle + PI),
    ] {
        let cap = ArcGeometry {
            center: cap_center,
            radius,
            start_angle: cap_start,
            sweep_angle: PI,
        };
        vertices.extend(cap.generate_points(steps));
    }
    vertices
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApertureShape {
    Circle {
        diameter: f64,
        hole: Option<f64>,
    },
    Rectangle {
        width: f64,
        height: f64,
        hole: Option<f64>,
    },
    Obround {
        width: f64,
        height: f64,
        hole: Option<f64>,
    },
    Polygon {
        diameter: f64,
        vertices: u32,
        /// degrees
        rotation: f64,
        hole: Option<f64>,
    },
    Macro(MacroAperture),
}

/// One primitive of a flash in stamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashPrimitive {
    pub exposure: Exposure,
    pub shape: ShapePrimitive,
}

impl ApertureShape {
    pub fn from_definition(
        code: i32,
        aperture: &Aperture,
        macros: &HashMap<String, &ApertureMacro>,
    ) -> Result<Self, ApertureError> {
        let positive = |parameter: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(value)
            } else {
                Err(ApertureError::InvalidDimension {
                    code,
                    parameter,
                    value,
                })
            }
        };
        let hole = |hole_diameter: Option<f64>, limit: f64| match hole_diameter {
            None => Ok(None),
            Some(hole) if hole == 0.0 => Ok(None),
            Some(hole) if !hole.is_finite() || hole < 0.0 => Err(ApertureError::InvalidDimension {
                code,
                parameter: "hole diameter",
                value: hole,
            }),
            Some(hole) if hole >= limit => Err(ApertureError::HoleTooLarge {
                code,
                hole,
            }),
            Some(hole) => Ok(Some(hole)),
        };

        let shape = match aperture {
            Aperture::Circle(circle) => {
                let diameter = positive("diameter", circle.diameter)?;
                ApertureShape::Circle {
                    diameter,
                    hole: hole(circle.hole_diameter, diameter)?,
                }
            }
            Aperture::Rectangle(rectangle) => {
                let (width, height) = (positive("x", rectangle.x)?, positive("y", rectangle.y)?);
                ApertureShape::Rectangle {
                    width,
                    height,
                    hole: hole(rectangle.hole_diameter, width.min(height))?,
                }
            }
            Aperture::Obround(obround) => {
                let (width, height) = (positive("x", obround.x)?, positive("y", obround.y)?);
                ApertureShape::Obround {
                    width,
                    height,
                    hole: hole(obround.hole_diameter, width.min(height))?,
                }
            }
            Aperture::Polygon(polygon) => {
                let diameter = positive("diameter", polygon.diameter)?;
                let vertices = polygon.vertices as u32;
                if !(3..=12).contains(&vertices) {
                    return Err(ApertureError::InvalidPolygon {
                        code,
                        vertices,
                    });
                }
                // inscribed circle
                let limit = diameter * (PI / vertices as f64).cos();
                ApertureShape::Polygon {
                    diameter,
                    vertices,
                    rotation: polygon.rotation.unwrap_or(0.0),
                    hole: hole(polygon.hole_diameter, limit)?,
                }
            }
            Aperture::Macro(name, args) => {
                let definition = macros
                    .get(name)
                    .ok_or_else(|| ApertureError::UnknownMacro {
                        code,
                        name: name.clone(),
                    })?;
                ApertureShape::Macro(MacroAperture::resolve(definition, args.as_ref())?)
            }
        };
        Ok(shape)
    }

    pub fn is_macro(&self) -> bool {
        matches!(self, ApertureShape::Macro(_))
    }

    pub fn is_circle(&self) -> bool {
        matches!(self, ApertureShape::Circle { .. })
    }

    /// Largest distance from the aperture center covered by the aperture.
    pub fn max_extent(&self) -> f64 {
        match self {
            ApertureShape::Circle {
                diameter,
                ..
            }
            | ApertureShape::Polygon {
                diameter,
                ..
            } => diameter / 2.0,
            ApertureShape::Rectangle {
                width,
                height,
                ..
            } => (width * width + height * height).sqrt() / 2.0,
            ApertureShape::Obround {
                width,
                height,
                ..
            } => width.max(*height) / 2.0,
            ApertureShape::Macro(macro_aperture) => macro_aperture.max_extent(),
        }
    }

    /// Width of the swath the aperture leaves when moved in the direction `angle` (radians).
    ///
    /// A rotated rectangle sweeps a hexagon, the stroke is approximated by a rectangle of the projected width.
    pub fn stroke_width_at(&self, angle: f64) -> f64 {
        let (sin, cos) = angle.sin_cos();
        match self {
            ApertureShape::Circle {
                diameter,
                ..
            } => *diameter,
            ApertureShape::Rectangle {
                width,
                height,
                ..
            } => width * sin.abs() + height * cos.abs(),
            ApertureShape::Obround {
                width,
                height,
                ..
            } => {
                if width >= height {
                    (width - height) * sin.abs() + height
                } else {
                    (height - width) * cos.abs() + width
                }
            }
            ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
                ..
            } => {
                let projections: Vec<f64> = regular_polygon_vertices(*diameter, *vertices as usize, *rotation)
                    .iter()
                    .map(|vertex| -vertex.x * sin + vertex.y * cos)
                    .collect();
                let max = projections
                    .iter()
                    .copied()
                    .fold(f64::MIN, f64::max);
                let min = projections
                    .iter()
                    .copied()
                    .fold(f64::MAX, f64::min);
                max - min
            }
            ApertureShape::Macro(macro_aperture) => macro_aperture.max_extent() * 2.0,
        }
    }

    /// Grows the outer extent by `compensation` and shrinks the hole, a hole that closes is dropped.
    pub fn compensated(&self, compensation: f64) -> ApertureShape {
        if compensation == 0.0 {
            return self.clone();
        }
        let hole = |hole: &Option<f64>| hole.map(|hole| hole - compensation).filter(|hole| *hole > 0.0);
        match self {
            ApertureShape::Circle {
                diameter,
                hole: hole_diameter,
            } => ApertureShape::Circle {
                diameter: diameter + compensation,
                hole: hole(hole_diameter),
            },
            ApertureShape::Rectangle {
                width,
                height,
                hole: hole_diameter,
            } => ApertureShape::Rectangle {
                width: width + compensation,
                height: height + compensation,
                hole: hole(hole_diameter),
            },
            ApertureShape::Obround {
                width,
                height,
                hole: hole_diameter,
            } => ApertureShape::Obround {
                width: width + compensation,
                height: height + compensation,
                hole: hole(hole_diameter),
            },
            ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
                hole: hole_diameter,
            } => ApertureShape::Polygon {
                diameter: diameter + compensation,
                vertices: *vertices,
                rotation: *rotation,
                hole: hole(hole_diameter),
            },
            ApertureShape::Macro(macro_aperture) => ApertureShape::Macro(MacroAperture {
                compensation: macro_aperture.compensation + compensation,
                ..macro_aperture.clone()
            }),
        }
    }

    /// The outer shape without any hole, used for flashes and line end caps.
    pub fn outer_shape(&self) -> Option<ShapePrimitive> {
        let center = Position::origin();
        match self {
            ApertureShape::Circle {
                diameter,
                ..
            } => Some(ShapePrimitive::Circle {
                center,
                diameter: *diameter,
            }),
            ApertureShape::Rectangle {
                width,
                height,
                ..
            } => Some(ShapePrimitive::Outline {
                vertices: BoundingBox {
                    min: Position::new(-width / 2.0, -height / 2.0),
                    max: Position::new(width / 2.0, height / 2.0),
                }
                .vertices(),
            }),
            ApertureShape::Obround {
                width,
                height,
                ..
            } => Some(match width == height {
                true => ShapePrimitive::Circle {
                    center,
                    diameter: *width,
                },
                false => ShapePrimitive::Obround {
                    center,
                    width: *width,
                    height: *height,
                },
            }),
            ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
                ..
            } => Some(ShapePrimitive::Outline {
                vertices: regular_polygon_vertices(*diameter, *vertices as usize, *rotation),
            }),
            ApertureShape::Macro(_) => None,
        }
    }

    pub fn hole(&self) -> Option<f64> {
        match self {
            ApertureShape::Circle {
                hole,
                ..
            }
            | ApertureShape::Rectangle {
                hole,
                ..
            }
            | ApertureShape::Obround {
                hole,
                ..
            }
            | ApertureShape::Polygon {
                hole,
                ..
            } => *hole,
            ApertureShape::Macro(_) => None,
        }
    }

    /// Primitives of a flash in stamp order, cut-outs carve the primitives before them.
    pub fn flash_primitives(&self) -> Vec<FlashPrimitive> {
        match self {
            ApertureShape::Macro(macro_aperture) => macro_aperture
                .primitives
                .iter()
                .filter_map(|primitive| {
                    primitive
                        .shape(macro_aperture.compensation)
                        .map(|shape| FlashPrimitive {
                            exposure: primitive.exposure,
                            shape,
                        })
                })
                .collect(),
            _ => {
                let mut primitives: Vec<FlashPrimitive> = self
                    .outer_shape()
                    .into_iter()
                    .map(|shape| FlashPrimitive {
                        exposure: Exposure::Add,
                        shape,
                    })
                    .collect();
                if let Some(hole) = self.hole() {
                    primitives.push(FlashPrimitive {
                        exposure: Exposure::CutOut,
                        shape: ShapePrimitive::Circle {
                            center: Position::origin(),
                            diameter: hole,
                        },
                    });
                }
                primitives
            }
        }
    }
}

/// Every aperture of a file, resolved before replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureTable {
    apertures: HashMap<i32, ApertureShape>,
}

impl ApertureTable {
    /// Collects `%AM` macros first so definitions may reference macros defined later in the file.
    #[profiling::function]
    pub fn collect(statements: &[GerberStatement]) -> Result<Self, ApertureError> {
        let mut macro_definitions: HashMap<String, &ApertureMacro> = HashMap::default();
        for statement in statements {
            if let Command::ExtendedCode(ExtendedCode::ApertureMacro(macro_def)) = &statement.command {
                macro_definitions.insert(macro_def.name.clone(), macro_def);
            }
        }
        info!("macros: {:?}", macro_definitions.len());

        let mut apertures = HashMap::default();
        for statement in statements {
            if let Command::ExtendedCode(ExtendedCode::ApertureDefinition(ApertureDefinition {
                code,
                aperture,
            })) = &statement.command
            {
                let shape = ApertureShape::from_definition(*code, aperture, &macro_definitions)?;
                debug!("aperture D{}: {:?}", code, shape);
                if apertures.insert(*code, shape).is_some() {
                    warn!("Aperture D{} redefined at line {}, using the last definition", code, statement.line);
                }
            }
        }
        info!("apertures: {:?}", apertures.len());

        Ok(Self {
            apertures,
        })
    }

    pub fn get(&self, code: i32) -> Option<&ApertureShape> {
        self.apertures.get(&code)
    }

    pub fn len(&self) -> usize {
        self.apertures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apertures.is_empty()
    }
}
