//! Aperture macro resolution.
//!
//! A macro is evaluated once per aperture definition against the definition's arguments, producing an ordered list of
//! primitives in the macro's own coordinate space with rotation already applied. Sizes stay parametric so that
//! xy-compensation can be applied per primitive kind when flashing.

use gerber_types::{ApertureMacro, MacroContent, MacroDecimal, VariableDefinition};
use log::{trace, warn};

use crate::aperture::ShapePrimitive;
use crate::error::ApertureError;
use crate::expressions::{
    evaluate_expression, macro_boolean_to_bool, macro_decimal_pair_to_f64, macro_decimal_to_f64, macro_integer_to_u32,
    ExpressionEvaluationError, MacroContext,
};
use crate::geometry::{regular_polygon_vertices, rotate_point};
use crate::spacial::deduplicate::DedupEpsilon;
use crate::spacial::{distance, length};
use crate::types::Exposure;
use crate::{Position, Vector};

#[derive(Debug, Clone, PartialEq)]
pub enum MacroShape {
    Circle {
        center: Position,
        diameter: f64,
    },
    /// Vector line, square ends, end points already rotated.
    Line {
        start: Position,
        end: Position,
        width: f64,
    },
    /// Center line rectangle, `rotation` in degrees, center already rotated.
    CenterLine {
        center: Position,
        width: f64,
        height: f64,
        rotation: f64,
    },
    /// Vertices already rotated, the closing vertex is dropped.
    Outline {
        vertices: Vec<Position>,
    },
    /// Regular polygon, `rotation` in degrees, center already rotated.
    Polygon {
        center: Position,
        vertices: u32,
        diameter: f64,
        rotation: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroPrimitive {
    pub exposure: Exposure,
    pub shape: MacroShape,
}

impl MacroPrimitive {
    /// Concrete geometry relative to the flash point.
    ///
    /// `compensation` grows circles, line widths and polygon diameters of exposed primitives and shrinks cut-out ones,
    /// outlines are used as given. Returns `None` if the compensated primitive has no area left.
    pub fn shape(&self, compensation: f64) -> Option<ShapePrimitive> {
        let compensation = match self.exposure {
            Exposure::Add => compensation,
            Exposure::CutOut => -compensation,
        };

        match &self.shape {
            MacroShape::Circle {
                center,
                diameter,
            } => {
                let diameter = diameter + compensation;
                (diameter > 0.0).then(|| ShapePrimitive::Circle {
                    center: *center,
                    diameter,
                })
            }
            MacroShape::Line {
                start,
                end,
                width,
            } => {
                let width = width + compensation;
                if width <= 0.0 {
                    return None;
                }
                let delta = end - start;
                let direction = delta / length(delta);
                let normal = Vector::new(-direction.y, direction.x) * (width / 2.0);
                Some(ShapePrimitive::Outline {
                    vertices: vec![start - normal, start + normal, end + normal, end - normal],
                })
            }
            MacroShape::CenterLine {
                center,
                width,
                height,
                rotation,
            } => {
                let (half_width, half_height) = ((width + compensation) / 2.0, (height + compensation) / 2.0);
                if half_width <= 0.0 || half_height <= 0.0 {
                    return None;
                }
                let vertices = [
                    Position::new(half_width, half_height),
                    Position::new(-half_width, half_height),
                    Position::new(-half_width, -half_height),
                    Position::new(half_width, -half_height),
                ]
                .iter()
                .map(|corner| rotate_point(*corner, *rotation) + center.coords)
                .collect();
                Some(ShapePrimitive::Outline {
                    vertices,
                })
            }
            MacroShape::Outline {
                vertices,
            } => Some(ShapePrimitive::Outline {
                vertices: vertices.clone(),
            }),
            MacroShape::Polygon {
                center,
                vertices,
                diameter,
                rotation,
            } => {
                let diameter = diameter + compensation;
                if diameter <= 0.0 {
                    return None;
                }
                let vertices = regular_polygon_vertices(diameter, *vertices as usize, *rotation)
                    .into_iter()
                    .map(|vertex| vertex + center.coords)
                    .collect();
                Some(ShapePrimitive::Outline {
                    vertices,
                })
            }
        }
    }
}

/// An aperture macro instantiated with the arguments of one aperture definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroAperture {
    pub name: String,
    pub primitives: Vec<MacroPrimitive>,
    /// Applied to every primitive when flashed.
    pub compensation: f64,
}

impl MacroAperture {
    #[profiling::function]
    pub fn resolve(definition: &ApertureMacro, args: Option<&Vec<MacroDecimal>>) -> Result<Self, ApertureError> {
        let expression_error = |cause: ExpressionEvaluationError| ApertureError::MacroExpression {
            name: definition.name.clone(),
            cause,
        };

        let mut context = MacroContext::default();
        if let Some(args) = args {
            for (index, arg) in args.iter().enumerate() {
                let value = macro_decimal_to_f64(arg, &context).map_err(expression_error)?;
                context
                    .put((index + 1) as u32, value)
                    .map_err(expression_error)?;
            }
        }
        trace!("initial macro context: {:?}", context);

        let mut primitives = Vec::new();
        for content in &definition.content {
            trace!("macro content: {:?}", content);
            let primitive = match content {
                MacroContent::Moire(_) => {
                    return Err(ApertureError::UnsupportedPrimitive {
                        name: definition.name.clone(),
                        primitive: "moire",
                    })
                }
                MacroContent::Thermal(_) => {
                    return Err(ApertureError::UnsupportedPrimitive {
                        name: definition.name.clone(),
                        primitive: "thermal",
                    })
                }
                _ => resolve_content(content, &mut context).map_err(expression_error)?,
            };
            match primitive {
                Some(MacroPrimitive {
                    shape:
                        MacroShape::Polygon {
                            vertices,
                            ..
                        },
                    ..
                }) if !(3..=12).contains(&vertices) => {
                    return Err(ApertureError::UnsupportedPrimitive {
                        name: definition.name.clone(),
                        primitive: "polygon with other than 3 to 12 vertices",
                    });
                }
                Some(primitive) => primitives.push(primitive),
                None => {}
            }
        }
        trace!("final macro context: {:?}", context);

        Ok(Self {
            name: definition.name.clone(),
            primitives,
            compensation: 0.0,
        })
    }

    /// Largest distance from the macro origin covered by any exposed primitive.
    pub fn max_extent(&self) -> f64 {
        self.primitives
            .iter()
            .filter_map(|primitive| primitive.shape(self.compensation))
            .map(|shape| shape.max_extent())
            .fold(0.0, f64::max)
    }
}

fn resolve_content(
    content: &MacroContent,
    context: &mut MacroContext,
) -> Result<Option<MacroPrimitive>, ExpressionEvaluationError> {
    let primitive = match content {
        MacroContent::Circle(circle) => {
            let diameter = macro_decimal_to_f64(&circle.diameter, context)?;
            let center = macro_decimal_pair_to_f64(&circle.center, context)?;
            let rotation = match &circle.angle {
                Some(angle) => macro_decimal_to_f64(angle, context)?,
                None => 0.0,
            };
            MacroPrimitive {
                exposure: macro_boolean_to_bool(&circle.exposure, context)?.into(),
                shape: MacroShape::Circle {
                    center: rotate_point(Position::new(center.0, center.1), rotation),
                    diameter,
                },
            }
        }
        MacroContent::VectorLine(vector_line) => {
            let start = macro_decimal_pair_to_f64(&vector_line.start, context)?;
            let end = macro_decimal_pair_to_f64(&vector_line.end, context)?;
            let rotation = macro_decimal_to_f64(&vector_line.angle, context)?;
            let (start, end) = (
                rotate_point(Position::new(start.0, start.1), rotation),
                rotate_point(Position::new(end.0, end.1), rotation),
            );
            if distance(start, end) == 0.0 {
                warn!("Zero length vector line ignored. vector_line: {:?}", vector_line);
                return Ok(None);
            }
            MacroPrimitive {
                exposure: macro_boolean_to_bool(&vector_line.exposure, context)?.into(),
                shape: MacroShape::Line {
                    start,
                    end,
                    width: macro_decimal_to_f64(&vector_line.width, context)?,
                },
            }
        }
        MacroContent::CenterLine(center_line) => {
            let center = macro_decimal_pair_to_f64(&center_line.center, context)?;
            let (width, height) = macro_decimal_pair_to_f64(&center_line.dimensions, context)?;
            let rotation = macro_decimal_to_f64(&center_line.angle, context)?;
            MacroPrimitive {
                exposure: macro_boolean_to_bool(&center_line.exposure, context)?.into(),
                shape: MacroShape::CenterLine {
                    center: rotate_point(Position::new(center.0, center.1), rotation),
                    width,
                    height,
                    rotation,
                },
            }
        }
        MacroContent::Outline(outline) => {
            let rotation = macro_decimal_to_f64(&outline.angle, context)?;
            let vertices = outline
                .points
                .iter()
                .map(|point| {
                    macro_decimal_pair_to_f64(point, context)
                        .map(|(x, y)| rotate_point(Position::new(x, y), rotation))
                })
                .collect::<Result<Vec<_>, _>>()?
                .dedup_with_epsilon(1e-9);
            if vertices.len() < 3 {
                warn!("Outline with less than 3 points ignored. outline: {:?}", outline);
                return Ok(None);
            }
            MacroPrimitive {
                exposure: macro_boolean_to_bool(&outline.exposure, context)?.into(),
                shape: MacroShape::Outline {
                    vertices,
                },
            }
        }
        MacroContent::Polygon(polygon) => {
            let center = macro_decimal_pair_to_f64(&polygon.center, context)?;
            let rotation = macro_decimal_to_f64(&polygon.angle, context)?;
            MacroPrimitive {
                exposure: macro_boolean_to_bool(&polygon.exposure, context)?.into(),
                shape: MacroShape::Polygon {
                    center: rotate_point(Position::new(center.0, center.1), rotation),
                    vertices: macro_integer_to_u32(&polygon.vertices, context)?,
                    diameter: macro_decimal_to_f64(&polygon.diameter, context)?,
                    rotation,
                },
            }
        }
        MacroContent::VariableDefinition(VariableDefinition {
            number,
            expression,
        }) => {
            let value = evaluate_expression(expression, context)?;
            context.put(*number, value)?;
            return Ok(None);
        }
        MacroContent::Comment(_) | MacroContent::Moire(_) | MacroContent::Thermal(_) => return Ok(None),
    };
    Ok(Some(primitive))
}

#[cfg(test)]
mod macro_tests {
    use gerber_types::{
        CenterLinePrimitive, CirclePrimitive, MacroBoolean, MacroInteger, OutlinePrimitive, PolygonPrimitive,
        ThermalPrimitive, VectorLinePrimitive,
    };
    use rstest::rstest;

    use super::*;

    fn init() {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();
    }

    fn value(value: f64) -> MacroDecimal {
        MacroDecimal::Value(value)
    }

    fn assert_position(actual: Position, expected: (f64, f64)) {
        assert!(
            (actual.x - expected.0).abs() < 1e-9 && (actual.y - expected.1).abs() < 1e-9,
            "actual: {:?}, expected: {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn test_variables_and_circle() {
        // given
        init();
        let definition = ApertureMacro {
            name: "PAD".to_string(),
            content: vec![
                MacroContent::Comment("pad with variable diameter".to_string()),
                MacroContent::VariableDefinition(VariableDefinition {
                    number: 3,
                    expression: "$1x2".to_string(),
                }),
                MacroContent::Circle(CirclePrimitive {
                    exposure: MacroBoolean::Value(true),
                    diameter: MacroDecimal::Variable(3),
                    center: (MacroDecimal::Variable(2), value(0.0)),
                    angle: Some(value(90.0)),
                }),
            ],
        };

        // when
        let aperture = MacroAperture::resolve(&definition, Some(&vec![value(0.5), value(1.0)])).unwrap();

        // then
        assert_eq!(aperture.primitives.len(), 1);
        let MacroShape::Circle {
            center,
            diameter,
        } = &aperture.primitives[0].shape
        else {
            panic!("expected a circle, got {:?}", aperture.primitives[0]);
        };
        assert_eq!(*diameter, 1.0);
        assert_position(*center, (0.0, 1.0));
        assert!((aperture.max_extent() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_vector_line_and_center_line() {
        // given
        let definition = ApertureMacro {
            name: "LINES".to_string(),
            content: vec![
                MacroContent::VectorLine(VectorLinePrimitive {
                    exposure: MacroBoolean::Value(true),
                    width: value(0.2),
                    start: (value(0.0), value(0.0)),
                    end: (value(1.0), value(0.0)),
                    angle: value(0.0),
                }),
                MacroContent::CenterLine(CenterLinePrimitive {
                    exposure: MacroBoolean::Value(false),
                    dimensions: (value(2.0), value(1.0)),
                    center: (value(1.0), value(0.0)),
                    angle: value(90.0),
                }),
            ],
        };

        // when
        let aperture = MacroAperture::resolve(&definition, None).unwrap();

        // then
        let Some(ShapePrimitive::Outline {
            vertices,
        }) = aperture.primitives[0].shape(0.0)
        else {
            panic!("expected an outline");
        };
        assert_position(vertices[0], (0.0, -0.1));
        assert_position(vertices[2], (1.0, 0.1));

        // and the center line rotates about the macro origin
        assert_eq!(aperture.primitives[1].exposure, Exposure::CutOut);
        let Some(ShapePrimitive::Outline {
            vertices,
        }) = aperture.primitives[1].shape(0.0)
        else {
            panic!("expected an outline");
        };
        assert_position(vertices[0], (-0.5, 2.0));
        assert_position(vertices[2], (0.5, 0.0));
    }

    #[test]
    fn test_outline_and_polygon() {
        // given
        let definition = ApertureMacro {
            name: "SHAPES".to_string(),
            content: vec![
                MacroContent::Outline(OutlinePrimitive {
                    exposure: MacroBoolean::Value(true),
                    points: vec![
                        (value(0.0), value(0.0)),
                        (value(1.0), value(0.0)),
                        (value(1.0), value(1.0)),
                        (value(0.0), value(0.0)),
                    ],
                    angle: value(0.0),
                }),
                MacroContent::Polygon(PolygonPrimitive {
                    exposure: MacroBoolean::Value(true),
                    vertices: MacroInteger::Value(6),
                    center: (value(0.0), value(0.0)),
                    diameter: value(2.0),
                    angle: value(0.0),
                }),
            ],
        };

        // when
        let aperture = MacroAperture::resolve(&definition, None).unwrap();

        // then
        assert!(matches!(&aperture.primitives[0].shape, MacroShape::Outline { vertices } if vertices.len() == 3));
        let Some(ShapePrimitive::Outline {
            vertices,
        }) = aperture.primitives[1].shape(0.0)
        else {
            panic!("expected an outline");
        };
        assert_eq!(vertices.len(), 6);
        assert_position(vertices[0], (1.0, 0.0));
    }

    #[rstest]
    #[case(Exposure::Add, 0.1, Some(1.1))]
    #[case(Exposure::CutOut, 0.1, Some(0.9))]
    #[case(Exposure::CutOut, 1.0, None)]
    fn test_compensation(#[case] exposure: Exposure, #[case] compensation: f64, #[case] expected: Option<f64>) {
        let primitive = MacroPrimitive {
            exposure,
            shape: MacroShape::Circle {
                center: Position::origin(),
                diameter: 1.0,
            },
        };
        let diameter = primitive
            .shape(compensation)
            .map(|shape| match shape {
                ShapePrimitive::Circle {
                    diameter,
                    ..
                } => diameter,
                _ => unreachable!(),
            });
        match (diameter, expected) {
            (Some(diameter), Some(expected)) => assert!((diameter - expected).abs() < 1e-9),
            (None, None) => {}
            (actual, expected) => panic!("actual: {:?}, expected: {:?}", actual, expected),
        }
    }

    #[test]
    fn test_thermal_is_unsupported() {
        let definition = ApertureMacro {
            name: "THERMAL".to_string(),
            content: vec![MacroContent::Thermal(ThermalPrimitive {
                center: (value(0.0), value(0.0)),
                outer_diameter: value(1.0),
                inner_diameter: value(0.8),
                gap: value(0.1),
                angle: value(0.0),
            })],
        };
        assert_eq!(
            MacroAperture::resolve(&definition, None),
            Err(ApertureError::UnsupportedPrimitive {
                name: "THERMAL".to_string(),
                primitive: "thermal",
            })
        );
    }

    #[test]
    fn test_expression_errors_propagate() {
        let definition = ApertureMacro {
            name: "BROKEN".to_string(),
            content: vec![MacroContent::VariableDefinition(VariableDefinition {
                number: 2,
                expression: "$1/0".to_string(),
            })],
        };
        assert!(matches!(
            MacroAperture::resolve(&definition, None),
            Err(ApertureError::MacroExpression {
                cause: ExpressionEvaluationError::DivisionByZero(_),
                ..
            })
        ));
    }
}
