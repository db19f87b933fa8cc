use thiserror::Error;

use crate::expressions::ExpressionEvaluationError;
use crate::isoplot::BuilderId;

/// Errors resolving aperture and macro geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApertureError {
    #[error("Aperture D{code}: {parameter} must be positive and finite, got {value}")]
    InvalidDimension {
        code: i32,
        parameter: &'static str,
        value: f64,
    },
    #[error("Aperture D{code}: polygon has {vertices} vertices, expected 3 to 12")]
    InvalidPolygon {
        code: i32,
        vertices: u32,
    },
    #[error("Aperture D{code}: hole diameter {hole} does not fit inside the aperture")]
    HoleTooLarge {
        code: i32,
        hole: f64,
    },
    #[error("Aperture D{code} references unknown macro '{name}'")]
    UnknownMacro {
        code: i32,
        name: String,
    },
    #[error("Macro '{name}': {cause}")]
    MacroExpression {
        name: String,
        cause: ExpressionEvaluationError,
    },
    #[error("Macro '{name}': primitive '{primitive}' is not supported for isolation routing")]
    UnsupportedPrimitive {
        name: String,
        primitive: &'static str,
    },
}

/// Errors raised by the iso-plot builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IsoPlotError {
    #[error("Zero width stroke requested, width: {width}")]
    ZeroWidthStroke {
        width: i32,
    },
    #[error("Flood fill of builder id {seed} would fill {cells} cells, limit: {limit}")]
    FillLimitExceeded {
        seed: BuilderId,
        cells: usize,
        limit: usize,
    },
    #[error("Unknown builder id: {0}")]
    UnknownBuilderId(BuilderId),
    #[error("Outline needs at least 3 vertices, got {0}")]
    DegenerateOutline(usize),
}

/// Errors which abort the conversion of one gerber file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error(transparent)]
    Aperture(#[from] ApertureError),
    #[error(transparent)]
    IsoPlot(#[from] IsoPlotError),
    #[error("Line {line}: aperture D{code} is not defined")]
    UnknownAperture {
        code: i32,
        line: usize,
    },
    #[error("Line {line}: no aperture selected")]
    NoApertureSelected {
        line: usize,
    },
    #[error("Line {line}: unsupported construct '{construct}'")]
    UnsupportedConstruct {
        construct: &'static str,
        line: usize,
    },
    #[error("Line {line}: circular interpolation without a circular direction (G02/G03)")]
    MissingCircularDirection {
        line: usize,
    },
    #[error("Line {line}: aperture D{code} is a macro aperture, macros can only be flashed")]
    MacroApertureDraw {
        code: i32,
        line: usize,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Plot grid of {width}x{height} cells exceeds the limit of {limit} cells")]
    GridTooLarge {
        width: f64,
        height: f64,
        limit: usize,
    },
}

impl ConversionError {
    /// Numeric code for callers that report failures as numbers.
    ///
    /// 1xxx = input malformation, 2xxx = unsupported construct, 3xxx = invariant violation, 4xxx = builder.
    pub fn code(&self) -> u32 {
        match self {
            ConversionError::Aperture(error) => match error {
                ApertureError::InvalidDimension {
                    ..
                } => 1001,
                ApertureError::InvalidPolygon {
                    ..
                } => 1002,
                ApertureError::HoleTooLarge {
                    ..
                } => 1003,
                ApertureError::UnknownMacro {
                    ..
                } => 1004,
                ApertureError::MacroExpression {
                    ..
                } => 1005,
                ApertureError::UnsupportedPrimitive {
                    ..
                } => 2002,
            },
            ConversionError::UnknownAperture {
                ..
            } => 1006,
            ConversionError::InvalidConfig(_) => 1007,
            ConversionError::GridTooLarge {
                ..
            } => 1008,
            ConversionError::UnsupportedConstruct {
                ..
            } => 2001,
            ConversionError::MissingCircularDirection {
                ..
            } => 3001,
            ConversionError::MacroApertureDraw {
                ..
            } => 3002,
            ConversionError::NoApertureSelected {
                ..
            } => 3003,
            ConversionError::IsoPlot(error) => match error {
                IsoPlotError::ZeroWidthStroke {
                    ..
                } => 4001,
                IsoPlotError::FillLimitExceeded {
                    ..
                } => 4002,
                IsoPlotError::UnknownBuilderId(_) => 4003,
                IsoPlotError::DegenerateOutline(_) => 4004,
            },
        }
    }
}

#[cfg(test)]
mod error_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ConversionError::UnsupportedConstruct { construct: "SR", line: 12 }, 2001)]
    #[case(ConversionError::MissingCircularDirection { line: 3 }, 3001)]
    #[case(IsoPlotError::ZeroWidthStroke { width: 0 }.into(), 4001)]
    #[case(ApertureError::InvalidPolygon { code: 10, vertices: 2 }.into(), 1002)]
    #[case(ConversionError::GridTooLarge { width: 1e9, height: 1e9, limit: 100 }, 1008)]
    fn test_codes(#[case] error: ConversionError, #[case] expected: u32) {
        assert_eq!(error.code(), expected);
    }

    #[test]
    fn test_message_names_construct_and_line() {
        let error = ConversionError::UnsupportedConstruct {
            construct: "AB",
            line: 42,
        };
        assert_eq!(error.to_string(), "Line 42: unsupported construct 'AB'");
    }
}
