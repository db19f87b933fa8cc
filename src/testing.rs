use std::io::BufWriter;

use gerber_types::{Command, GerberCode};

pub fn dump_gerber_source(commands: &Vec<Command>) {
    let gerber_source = gerber_commands_to_source(commands);

    println!("Gerber source:\n{}", gerber_source);
}

pub fn gerber_commands_to_source(commands: &Vec<Command>) -> String {
    let mut buf = BufWriter::new(Vec::new());
    commands
        .serialize(&mut buf)
        .expect("Could not generate Gerber code");
    let bytes = buf
        .into_inner()
        .expect("Could not flush Gerber code");
    String::from_utf8(bytes).expect("Gerber code is not UTF-8")
}

/// Shorthand builders for gerber commands, all coordinates use a 3.5 format.
pub mod commands {
    use gerber_types::{
        Aperture, ApertureDefinition, Circle, Command, CoordinateFormat, CoordinateNumber, CoordinateOffset,
        Coordinates, DCode, ExtendedCode, GCode, InterpolationMode, MCode, Operation, Polarity, QuadrantMode,
        Rectangular, Unit,
    };

    pub fn format() -> CoordinateFormat {
        CoordinateFormat::new(3, 5)
    }

    fn number(value: f64) -> CoordinateNumber {
        CoordinateNumber::try_from(value).expect("coordinate out of range")
    }

    pub fn coordinates(x: f64, y: f64) -> Coordinates {
        Coordinates::new(number(x), number(y), format())
    }

    pub fn offset(i: f64, j: f64) -> CoordinateOffset {
        CoordinateOffset::new(number(i), number(j), format())
    }

    /// The usual file preamble, unit and coordinate format.
    pub fn header(unit: Unit) -> Vec<Command> {
        vec![
            Command::ExtendedCode(ExtendedCode::CoordinateFormat(format())),
            Command::ExtendedCode(ExtendedCode::Unit(unit)),
        ]
    }

    pub fn define(code: i32, aperture: Aperture) -> Command {
        Command::ExtendedCode(ExtendedCode::ApertureDefinition(ApertureDefinition::new(code, aperture)))
    }

    pub fn circle(code: i32, diameter: f64, hole_diameter: Option<f64>) -> Command {
        define(code, Aperture::Circle(Circle {
            diameter,
            hole_diameter,
        }))
    }

    pub fn rectangle(code: i32, x: f64, y: f64) -> Command {
        define(code, Aperture::Rectangle(Rectangular {
            x,
            y,
            hole_diameter: None,
        }))
    }

    pub fn obround(code: i32, x: f64, y: f64, hole_diameter: Option<f64>) -> Command {
        define(code, Aperture::Obround(Rectangular {
            x,
            y,
            hole_diameter,
        }))
    }

    pub fn select(code: i32) -> Command {
        DCode::SelectAperture(code).into()
    }

    pub fn linear() -> Command {
        GCode::InterpolationMode(InterpolationMode::Linear).into()
    }

    pub fn clockwise() -> Command {
        GCode::InterpolationMode(InterpolationMode::ClockwiseCircular).into()
    }

    pub fn counter_clockwise() -> Command {
        GCode::InterpolationMode(InterpolationMode::CounterclockwiseCircular).into()
    }

    pub fn multi_quadrant() -> Command {
        GCode::QuadrantMode(QuadrantMode::Multiple).into()
    }

    pub fn move_to(x: f64, y: f64) -> Command {
        DCode::Operation(Operation::Move(coordinates(x, y))).into()
    }

    pub fn line_to(x: f64, y: f64) -> Command {
        DCode::Operation(Operation::Interpolate(coordinates(x, y), None)).into()
    }

    pub fn arc_to(x: f64, y: f64, i: f64, j: f64) -> Command {
        DCode::Operation(Operation::Interpolate(coordinates(x, y), Some(offset(i, j)))).into()
    }

    pub fn flash(x: f64, y: f64) -> Command {
        DCode::Operation(Operation::Flash(coordinates(x, y))).into()
    }

    pub fn polarity(polarity: Polarity) -> Command {
        Command::ExtendedCode(ExtendedCode::LoadPolarity(polarity))
    }

    pub fn region_start() -> Command {
        GCode::RegionMode(true).into()
    }

    pub fn region_end() -> Command {
        GCode::RegionMode(false).into()
    }

    pub fn end_of_file() -> Command {
        Command::FunctionCode(gerber_types::FunctionCode::MCode(MCode::EndOfFile))
    }

    /// A closed axis aligned rectangle traced as a region.
    pub fn rectangle_region(min: (f64, f64), max: (f64, f64)) -> Vec<Command> {
        vec![
            linear(),
            region_start(),
            move_to(min.0, min.1),
            line_to(max.0, min.1),
            line_to(max.0, max.1),
            line_to(min.0, max.1),
            line_to(min.0, min.1),
            region_end(),
        ]
    }

}
