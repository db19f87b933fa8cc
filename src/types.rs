use gerber_types::Polarity;

use crate::isoplot::{FillMode, UsageTag};

/// Macro primitive exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    CutOut,
    Add,
}

impl From<bool> for Exposure {
    fn from(value: bool) -> Self {
        match value {
            true => Exposure::Add,
            false => Exposure::CutOut,
        }
    }
}

/// What a stamp does to copper, polarity and exposure combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Add,
    Remove,
}

impl Effect {
    pub fn from_polarity(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Dark => Effect::Add,
            Polarity::Clear => Effect::Remove,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Effect::Add => Effect::Remove,
            Effect::Remove => Effect::Add,
        }
    }

    /// A cut-out primitive inverts the effect of the polarity it is drawn in.
    pub fn with_exposure(self, exposure: Exposure) -> Self {
        match exposure {
            Exposure::Add => self,
            Exposure::CutOut => self.opposite(),
        }
    }

    pub fn edge_tag(self) -> UsageTag {
        match self {
            Effect::Add => UsageTag::NormalEdge,
            Effect::Remove => UsageTag::InvertEdge,
        }
    }

    pub fn fill_mode(self) -> FillMode {
        match self {
            Effect::Add => FillMode::Background,
            Effect::Remove => FillMode::Erase,
        }
    }
}
