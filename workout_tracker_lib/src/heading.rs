/// 8-point compass rose label for a course reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl CardinalDirection {
    /// `course` is degrees clockwise from true north. Providers report a
    /// negative course when the direction of travel is unknown.
    pub fn from_course(course: f64) -> Option<Self> {
        if course < 0.0 || !course.is_finite() {
            return None;
        }
        let sector = (((course + 22.5) / 45.0) as usize) % 8;
        Some(match sector {
            0 => CardinalDirection::North,
            1 => CardinalDirection::NorthEast,
            2 => CardinalDirection::East,
            3 => CardinalDirection::SouthEast,
            4 => CardinalDirection::South,
            5 => CardinalDirection::SouthWest,
            6 => CardinalDirection::West,
            _ => CardinalDirection::NorthWest,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardinalDirection::North => "N",
            CardinalDirection::NorthEast => "NE",
            CardinalDirection::East => "E",
            CardinalDirection::SouthEast => "SE",
            CardinalDirection::South => "S",
            CardinalDirection::SouthWest => "SW",
            CardinalDirection::West => "W",
            CardinalDirection::NorthWest => "NW",
        }
    }
}
