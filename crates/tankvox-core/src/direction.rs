use glam::IVec3;

/// One of the 6 face neighbours of a voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    Down = 0,
    Up = 1,
    North = 2,
    South = 3,
    East = 4,
    West = 5,
}

/// All 6 faces, vertical pair first.
pub const ALL_FACES: [Face; 6] = [
    Face::Down,
    Face::Up,
    Face::North,
    Face::South,
    Face::East,
    Face::West,
];

/// The 4 horizontal faces, used by lateral support steps.
pub const LATERAL_FACES: [Face; 4] = [Face::North, Face::South, Face::East, Face::West];

impl Face {
    /// Offset vector for this face. Y-up convention: Down = (0,-1,0).
    pub fn offset(self) -> IVec3 {
        match self {
            Face::Down => IVec3::new(0, -1, 0),
            Face::Up => IVec3::new(0, 1, 0),
            Face::North => IVec3::new(0, 0, -1),
            Face::South => IVec3::new(0, 0, 1),
            Face::East => IVec3::new(1, 0, 0),
            Face::West => IVec3::new(-1, 0, 0),
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::East => Face::West,
            Face::West => Face::East,
        }
    }

    /// Face whose offset equals `normal`, if it is a unit axis vector.
    pub fn from_normal(normal: IVec3) -> Option<Face> {
        ALL_FACES.into_iter().find(|f| f.offset() == normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faces_unique_and_unit() {
        for (i, a) in ALL_FACES.iter().enumerate() {
            assert_eq!(a.offset().abs().element_sum(), 1, "{a:?} is not a unit offset");
            for b in &ALL_FACES[i + 1..] {
                assert_ne!(a.offset(), b.offset(), "{a:?} and {b:?} share offset");
            }
        }
    }

    #[test]
    fn test_opposite_cancels() {
        for face in ALL_FACES {
            assert_eq!(face.offset() + face.opposite().offset(), IVec3::ZERO);
            assert_eq!(face.opposite().opposite(), face);
        }
    }

    #[test]
    fn test_lateral_faces_are_horizontal() {
        for face in LATERAL_FACES {
            assert_eq!(face.offset().y, 0);
        }
    }

    #[test]
    fn test_from_normal() {
        assert_eq!(Face::from_normal(IVec3::new(0, 1, 0)), Some(Face::Up));
        assert_eq!(Face::from_normal(IVec3::new(1, 1, 0)), None);
    }
}
