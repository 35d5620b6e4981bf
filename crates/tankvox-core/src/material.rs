use crate::error::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

/// Material stored in a voxel. An empty cell is `None` at the storage level,
/// never a variant of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Material {
    Dirt = 0,
    Grass = 1,
    Stone = 2,
    Sand = 3,
    Water = 4,
    Wood = 5,
    Leaves = 6,
    Wall = 7,
    Brick = 8,
    Concrete = 9,
    Metal = 10,
}

/// Number of material variants.
pub const MATERIAL_COUNT: usize = 11;

/// Every material in declaration order.
pub const ALL_MATERIALS: [Material; MATERIAL_COUNT] = [
    Material::Dirt,
    Material::Grass,
    Material::Stone,
    Material::Sand,
    Material::Water,
    Material::Wood,
    Material::Leaves,
    Material::Wall,
    Material::Brick,
    Material::Concrete,
    Material::Metal,
];

impl Material {
    /// Dense index into per-material tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Material::Dirt => "dirt",
            Material::Grass => "grass",
            Material::Stone => "stone",
            Material::Sand => "sand",
            Material::Water => "water",
            Material::Wood => "wood",
            Material::Leaves => "leaves",
            Material::Wall => "wall",
            Material::Brick => "brick",
            Material::Concrete => "concrete",
            Material::Metal => "metal",
        }
    }
}

/// How a gravity-eligible material decides whether it is still held up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportKind {
    /// Needs a solid voxel directly beneath it, or ground level.
    Column,
    /// Beams and trunks: search down, then sideways through the same material.
    Chain,
    /// Canopies: connected clusters hang off supported chain voxels.
    Cluster,
}

/// Immutable per-material properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProps {
    /// RGB color (0.0–1.0 per channel).
    pub color: (f32, f32, f32),
    /// Neighbouring faces stay visible through this material.
    #[serde(default)]
    pub transparent: bool,
    /// Takes part in collision and stops raycasts.
    #[serde(default = "default_true")]
    pub solid: bool,
    /// Removed by explosions.
    #[serde(default = "default_true")]
    pub breakable: bool,
    /// May lose support and fall as debris.
    #[serde(default)]
    pub gravity: bool,
    /// Support rule used when `gravity` is set.
    #[serde(default = "default_support")]
    pub support: SupportKind,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    /// Mass per unit volume for debris bodies.
    #[serde(default = "default_density")]
    pub density: f32,
}

fn default_true() -> bool {
    true
}

fn default_support() -> SupportKind {
    SupportKind::Column
}

fn default_friction() -> f32 {
    0.7
}

fn default_density() -> f32 {
    1.0
}

impl MaterialProps {
    const fn opaque(color: (f32, f32, f32), friction: f32, restitution: f32, density: f32) -> Self {
        Self {
            color,
            transparent: false,
            solid: true,
            breakable: true,
            gravity: false,
            support: SupportKind::Column,
            friction,
            restitution,
            density,
        }
    }

    /// Built-in properties for `material`.
    pub fn builtin(material: Material) -> Self {
        match material {
            Material::Dirt => Self::opaque((0.45, 0.31, 0.18), 0.8, 0.1, 1.5),
            Material::Grass => Self::opaque((0.32, 0.62, 0.22), 0.8, 0.1, 1.4),
            Material::Stone => Self::opaque((0.52, 0.52, 0.54), 0.7, 0.05, 2.6),
            Material::Sand => Self {
                gravity: true,
                ..Self::opaque((0.86, 0.78, 0.52), 0.9, 0.0, 1.6)
            },
            Material::Water => Self {
                transparent: true,
                solid: false,
                breakable: false,
                ..Self::opaque((0.20, 0.40, 0.85), 0.0, 0.0, 1.0)
            },
            Material::Wood => Self {
                gravity: true,
                support: SupportKind::Chain,
                ..Self::opaque((0.48, 0.33, 0.16), 0.6, 0.2, 0.7)
            },
            Material::Leaves => Self {
                transparent: true,
                gravity: true,
                support: SupportKind::Cluster,
                ..Self::opaque((0.18, 0.55, 0.16), 0.5, 0.1, 0.3)
            },
            Material::Wall => Self {
                breakable: false,
                ..Self::opaque((0.40, 0.40, 0.42), 0.7, 0.05, 3.0)
            },
            Material::Brick => Self {
                gravity: true,
                ..Self::opaque((0.66, 0.28, 0.22), 0.7, 0.1, 1.9)
            },
            Material::Concrete => Self::opaque((0.70, 0.70, 0.68), 0.7, 0.05, 2.4),
            Material::Metal => Self {
                breakable: false,
                ..Self::opaque((0.60, 0.62, 0.66), 0.4, 0.3, 7.8)
            },
        }
    }
}

/// A material definition as written in RON data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDef {
    pub material: Material,
    pub props: MaterialProps,
}

/// Properties for every material, indexed by `Material::index`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTable {
    props: [MaterialProps; MATERIAL_COUNT],
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self {
            props: ALL_MATERIALS.map(MaterialProps::builtin),
        }
    }
}

impl MaterialTable {
    /// Properties of `material`. Always present.
    pub fn get(&self, material: Material) -> &MaterialProps {
        &self.props[material.index()]
    }

    pub fn is_solid(&self, material: Material) -> bool {
        self.get(material).solid
    }

    pub fn is_transparent(&self, material: Material) -> bool {
        self.get(material).transparent
    }

    /// Replace the properties of one material.
    pub fn set(&mut self, material: Material, props: MaterialProps) {
        self.props[material.index()] = props;
    }

    /// Build a table from a complete list of definitions.
    /// Every material must appear; later duplicates override earlier ones.
    pub fn from_defs(defs: &[MaterialDef]) -> Result<Self, ConfigError> {
        let mut seen = [false; MATERIAL_COUNT];
        let mut table = Self::default();
        for def in defs {
            seen[def.material.index()] = true;
            table.set(def.material, def.props);
        }
        if let Some(missing) = ALL_MATERIALS.into_iter().find(|m| !seen[m.index()]) {
            return Err(ConfigError::MissingMaterial(missing));
        }
        validate_materials(&table).map_err(ConfigError::from_list)?;
        Ok(table)
    }

    /// Parse a complete materials list from RON.
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let defs = parse_defs(ron_str)?;
        Self::from_defs(&defs)
    }

    /// Start from the built-in table and override only the listed materials.
    pub fn with_overrides_from_ron(ron_str: &str) -> Result<Self, ConfigError> {
        let defs = parse_defs(ron_str)?;
        let mut table = Self::default();
        for def in &defs {
            log::debug!("material override: {}", def.material.name());
            table.set(def.material, def.props);
        }
        validate_materials(&table).map_err(ConfigError::from_list)?;
        Ok(table)
    }
}

fn parse_defs(ron_str: &str) -> Result<Vec<MaterialDef>, ConfigError> {
    let options = ron::Options::default();
    options.from_str(ron_str).map_err(|e| ConfigError::Parse {
        what: "materials",
        message: e.to_string(),
    })
}

/// Validate a material table for physically meaningful ranges.
pub fn validate_materials(table: &MaterialTable) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for material in ALL_MATERIALS {
        let props = table.get(material);
        let (r, g, b) = props.color;
        for channel in [r, g, b] {
            check_range(&mut errors, "color", channel, 0.0, 1.0, "0.0..=1.0");
        }
        check_range(&mut errors, "friction", props.friction, 0.0, 10.0, "0.0..=10.0");
        check_range(&mut errors, "restitution", props.restitution, 0.0, 1.0, "0.0..=1.0");
        check_range(&mut errors, "density", props.density, 1e-3, 100.0, "> 0");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_order() {
        for (i, m) in ALL_MATERIALS.iter().enumerate() {
            assert_eq!(m.index(), i, "{m:?}");
        }
    }

    #[test]
    fn test_builtin_support_classes() {
        let table = MaterialTable::default();
        assert_eq!(table.get(Material::Wood).support, SupportKind::Chain);
        assert_eq!(table.get(Material::Leaves).support, SupportKind::Cluster);
        assert!(table.get(Material::Sand).gravity);
        assert!(!table.get(Material::Stone).gravity);
        assert!(!table.get(Material::Grass).gravity);
    }

    #[test]
    fn test_water_is_transparent_and_not_solid() {
        let table = MaterialTable::default();
        assert!(table.is_transparent(Material::Water));
        assert!(!table.is_solid(Material::Water));
    }

    #[test]
    fn test_builtin_table_validates() {
        assert!(validate_materials(&MaterialTable::default()).is_ok());
    }

    #[test]
    fn test_override_from_ron() {
        let src = r#"[
            (material: Stone, props: (color: (0.1, 0.2, 0.3), gravity: true, friction: 0.2)),
        ]"#;
        let table = MaterialTable::with_overrides_from_ron(src).unwrap();
        let stone = table.get(Material::Stone);
        assert_eq!(stone.color, (0.1, 0.2, 0.3));
        assert!(stone.gravity);
        assert!(stone.solid, "solid defaults to true");
        assert_eq!(stone.friction, 0.2);
        assert_eq!(table.get(Material::Dirt), &MaterialProps::builtin(Material::Dirt));
    }

    #[test]
    fn test_complete_table_requires_every_material() {
        let src = "[(material: Dirt, props: (color: (0.5, 0.5, 0.5)))]";
        match MaterialTable::from_ron_str(src) {
            Err(ConfigError::MissingMaterial(m)) => assert_eq!(m, Material::Grass),
            other => panic!("expected MissingMaterial, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let err = MaterialTable::with_overrides_from_ron("[(material: Unobtainium)]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { what: "materials", .. }), "{err}");
    }

    #[test]
    fn test_out_of_range_restitution_rejected() {
        let src = "[(material: Metal, props: (color: (0.5, 0.5, 0.5), restitution: 1.5))]";
        let err = MaterialTable::with_overrides_from_ron(src).unwrap_err();
        assert!(err.to_string().contains("restitution"), "{err}");
    }
}
