//! Bounded battle arena: layered ground slab, perimeter wall, trees and
//! brick buildings. Generation is deterministic for a given seed.

use glam::{IVec2, IVec3, Vec3};
use tankvox_core::config::ArenaConfig;
use tankvox_core::material::Material;
use tankvox_core::math::voxel_to_world;

use crate::VoxelWorld;

/// What a generation pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArenaLayout {
    /// Trunk base of each tree.
    pub trees: Vec<IVec3>,
    pub buildings: Vec<Building>,
}

/// Footprint and height of one building, in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Building {
    /// Inclusive footprint corners on X/Z.
    pub min: IVec2,
    pub max: IVec2,
    /// Y of the first brick layer.
    pub base_y: i32,
    pub height: i32,
}

impl Building {
    fn overlaps(&self, min: IVec2, max: IVec2, margin: i32) -> bool {
        min.x <= self.max.x + margin
            && max.x >= self.min.x - margin
            && min.y <= self.max.y + margin
            && max.y >= self.min.y - margin
    }

    pub fn contains_column(&self, x: i32, z: i32) -> bool {
        (self.min.x..=self.max.x).contains(&x) && (self.min.y..=self.max.y).contains(&z)
    }
}

/// Fill `world` with a full arena.
pub fn generate_arena(world: &mut VoxelWorld, config: &ArenaConfig) -> ArenaLayout {
    let mut rng = fastrand::Rng::with_seed(config.seed);
    let ground = world.config().ground_level;
    let h = config.half_extent;

    for z in -h..h {
        for x in -h..h {
            for depth in 0..config.ground_depth {
                let y = ground - depth;
                let material = match depth {
                    0 => Material::Grass,
                    1 => Material::Dirt,
                    _ => Material::Stone,
                };
                world.set_voxel(IVec3::new(x, y, z), Some(material));
            }
        }
    }

    for y in ground + 1..=ground + config.wall_height {
        for i in -h..h {
            for v in [
                IVec3::new(i, y, -h),
                IVec3::new(i, y, h - 1),
                IVec3::new(-h, y, i),
                IVec3::new(h - 1, y, i),
            ] {
                world.set_voxel(v, Some(Material::Wall));
            }
        }
    }

    let mut layout = ArenaLayout::default();
    let inner = h - 3;
    let mut attempts = config.building_count * 10;
    while layout.buildings.len() < config.building_count as usize && attempts > 0 {
        attempts -= 1;
        let width = rng.i32(config.building_size_min..=config.building_size_max);
        let depth = rng.i32(config.building_size_min..=config.building_size_max);
        if width >= 2 * inner || depth >= 2 * inner {
            break;
        }
        let min = IVec2::new(rng.i32(-inner..inner - width), rng.i32(-inner..inner - depth));
        let max = min + IVec2::new(width - 1, depth - 1);

        if rect_near_origin(min, max, config.spawn_clearance)
            || layout.buildings.iter().any(|b| b.overlaps(min, max, 2))
        {
            continue;
        }
        if let Some(building) = place_building(world, min, max, config.building_height) {
            layout.buildings.push(building);
        }
    }

    let margin = config.canopy_radius + 2;
    // Canopies may not overhang the spawn area either.
    let keep_out = config.spawn_clearance + config.canopy_radius;
    let clearance_sq = keep_out * keep_out;
    for z in -h + margin..h - margin {
        for x in -h + margin..h - margin {
            if rng.f32() >= config.tree_density {
                continue;
            }
            if x * x + z * z <= clearance_sq {
                continue;
            }
            let clear_of_buildings = layout
                .buildings
                .iter()
                .all(|b| !b.overlaps(IVec2::new(x, z), IVec2::new(x, z), config.canopy_radius + 1));
            if !clear_of_buildings || world.find_surface_height(x, z) != Some(ground + 1) {
                continue;
            }
            let trunk = rng.i32(config.trunk_height_min..=config.trunk_height_max);
            if let Some(base) = place_tree(world, x, z, trunk, config.canopy_radius) {
                layout.trees.push(base);
            }
        }
    }

    log::info!(
        "generated arena: {}x{} voxels, {} trees, {} buildings",
        2 * h,
        2 * h,
        layout.trees.len(),
        layout.buildings.len()
    );
    layout
}

fn rect_near_origin(min: IVec2, max: IVec2, clearance: i32) -> bool {
    let nearest = IVec2::ZERO.clamp(min, max);
    nearest.length_squared() <= clearance * clearance
}

/// Grow a tree on the surface of column (x, z): a WOOD trunk topped by a
/// LEAVES sphere that only fills empty cells. Returns the trunk base.
pub fn place_tree(
    world: &mut VoxelWorld,
    x: i32,
    z: i32,
    trunk_height: i32,
    canopy_radius: i32,
) -> Option<IVec3> {
    let base_y = world.find_surface_height(x, z)?;
    let base = IVec3::new(x, base_y, z);
    for dy in 0..trunk_height {
        world.set_voxel(base + IVec3::Y * dy, Some(Material::Wood));
    }

    let top = base + IVec3::Y * (trunk_height - 1);
    let r = canopy_radius;
    for dy in -r..=r {
        for dz in -r..=r {
            for dx in -r..=r {
                let offset = IVec3::new(dx, dy, dz);
                let v = top + IVec3::Y + offset;
                if offset.length_squared() <= r * r && world.get_voxel(v).is_none() {
                    world.set_voxel(v, Some(Material::Leaves));
                }
            }
        }
    }
    Some(base)
}

/// Raise a brick shell over the footprint `min..=max` (X/Z), with a door in
/// the middle of the south (-Z) wall and a concrete roof. The lintel above
/// the door is concrete so the bricks over the opening stay up.
pub fn place_building(world: &mut VoxelWorld, min: IVec2, max: IVec2, height: i32) -> Option<Building> {
    if max.x - min.x < 2 || max.y - min.y < 2 || height < 3 {
        return None;
    }
    let base_y = world.find_surface_height(min.x, min.y)?;
    let door_x = (min.x + max.x) / 2;
    let door_height = 2;

    for dy in 0..height {
        let y = base_y + dy;
        for z in min.y..=max.y {
            for x in min.x..=max.x {
                let on_shell = x == min.x || x == max.x || z == min.y || z == max.y;
                if !on_shell {
                    continue;
                }
                let in_door = z == min.y && x == door_x;
                if in_door && dy < door_height {
                    continue;
                }
                let material = if in_door && dy == door_height {
                    Material::Concrete
                } else {
                    Material::Brick
                };
                world.set_voxel(IVec3::new(x, y, z), Some(material));
            }
        }
    }

    let roof_y = base_y + height;
    for z in min.y..=max.y {
        for x in min.x..=max.x {
            world.set_voxel(IVec3::new(x, roof_y, z), Some(Material::Concrete));
        }
    }

    Some(Building {
        min,
        max,
        base_y,
        height,
    })
}

/// World position of the centre of the first empty cell above column (x, z).
pub fn surface_position(world: &VoxelWorld, x: i32, z: i32) -> Option<Vec3> {
    let y = world.find_surface_height(x, z)?;
    Some(voxel_to_world(IVec3::new(x, y, z), world.voxel_size()))
}
