// src/material_name.rs
//! Name markers and material name normalisation.

/// Names containing this are physics-only collision geometry.
pub const COLLISION_PROXY: &str = "collision_proxy";
/// Vehicle variant of [`COLLISION_PROXY`].
pub const COLLISION_PROXY_VEHICLE: &str = "nomaterial_vehicle";
/// Names containing this are raycast-only geometry and never drawn.
pub const RAYCAST_PROXY: &str = "raycast_proxy";

const ENGINE_FOLDER: &str = "engine/";

pub fn is_collision_proxy_name(name: &str) -> bool {
    name.contains(COLLISION_PROXY) || name.contains(COLLISION_PROXY_VEHICLE)
}

pub fn is_raycast_proxy_name(name: &str) -> bool {
    name.contains(RAYCAST_PROXY)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() || s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}

/// Canonical form of a material file reference: forward slashes, no
/// extension, relative to the game folder.
///
/// Only the last extension is removed, and only when it sits after the final
/// separator. A leading `./`, `engine/` and `<game_folder>/` are dropped in
/// that order.
pub fn unify_material_name(input: &str, game_folder: &str) -> String {
    let mut name = input.replace('\\', "/");

    let last_slash = name.rfind('/');
    if let Some(dot) = name.rfind('.') {
        if last_slash.map_or(true, |slash| dot > slash) {
            name.truncate(dot);
        }
    }

    let mut rest = name.as_str();
    if let Some(r) = rest.strip_prefix("./") {
        rest = r;
    }
    if let Some(r) = strip_prefix_ignore_case(rest, ENGINE_FOLDER) {
        rest = r;
    }
    if !game_folder.is_empty() {
        let folder = format!("{}/", game_folder.trim_end_matches(['/', '\\']));
        if let Some(r) = strip_prefix_ignore_case(rest, &folder) {
            rest = r;
        }
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME: &str = "SamplesProject";

    #[test]
    fn markers() {
        assert!(is_raycast_proxy_name("weapon_raycast_proxy"));
        assert!(is_collision_proxy_name("door_collision_proxy"));
        assert!(is_collision_proxy_name("car_nomaterial_vehicle"));
        assert!(!is_collision_proxy_name("plain_wood"));
        assert!(!is_raycast_proxy_name("plain_wood"));
    }

    #[test]
    fn strips_only_the_last_extension() {
        assert_eq!(unify_material_name("blahblah.mtl", GAME), "blahblah");
        assert_eq!(
            unify_material_name("test/.mat.mat/blahblah.mat.mat.abc.test.mtl", GAME),
            "test/.mat.mat/blahblah.mat.mat.abc.test"
        );
        assert_eq!(
            unify_material_name(".mat.mat.blahblah.mat.mat.abc.test.mtl", GAME),
            ".mat.mat.blahblah.mat.mat.abc.test"
        );
        assert_eq!(unify_material_name("materials/blahblah.mat", GAME), "materials/blahblah");
    }

    #[test]
    fn dot_in_folder_name_is_not_an_extension() {
        assert_eq!(unify_material_name("dir.v2/rock", GAME), "dir.v2/rock");
    }

    #[test]
    fn strips_leading_folders() {
        assert_eq!(unify_material_name(".\\blahblah.mat", GAME), "blahblah");
        assert_eq!(
            unify_material_name("./materials/blahblah.mat.mat.abc.test", GAME),
            "materials/blahblah.mat.mat.abc"
        );
        assert_eq!(
            unify_material_name(".\\engine\\materials\\blahblah.mat.mat.abc.test", GAME),
            "materials/blahblah.mat.mat.abc"
        );
        assert_eq!(
            unify_material_name("engine/materials/blahblah.mat.mat.abc.test", GAME),
            "materials/blahblah.mat.mat.abc"
        );
        assert_eq!(
            unify_material_name(".\\SamplesProject\\materials\\blahblah.mat.mat.abc.test", GAME),
            "materials/blahblah.mat.mat.abc"
        );
        assert_eq!(
            unify_material_name("samplesproject/materials/rock.mtl", GAME),
            "materials/rock"
        );
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(unify_material_name("", GAME), "");
        assert_eq!(unify_material_name("materials/rock.mtl", ""), "materials/rock");
    }
}
