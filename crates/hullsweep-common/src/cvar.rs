// cvar.rs — Collision tunables registry and movement config snapshot

use std::collections::HashMap;

use thiserror::Error;

use crate::shared::{Vec3, AXES};

pub const COL_STOP_EPSILON: &str = "col_stop_epsilon";
pub const COL_PUSH_NUDGE: &str = "col_push_nudge";
pub const COL_CLIMB_HEIGHT: &str = "col_climb_height";
pub const COL_MIN_FLOOR_NORMAL: &str = "col_min_floor_normal";
pub const COL_WALL_NORMAL: &str = "col_wall_normal";
pub const COL_SLIDE_BUMPS: &str = "col_slide_bumps";
pub const COL_UP_AXIS: &str = "col_up_axis";

/// name, default, min, max
const DEFAULT_CVARS: [(&str, f32, f32, f32); 7] = [
    (COL_STOP_EPSILON, 0.03125, 0.0, 1.0),
    (COL_PUSH_NUDGE, 0.001, 0.0, 1.0),
    (COL_CLIMB_HEIGHT, 18.0, 0.0, 1024.0),
    (COL_MIN_FLOOR_NORMAL, 0.7, 0.0, 1.0),
    (COL_WALL_NORMAL, 0.3, 0.0, 1.0),
    (COL_SLIDE_BUMPS, 4.0, 1.0, 16.0),
    (COL_UP_AXIS, 2.0, 0.0, 2.0),
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CvarError {
    #[error("unknown variable \"{0}\"")]
    Unknown(String),
    #[error("\"{value}\" is not a number (setting {name})")]
    Parse { name: String, value: String },
}

/// A named float tunable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub modified: bool,
}

#[derive(Debug, Clone)]
pub struct CvarRegistry {
    pub cvar_vars: Vec<Cvar>,
    /// name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl Default for CvarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CvarRegistry {
    /// Registry holding every collision tunable at its default.
    pub fn new() -> Self {
        let mut registry = Self {
            cvar_vars: Vec::with_capacity(DEFAULT_CVARS.len()),
            cvar_index: HashMap::new(),
        };
        for (name, default, min, max) in DEFAULT_CVARS {
            registry.register(name, default, min, max);
        }
        registry
    }

    /// Add a tunable, or return the existing one's index unchanged.
    pub fn register(&mut self, name: &str, default: f32, min: f32, max: f32) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            return idx;
        }
        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: format_value(default),
            value: default,
            default,
            min,
            max,
            modified: true,
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Current value, or 0 for an unknown name.
    pub fn value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Parse and assign a value from text, as typed at a console.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), CvarError> {
        if !self.cvar_index.contains_key(name) {
            return Err(CvarError::Unknown(name.to_string()));
        }
        let parsed: f32 = value
            .trim()
            .parse()
            .ok()
            .filter(|v: &f32| v.is_finite())
            .ok_or_else(|| CvarError::Parse {
                name: name.to_string(),
                value: value.to_string(),
            })?;
        self.set_value(name, parsed)
    }

    /// Assign a value, clamping it into the variable's range.
    pub fn set_value(&mut self, name: &str, value: f32) -> Result<(), CvarError> {
        let idx = *self
            .cvar_index
            .get(name)
            .ok_or_else(|| CvarError::Unknown(name.to_string()))?;
        let var = &mut self.cvar_vars[idx];

        let clamped = value.clamp(var.min, var.max);
        if clamped != value {
            log::warn!(
                "{} {} out of range [{}, {}], clamped to {}",
                var.name,
                value,
                var.min,
                var.max,
                clamped
            );
        }
        if clamped != var.value {
            var.modified = true;
        }
        var.value = clamped;
        var.string = format_value(clamped);
        Ok(())
    }

    /// Restore every variable to its default.
    pub fn reset(&mut self) {
        for var in &mut self.cvar_vars {
            if var.value != var.default {
                var.modified = true;
            }
            var.value = var.default;
            var.string = format_value(var.default);
        }
    }

    /// True if anything changed since the last call; clears the flags.
    pub fn take_modified(&mut self) -> bool {
        let mut any = false;
        for var in &mut self.cvar_vars {
            if var.modified {
                any = true;
                var.modified = false;
            }
        }
        any
    }
}

fn format_value(value: f32) -> String {
    if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// ============================================================
// Movement config
// ============================================================

/// Plain snapshot of the movement tunables, taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveConfig {
    /// Clearance kept from a surface after a hit.
    pub stop_epsilon: f32,
    /// Extra distance added to push-outs.
    pub push_nudge: f32,
    pub climb_height: f32,
    /// Floors with `normal · up` below this are too steep to stand on.
    pub min_floor_normal: f32,
    /// Blockers with `|normal · up|` below this count as walls.
    pub wall_normal: f32,
    pub slide_bumps: usize,
    pub up_axis: usize,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            stop_epsilon: 0.03125,
            push_nudge: 0.001,
            climb_height: 18.0,
            min_floor_normal: 0.7,
            wall_normal: 0.3,
            slide_bumps: 4,
            up_axis: 2,
        }
    }
}

impl MoveConfig {
    pub fn from_cvars(cvars: &CvarRegistry) -> Self {
        Self {
            stop_epsilon: cvars.value(COL_STOP_EPSILON),
            push_nudge: cvars.value(COL_PUSH_NUDGE),
            climb_height: cvars.value(COL_CLIMB_HEIGHT),
            min_floor_normal: cvars.value(COL_MIN_FLOOR_NORMAL),
            wall_normal: cvars.value(COL_WALL_NORMAL),
            slide_bumps: cvars.value(COL_SLIDE_BUMPS).round().max(1.0) as usize,
            up_axis: (cvars.value(COL_UP_AXIS).round().max(0.0) as usize).min(2),
        }
    }

    pub fn up_vector(&self) -> Vec3 {
        AXES[self.up_axis.min(2)]
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let cvars = CvarRegistry::new();
        assert_eq!(MoveConfig::from_cvars(&cvars), MoveConfig::default());
        assert_eq!(cvars.find_var(COL_CLIMB_HEIGHT).unwrap().string, "18");
    }

    #[test]
    fn test_set_parses_and_flags_modified() {
        let mut cvars = CvarRegistry::new();
        assert!(cvars.take_modified());
        assert!(!cvars.take_modified());
        cvars.set(COL_CLIMB_HEIGHT, " 24 ").unwrap();
        assert_eq!(cvars.value(COL_CLIMB_HEIGHT), 24.0);
        assert!(cvars.take_modified());
        assert_eq!(MoveConfig::from_cvars(&cvars).climb_height, 24.0);
    }

    #[test]
    fn test_set_errors() {
        let mut cvars = CvarRegistry::new();
        assert_eq!(
            cvars.set("col_gravity", "1"),
            Err(CvarError::Unknown("col_gravity".to_string()))
        );
        assert!(matches!(
            cvars.set(COL_WALL_NORMAL, "steep"),
            Err(CvarError::Parse { .. })
        ));
        assert!(cvars.set(COL_WALL_NORMAL, "nan").is_err());
        assert_eq!(cvars.value(COL_WALL_NORMAL), 0.3);
    }

    #[test]
    fn test_out_of_range_clamped() {
        let mut cvars = CvarRegistry::new();
        cvars.set(COL_MIN_FLOOR_NORMAL, "1.5").unwrap();
        assert_eq!(cvars.value(COL_MIN_FLOOR_NORMAL), 1.0);
        cvars.set_value(COL_UP_AXIS, 1.0).unwrap();
        let config = MoveConfig::from_cvars(&cvars);
        assert_eq!(config.up_vector(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut cvars = CvarRegistry::new();
        cvars.set_value(COL_SLIDE_BUMPS, 8.0).unwrap();
        cvars.take_modified();
        cvars.reset();
        assert!(cvars.take_modified());
        assert_eq!(MoveConfig::from_cvars(&cvars).slide_bumps, 4);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut cvars = CvarRegistry::new();
        let a = cvars.register("col_extra", 2.0, 0.0, 4.0);
        let b = cvars.register("col_extra", 3.0, 0.0, 4.0);
        assert_eq!(a, b);
        assert_eq!(cvars.value("col_extra"), 2.0);
    }
}
