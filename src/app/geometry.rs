//! Device geometry resolution: flags, then `FET_*` environment variables
//! (including a `.env` file), then prompts.

use crate::cli::GeometryArgs;
use crate::cli::picker::{parse_positive, prompt_positive};
use crate::domain::DeviceGeometry;
use crate::error::AppError;

pub const ENV_LENGTH: &str = "FET_LENGTH";
pub const ENV_WIDTH: &str = "FET_WIDTH";
pub const ENV_CAPACITANCE: &str = "FET_CAPACITANCE";
pub const ENV_DIELECTRIC_CONSTANT: &str = "FET_DIELECTRIC_CONSTANT";
pub const ENV_DIELECTRIC_THICKNESS: &str = "FET_DIELECTRIC_THICKNESS";

/// Resolve the session geometry from flags, the environment and stdin.
pub fn resolve_geometry(args: &GeometryArgs) -> Result<DeviceGeometry, AppError> {
    dotenvy::dotenv().ok();
    resolve_with(args, |key| std::env::var(key).ok(), prompt_positive)
}

/// Resolution with injectable environment lookup and prompt.
pub fn resolve_with<E, P>(args: &GeometryArgs, env: E, mut prompt: P) -> Result<DeviceGeometry, AppError>
where
    E: Fn(&str) -> Option<String>,
    P: FnMut(&str) -> Result<f64, AppError>,
{
    let mut value = |flag: Option<f64>, key: &str, label: &str| -> Result<f64, AppError> {
        match lookup(flag, key, &env)? {
            Some(v) => Ok(v),
            None => prompt(label),
        }
    };

    let length = value(args.length, ENV_LENGTH, "length")?;
    let width = value(args.width, ENV_WIDTH, "width")?;

    let geometry = match lookup(args.capacitance, ENV_CAPACITANCE, &env)? {
        Some(capacitance) => DeviceGeometry::new(length, width, capacitance),
        None => {
            let k = value(args.dielectric_constant, ENV_DIELECTRIC_CONSTANT, "the dielectric constant")?;
            let t = value(
                args.dielectric_thickness,
                ENV_DIELECTRIC_THICKNESS,
                "the dielectric layer thickness",
            )?;
            DeviceGeometry::from_dielectric(length, width, k, t)
        }
    };

    geometry.map_err(|msg| AppError::new(2, msg))
}

fn lookup<E>(flag: Option<f64>, key: &str, env: &E) -> Result<Option<f64>, AppError>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(v) = flag {
        return Ok(Some(v));
    }
    match env(key) {
        Some(raw) if !raw.trim().is_empty() => parse_positive(&raw)
            .map(Some)
            .map_err(|msg| AppError::new(2, format!("{key}: {msg}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::VACUUM_PERMITTIVITY_F_PER_CM;

    fn no_prompt(label: &str) -> Result<f64, AppError> {
        Err(AppError::new(2, format!("unexpected prompt for {label}")))
    }

    #[test]
    fn flags_win_over_environment() {
        let args = GeometryArgs {
            length: Some(2.0),
            width: Some(4.0),
            capacitance: Some(1e-8),
            ..GeometryArgs::default()
        };
        let env = |key: &str| (key == ENV_LENGTH).then(|| "99".to_string());
        let g = resolve_with(&args, env, no_prompt).unwrap();
        assert_eq!(g.length, 2.0);
        assert_eq!(g.capacitance, 1e-8);
    }

    #[test]
    fn environment_supplies_dielectric() {
        let vars: HashMap<&str, &str> = [
            (ENV_LENGTH, "0.005"),
            (ENV_WIDTH, "0.1"),
            (ENV_DIELECTRIC_CONSTANT, "3.9"),
            (ENV_DIELECTRIC_THICKNESS, "3e-5"),
        ]
        .into_iter()
        .collect();
        let env = |key: &str| vars.get(key).map(|v| v.to_string());
        let g = resolve_with(&GeometryArgs::default(), env, no_prompt).unwrap();
        let expected = 3.9 * VACUUM_PERMITTIVITY_F_PER_CM / 3e-5;
        assert!((g.capacitance - expected).abs() < 1e-20);
    }

    #[test]
    fn prompts_for_missing_values() {
        let mut asked = Vec::new();
        let prompt = |label: &str| {
            asked.push(label.to_string());
            Ok(1.0)
        };
        let g = resolve_with(&GeometryArgs::default(), |_| None, prompt).unwrap();
        assert_eq!(g.length, 1.0);
        assert_eq!(
            asked,
            ["length", "width", "the dielectric constant", "the dielectric layer thickness"]
        );
    }

    #[test]
    fn invalid_environment_value_is_an_error() {
        let env = |key: &str| (key == ENV_WIDTH).then(|| "wide".to_string());
        let args = GeometryArgs {
            length: Some(1.0),
            ..GeometryArgs::default()
        };
        let err = resolve_with(&args, env, no_prompt).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains(ENV_WIDTH));
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let args = GeometryArgs {
            length: Some(-1.0),
            width: Some(1.0),
            capacitance: Some(1.0),
            ..GeometryArgs::default()
        };
        assert!(resolve_with(&args, |_| None, no_prompt).is_err());
    }
}
