//! Colour ramps for normalized saliency values.

use serde::{Deserialize, Serialize};

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    /// black -> red -> yellow -> white
    #[default]
    Heat,
    /// blue -> white -> red, centred on 0.5
    Diverging,
    /// Two-point approximation of viridis.
    Viridis,
}

const VIRIDIS_LOW: [f64; 3] = [68.0, 1.0, 84.0];
const VIRIDIS_HIGH: [f64; 3] = [253.0, 231.0, 37.0];

fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Colour for a saliency value already normalized to `[0, 1]`.
///
/// Values outside the unit interval are clamped; NaN maps to the low end.
pub fn color_for(normalized: f64, scheme: ColorScheme) -> Rgb {
    let t = if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 1.0)
    };
    match scheme {
        ColorScheme::Heat => {
            if t < 1.0 / 3.0 {
                Rgb::new(channel(t * 3.0), 0, 0)
            } else if t < 2.0 / 3.0 {
                Rgb::new(255, channel((t - 1.0 / 3.0) * 3.0), 0)
            } else {
                Rgb::new(255, 255, channel((t - 2.0 / 3.0) * 3.0))
            }
        }
        ColorScheme::Diverging => {
            if t < 0.5 {
                let s = channel(t * 2.0);
                Rgb::new(s, s, 255)
            } else {
                let s = channel((1.0 - t) * 2.0);
                Rgb::new(255, s, s)
            }
        }
        ColorScheme::Viridis => {
            let lerp = |i: usize| {
                (VIRIDIS_LOW[i] + (VIRIDIS_HIGH[i] - VIRIDIS_LOW[i]) * t).round() as u8
            };
            Rgb::new(lerp(0), lerp(1), lerp(2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heat_endpoints_and_bands() {
        assert_eq!(color_for(0.0, ColorScheme::Heat), Rgb::new(0, 0, 0));
        assert_eq!(color_for(1.0, ColorScheme::Heat), Rgb::new(255, 255, 255));
        assert_eq!(color_for(0.5, ColorScheme::Heat), Rgb::new(255, 128, 0));
    }

    #[test]
    fn test_diverging_is_white_at_midpoint() {
        assert_eq!(color_for(0.0, ColorScheme::Diverging), Rgb::new(0, 0, 255));
        assert_eq!(color_for(0.5, ColorScheme::Diverging), Rgb::new(255, 255, 255));
        assert_eq!(color_for(1.0, ColorScheme::Diverging), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(color_for(0.0, ColorScheme::Viridis), Rgb::new(68, 1, 84));
        assert_eq!(color_for(1.0, ColorScheme::Viridis), Rgb::new(253, 231, 37));
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(
            color_for(-3.0, ColorScheme::Heat),
            color_for(0.0, ColorScheme::Heat)
        );
        assert_eq!(
            color_for(7.0, ColorScheme::Viridis),
            color_for(1.0, ColorScheme::Viridis)
        );
        assert_eq!(color_for(f64::NAN, ColorScheme::Heat), Rgb::new(0, 0, 0));
        assert_eq!(Rgb::new(255, 16, 0).to_hex(), "#ff1000");
    }
}
