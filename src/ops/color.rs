// ============================================================================
// COLOR HELPERS — HSL conversion and clamped channel arithmetic
// ============================================================================

use rand::Rng;

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// HSL (H: 0..1, S: 0..1, L: 0..1) → RGB (0..1)
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (r, g, b)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 { return p + (q - p) * 6.0 * t; }
    if t < 1.0 / 2.0 { return q; }
    if t < 2.0 / 3.0 { return p + (q - p) * (2.0 / 3.0 - t) * 6.0; }
    p
}

/// An HSL triple in the units the brushes reason in:
/// hue in degrees, saturation and lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Hsl {
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        let (h, s, l) = rgb_to_hsl(
            rgb[0] as f32 / 255.0,
            rgb[1] as f32 / 255.0,
            rgb[2] as f32 / 255.0,
        );
        Self {
            hue: h * 360.0,
            saturation: s * 100.0,
            lightness: l * 100.0,
        }
    }

    /// Apply offsets, wrapping hue and clamping saturation/lightness to 0..=100.
    pub fn shifted(self, d_hue: f32, d_sat: f32, d_light: f32) -> Self {
        Self {
            hue: (self.hue + d_hue).rem_euclid(360.0),
            saturation: (self.saturation + d_sat).clamp(0.0, 100.0),
            lightness: (self.lightness + d_light).clamp(0.0, 100.0),
        }
    }

    pub fn to_rgb(self) -> [u8; 3] {
        let (r, g, b) = hsl_to_rgb(
            self.hue / 360.0,
            self.saturation / 100.0,
            self.lightness / 100.0,
        );
        [unit_to_u8(r), unit_to_u8(g), unit_to_u8(b)]
    }
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Add an independent offset in `-amount..=amount` to each channel.
pub fn jitter_rgb<R: Rng + ?Sized>(rgb: [u8; 3], amount: i32, rng: &mut R) -> [u8; 3] {
    let mut out = rgb;
    for c in out.iter_mut() {
        let delta = rng.gen_range(-amount..=amount);
        *c = (*c as i32 + delta).clamp(0, 255) as u8;
    }
    out
}

/// Multiply each channel by `factor`.
pub fn scale_rgb(rgb: [u8; 3], factor: f32) -> [u8; 3] {
    rgb.map(|c| (c as f32 * factor).round().clamp(0.0, 255.0) as u8)
}

/// Subtract `amount` from every channel, saturating at 0.
pub fn darken_rgb(rgb: [u8; 3], amount: u8) -> [u8; 3] {
    rgb.map(|c| c.saturating_sub(amount))
}

/// Parse `#RRGGBB` / `RRGGBB` or `r,g,b`.
pub fn parse_color(s: &str) -> Option<[u8; 3]> {
    let s = s.trim();
    if s.contains(',') {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 3 {
            return None;
        }
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        return Some([r, g, b]);
    }
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

pub fn format_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn hsl_round_trip_primary_colors() {
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [128, 64, 200]] {
            let back = Hsl::from_rgb(rgb).to_rgb();
            for c in 0..3 {
                assert!((back[c] as i32 - rgb[c] as i32).abs() <= 1, "{:?} -> {:?}", rgb, back);
            }
        }
    }

    #[test]
    fn shifted_wraps_hue_and_clamps() {
        let hsl = Hsl { hue: 350.0, saturation: 95.0, lightness: 3.0 };
        let out = hsl.shifted(20.0, 10.0, -10.0);
        assert!((out.hue - 10.0).abs() < 1e-3);
        assert_eq!(out.saturation, 100.0);
        assert_eq!(out.lightness, 0.0);
    }

    #[test]
    fn jitter_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let out = jitter_rgb([250, 5, 128], 15, &mut rng);
            assert!(out[0] >= 235);
            assert!(out[1] <= 20);
            assert!((113..=143).contains(&out[2]));
        }
    }

    #[test]
    fn parse_color_forms() {
        assert_eq!(parse_color("#ff8000"), Some([255, 128, 0]));
        assert_eq!(parse_color("00ff00"), Some([0, 255, 0]));
        assert_eq!(parse_color("1, 2, 3"), Some([1, 2, 3]));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(format_color([255, 128, 0]), "#ff8000");
    }
}
