//! Line-based preset text format.
//!
//! ```text
//! name = Warm
//! filter = SplitTone
//! category = Toning
//! float Balance = 0.25
//! point Point0 = 0, 0.1
//! rgb8 Tint = 10, 20, 30
//! curve Tone = points=[ 0 0, 0.5 0.6, 1 1 ]
//! ```
//!
//! Header lines are `key = value`; every other line is
//! `<kind> <key> = <value>`. The explicit kind keeps the round trip
//! lossless. Empty lines and lines starting with `#` are skipped.
//!
//! Kinds: `float`, `int`, `uint`, `char` (code point), `switch`,
//! `string` (double-quoted, `\\`, `\"` and `\n` escaped), `point`,
//! `position`, `line`, `rect`, `rgb8`, `rgb16`, `argb8`, `argb16`,
//! `mono8`, `mono16`, `curve`.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use blacksilk_core::{Argb8, Argb16, Line32F, Mono8, Mono16, Point32F, Point32I, Rect32I, Rgb8, Rgb16};

#[allow(unused_imports)]
use tracing::{trace, warn};

use super::FilterPreset;
use crate::PresetError;

// ============================================================================
// Curve points
// ============================================================================

/// Formats curve points as `points=[ x0 y0, x1 y1 ]`.
///
/// ```rust
/// use blacksilk_core::Point32F;
/// use blacksilk_graphics::preset::points_to_string;
///
/// let s = points_to_string(&[Point32F::new(0.0, 0.0), Point32F::new(1.0, 0.5)]);
/// assert_eq!(s, "points=[ 0 0, 1 0.5 ]");
/// ```
pub fn points_to_string(points: &[Point32F]) -> String {
    let mut out = String::from("points=[ ");
    for (i, p) in points.iter().enumerate() {
        let sep = if i + 1 == points.len() { " " } else { ", " };
        let _ = write!(out, "{} {}{}", p.x, p.y, sep);
    }
    out.push(']');
    out
}

/// Parses `points=[ x0 y0, x1 y1 ]`; the `points=` prefix is optional.
///
/// Tokens that are not exactly two numbers are dropped.
pub fn points_from_string(s: &str) -> Vec<Point32F> {
    let s = s.trim();
    let s = s.strip_prefix("points=").unwrap_or(s).trim();
    let s = s.trim_start_matches('[').trim_end_matches(']');
    s.split(',')
        .filter_map(|token| {
            let parts: Vec<&str> = token.split_whitespace().collect();
            match parts.as_slice() {
                [x, y] => Some(Point32F::new(x.parse().ok()?, y.parse().ok()?)),
                _ => {
                    if !token.trim().is_empty() {
                        trace!(token, "dropping malformed curve point");
                    }
                    None
                }
            }
        })
        .collect()
}

// ============================================================================
// Writing
// ============================================================================

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name = {}", self.name())?;
        writeln!(f, "filter = {}", self.filter_name())?;
        if !self.category().is_empty() {
            writeln!(f, "category = {}", self.category())?;
        }
        for (k, v) in self.floats() {
            writeln!(f, "float {k} = {v}")?;
        }
        for (k, v) in self.ints() {
            writeln!(f, "int {k} = {v}")?;
        }
        for (k, v) in self.uints() {
            writeln!(f, "uint {k} = {v}")?;
        }
        for (k, v) in self.chars() {
            writeln!(f, "char {k} = {}", *v as u32)?;
        }
        for (k, v) in self.switches() {
            writeln!(f, "switch {k} = {v}")?;
        }
        for (k, v) in self.strings() {
            writeln!(f, "string {k} = {}", escape(v))?;
        }
        for (k, v) in self.points() {
            writeln!(f, "point {k} = {}, {}", v.x, v.y)?;
        }
        for (k, v) in self.positions() {
            writeln!(f, "position {k} = {}, {}", v.x, v.y)?;
        }
        for (k, v) in self.lines() {
            writeln!(f, "line {k} = {}, {}, {}, {}", v.start.x, v.start.y, v.end.x, v.end.y)?;
        }
        for (k, v) in self.rects() {
            writeln!(f, "rect {k} = {}, {}, {}, {}", v.x, v.y, v.width, v.height)?;
        }
        for (k, v) in self.rgb8s() {
            writeln!(f, "rgb8 {k} = {}, {}, {}", v.r, v.g, v.b)?;
        }
        for (k, v) in self.rgb16s() {
            writeln!(f, "rgb16 {k} = {}, {}, {}", v.r, v.g, v.b)?;
        }
        for (k, v) in self.argb8s() {
            writeln!(f, "argb8 {k} = {}, {}, {}, {}", v.a, v.r, v.g, v.b)?;
        }
        for (k, v) in self.argb16s() {
            writeln!(f, "argb16 {k} = {}, {}, {}, {}", v.a, v.r, v.g, v.b)?;
        }
        for (k, v) in self.mono8s() {
            writeln!(f, "mono8 {k} = {}", v.0)?;
        }
        for (k, v) in self.mono16s() {
            writeln!(f, "mono16 {k} = {}", v.0)?;
        }
        for (k, v) in self.curves() {
            writeln!(f, "curve {k} = {}", points_to_string(v))?;
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_list<T: FromStr>(value: &str, count: usize) -> Option<Vec<T>> {
    let items: Vec<T> = value
        .split(',')
        .map(|t| t.trim().parse().ok())
        .collect::<Option<_>>()?;
    (items.len() == count).then_some(items)
}

fn parse_one<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

fn unescape(value: &str) -> Option<String> {
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

/// Stores one `<kind> <key> = <value>` entry; `None` if the value does not
/// parse, `Some(false)` for an unknown kind.
fn apply_entry(preset: &mut FilterPreset, kind: &str, key: String, value: &str) -> Option<bool> {
    match kind {
        "float" => {
            preset.floats_mut().insert(key, parse_one(value)?);
        }
        "int" => {
            preset.ints_mut().insert(key, parse_one(value)?);
        }
        "uint" => {
            preset.uints_mut().insert(key, parse_one(value)?);
        }
        "char" => {
            preset.chars_mut().insert(key, char::from_u32(parse_one(value)?)?);
        }
        "switch" => {
            preset.switches_mut().insert(key, parse_one(value)?);
        }
        "string" => {
            preset.strings_mut().insert(key, unescape(value)?);
        }
        "point" => {
            let v: Vec<f32> = parse_list(value, 2)?;
            preset.points_mut().insert(key, Point32F::new(v[0], v[1]));
        }
        "position" => {
            let v: Vec<i32> = parse_list(value, 2)?;
            preset.positions_mut().insert(key, Point32I::new(v[0], v[1]));
        }
        "line" => {
            let v: Vec<f32> = parse_list(value, 4)?;
            let line = Line32F::new(Point32F::new(v[0], v[1]), Point32F::new(v[2], v[3]));
            preset.lines_mut().insert(key, line);
        }
        "rect" => {
            let v: Vec<i32> = parse_list(value, 4)?;
            preset.rects_mut().insert(key, Rect32I::new(v[0], v[1], v[2], v[3]));
        }
        "rgb8" => {
            let v: Vec<u8> = parse_list(value, 3)?;
            preset.rgb8s_mut().insert(key, Rgb8::new(v[0], v[1], v[2]));
        }
        "rgb16" => {
            let v: Vec<u16> = parse_list(value, 3)?;
            preset.rgb16s_mut().insert(key, Rgb16::new(v[0], v[1], v[2]));
        }
        "argb8" => {
            let v: Vec<u8> = parse_list(value, 4)?;
            preset.argb8s_mut().insert(key, Argb8::new(v[0], v[1], v[2], v[3]));
        }
        "argb16" => {
            let v: Vec<u16> = parse_list(value, 4)?;
            preset.argb16s_mut().insert(key, Argb16::new(v[0], v[1], v[2], v[3]));
        }
        "mono8" => {
            preset.mono8s_mut().insert(key, Mono8(parse_one(value)?));
        }
        "mono16" => {
            preset.mono16s_mut().insert(key, Mono16(parse_one(value)?));
        }
        "curve" => {
            preset.curves_mut().insert(key, points_from_string(value));
        }
        _ => return Some(false),
    }
    Some(true)
}

impl FromStr for FilterPreset {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut preset = FilterPreset::default();
        for (index, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parse_err = |msg: String| PresetError::Parse { line: index + 1, msg };

            let Some((lhs, value)) = line.split_once('=') else {
                return Err(parse_err(format!("expected '=' in '{line}'")));
            };
            let lhs = lhs.trim();
            let value = value.trim();

            match lhs.split_once(char::is_whitespace) {
                None => match lhs {
                    "name" => preset.set_name(value),
                    "filter" => preset.set_filter_name(value),
                    "category" => preset.set_category(value),
                    other => return Err(parse_err(format!("unknown header '{other}'"))),
                },
                Some((kind, key)) => match apply_entry(&mut preset, kind, key.trim().to_string(), value) {
                    Some(true) => {}
                    Some(false) => return Err(parse_err(format!("unknown value kind '{kind}'"))),
                    None => return Err(parse_err(format!("invalid {kind} value '{value}'"))),
                },
            }
        }
        Ok(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_from_string_drops_malformed_tokens() {
        let points = points_from_string("points=[ 0 0, bogus, 0.5 0.25 1, 1 1 ]");
        assert_eq!(points, vec![Point32F::new(0.0, 0.0), Point32F::new(1.0, 1.0)]);
        assert!(points_from_string("points=[ ]").is_empty());
    }

    #[test]
    fn test_points_round_trip() {
        let points = vec![Point32F::new(0.0, 0.1), Point32F::new(0.4, 0.55), Point32F::new(1.0, 0.9)];
        assert_eq!(points_from_string(&points_to_string(&points)), points);
        assert_eq!(points_to_string(&[]), "points=[ ]");
    }

    #[test]
    fn test_every_kind_round_trips() {
        let mut preset = FilterPreset::for_filter("All", "Custom");
        preset.set_category("Tests");
        preset.set_float("f", -0.1);
        preset.set_int("i", -3);
        preset.uints_mut().insert("u".into(), 7);
        preset.chars_mut().insert("c".into(), ' ');
        preset.switches_mut().insert("s".into(), true);
        preset.strings_mut().insert("text".into(), "a \"quoted\" = line\nnext".into());
        preset.set_point("p", Point32F::new(0.5, 0.25));
        preset.positions_mut().insert("pos".into(), Point32I::new(-4, 9));
        preset
            .lines_mut()
            .insert("l".into(), Line32F::new(Point32F::new(0.0, 1.0), Point32F::new(2.5, 3.0)));
        preset.rects_mut().insert("r".into(), Rect32I::new(1, 2, 3, 4));
        preset.rgb8s_mut().insert("rgb8".into(), Rgb8::new(1, 2, 3));
        preset.rgb16s_mut().insert("rgb16".into(), Rgb16::new(1000, 2000, 3000));
        preset.argb8s_mut().insert("argb8".into(), Argb8::new(4, 1, 2, 3));
        preset.argb16s_mut().insert("argb16".into(), Argb16::new(9, 1, 2, 3));
        preset.mono8s_mut().insert("m8".into(), Mono8(200));
        preset.mono16s_mut().insert("m16".into(), Mono16(60000));
        preset
            .curves_mut()
            .insert("tone".into(), vec![Point32F::new(0.0, 0.0), Point32F::new(1.0, 1.0)]);

        let parsed: FilterPreset = preset.to_string().parse().unwrap();
        assert_eq!(parsed, preset);
    }

    #[test]
    fn test_kind_disambiguates_point_and_position() {
        let parsed: FilterPreset = "name = x\nfilter = y\npoint a = 1, 2\nposition b = 1, 2\n".parse().unwrap();
        assert_eq!(parsed.points()["a"], Point32F::new(1.0, 2.0));
        assert_eq!(parsed.positions()["b"], Point32I::new(1, 2));
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = "name = x\n\nfloat Broken = abc\n".parse::<FilterPreset>().unwrap_err();
        assert!(matches!(err, PresetError::Parse { line: 3, .. }));
        let err = "name = x\nvector v = 1\n".parse::<FilterPreset>().unwrap_err();
        assert!(matches!(err, PresetError::Parse { line: 2, .. }));
        let err = "just text\n".parse::<FilterPreset>().unwrap_err();
        assert!(matches!(err, PresetError::Parse { line: 1, .. }));
    }
}
