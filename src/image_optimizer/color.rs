//! Background color parsing
//!
//! Accepted spellings: a color name, `r,g,b`, `#rgb`, `#rrggbb`, the same hex
//! forms without `#` or with a literal `%23` prefix. Anything else means "no
//! background override".

/// RGB triple
pub type Rgb = [u8; 3];

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("navy", [0, 0, 128]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
];

pub fn parse_color(value: &str) -> Option<Rgb> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let lower = value.to_lowercase();
    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Some(*rgb);
    }

    if lower.contains(',') {
        return parse_rgb_list(&lower);
    }

    let hex_digits = lower
        .strip_prefix('#')
        .or_else(|| lower.strip_prefix("%23"))
        .unwrap_or(&lower);

    parse_hex(hex_digits)
}

/// `r,g,b` with each channel clamped to 255; an unreadable channel is 0
fn parse_rgb_list(value: &str) -> Option<Rgb> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 3 {
        return None;
    }

    let channel = |s: &str| match s.trim().parse::<u64>() {
        Ok(v) => v.min(255) as u8,
        Err(_) => 0,
    };
    Some([channel(parts[0]), channel(parts[1]), channel(parts[2])])
}

fn parse_hex(digits: &str) -> Option<Rgb> {
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };

    let bytes = hex::decode(expanded).ok()?;
    <Rgb>::try_from(bytes.as_slice()).ok()
}

/// Canonical `r,g,b` spelling used in the options digest
pub fn format_color(color: Option<Rgb>) -> String {
    match color {
        Some([r, g, b]) => format!("{},{},{}", r, g, b),
        None => String::new(),
    }
}
