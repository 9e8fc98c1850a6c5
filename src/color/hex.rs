use crate::error::{PaletteError, PaletteResult};

/// `[26, 43, 60]` -> `"#1a2b3c"`
pub fn encode(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Encode a floating-point centroid, rounding each channel and clamping it to `[0, 255]`.
pub fn encode_channels(channels: [f32; 3]) -> String {
    let quantize = |c: f32| -> u8 {
        if c.is_nan() {
            0
        } else {
            c.round().clamp(0.0, 255.0) as u8
        }
    };
    encode([quantize(channels[0]), quantize(channels[1]), quantize(channels[2])])
}

/// Parse `#rrggbb` (case-insensitive, `#` optional).
pub fn decode(hex: &str) -> PaletteResult<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(PaletteError::invalid_parameter(
            "color",
            format!("'{hex}' is not a 6-digit hex color"),
        ));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|e| {
            PaletteError::invalid_parameter("color", format!("'{hex}' is not a hex color: {e}"))
        })
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}
