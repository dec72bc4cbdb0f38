//! `Accept` header parsing and output MIME type negotiation

/// One media range from an `Accept` header (e.g. `image/*;q=0.8`)
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    main: String,
    sub: String,
    quality: f32,
}

impl MediaRange {
    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        let (main, sub) = essence.split_once('/')?;
        if main.is_empty() || sub.is_empty() {
            return None;
        }

        let mut quality = 1.0;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim() == "q" {
                    quality = value.trim().parse::<f32>().ok()?.clamp(0.0, 1.0);
                }
            }
        }

        Some(MediaRange {
            main: main.to_string(),
            sub: sub.to_string(),
            quality,
        })
    }

    /// Match precedence against `main/sub`: 3 exact, 2 `type/*`, 1 `*/*`
    fn specificity(&self, main: &str, sub: &str) -> Option<u8> {
        match (self.main.as_str(), self.sub.as_str()) {
            ("*", "*") => Some(1),
            (m, "*") if m == main => Some(2),
            (m, s) if m == main && s == sub => Some(3),
            _ => None,
        }
    }
}

/// Quality the client assigns to `offer`, taken from the most specific
/// matching range
fn quality_of(ranges: &[MediaRange], offer: &str) -> f32 {
    let (main, sub) = offer.split_once('/').unwrap_or((offer, ""));

    ranges
        .iter()
        .filter_map(|range| range.specificity(main, sub).map(|s| (s, range.quality)))
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map(|(_, quality)| quality)
        .unwrap_or(0.0)
}

/// Pick the best of `offers` for the given `Accept` header
///
/// Offers are in server preference order: ties go to the earlier offer, a
/// missing header or one that accepts nothing yields the first offer.
pub fn negotiate_content_type<'a>(accept: Option<&str>, offers: &[&'a str]) -> &'a str {
    let default = offers.first().copied().unwrap_or("");

    let accept = match accept {
        Some(value) if !value.trim().is_empty() => value,
        _ => return default,
    };

    let ranges: Vec<MediaRange> = accept.split(',').filter_map(MediaRange::parse).collect();

    let mut best = default;
    let mut best_quality = 0.0f32;
    for offer in offers {
        let quality = quality_of(&ranges, offer);
        if quality > best_quality {
            best = offer;
            best_quality = quality;
        }
    }

    best
}
