//! Client hint overrides (`DPR`, `Width`, `Save-Data`)

use http::header::VARY;
use http::{HeaderMap, HeaderValue};

use crate::constants::CONTENT_DPR;
use crate::image_optimizer::params::{parse_float, parse_int};
use crate::image_optimizer::Options;

/// Apply client hint request headers to `options`
///
/// Every hint that was honored is added to `response` as a `Vary` entry;
/// `DPR` is echoed back as `Content-DPR`.
pub fn apply_client_hints(
    request: &HeaderMap,
    options: &mut Options,
    response: &mut HeaderMap,
    save_data_quality: u8,
) {
    if let Some(dpr) = header_str(request, "dpr") {
        options.dpr = parse_float(dpr);
        if let Ok(value) = HeaderValue::from_str(&format!("{:.1}", options.dpr)) {
            response.insert(CONTENT_DPR, value);
        }
        response.append(VARY, HeaderValue::from_static("DPR"));
    }

    if let Some(width) = header_str(request, "width") {
        options.width = parse_int(width);
        response.append(VARY, HeaderValue::from_static("Width"));
    }

    if header_str(request, "save-data") == Some("on") {
        options.quality = save_data_quality;
        response.append(VARY, HeaderValue::from_static("Save-Data"));
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
