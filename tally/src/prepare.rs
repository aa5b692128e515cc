use std::sync::LazyLock;

use regex::{Captures, Regex};

const CURRENCIES: &[(&str, &str)] = &[("€", "EUR"), ("$", "USD"), ("£", "GBP"), ("¥", "JPY")];

static SCIENTIFIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)E([+-]?\d+)").expect("valid regex"));
static CARET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^([+-]?\d+)").expect("valid regex"));

/// Normalize raw line text before reference resolution: drop everything from
/// the first `//` and spell currency glyphs as ISO codes.
pub fn prepare_input(input: &str) -> String {
    let text = match input.find("//") {
        Some(pos) => &input[..pos],
        None => input,
    };
    CURRENCIES
        .iter()
        .fold(text.to_string(), |acc, (glyph, code)| acc.replace(glyph, code))
}

/// Format a successful oracle answer for display.
pub fn post_format(output: &str) -> String {
    let text = CURRENCIES
        .iter()
        .fold(output.to_string(), |acc, (glyph, code)| acc.replace(code, glyph))
        .replace(" °", "°");
    pretty_print(&text)
}

fn pretty_print(text: &str) -> String {
    let text = SCIENTIFIC.replace_all(text, |caps: &Captures| {
        format!("{} × 10{}", &caps[1], superscript(&caps[2]))
    });
    CARET
        .replace_all(&text, |caps: &Captures| superscript(&caps[1]))
        .into_owned()
}

/// Render a signed integer exponent with Unicode superscripts. A leading `+`
/// is dropped.
fn superscript(exponent: &str) -> String {
    let mut out = String::new();
    let digits = if let Some(rest) = exponent.strip_prefix('-') {
        out.push('⁻');
        rest
    } else {
        exponent.strip_prefix('+').unwrap_or(exponent)
    };
    out.extend(digits.chars().filter_map(|c| match c {
        '0' => Some('⁰'),
        '1' => Some('¹'),
        '2' => Some('²'),
        '3' => Some('³'),
        '4' => Some('⁴'),
        '5' => Some('⁵'),
        '6' => Some('⁶'),
        '7' => Some('⁷'),
        '8' => Some('⁸'),
        '9' => Some('⁹'),
        _ => None,
    }));
    out
}
