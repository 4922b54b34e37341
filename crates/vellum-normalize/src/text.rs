//! Visible-text canonicalization helpers

/// Accumulates visible text runs into a whitespace-collapsed string
///
/// Non-breaking spaces count as whitespace, line-ending style is irrelevant,
/// and every run of whitespace (including an element boundary) becomes a
/// single space. Leading and trailing whitespace never appears in the output.
#[derive(Debug, Default)]
pub(crate) struct TextCollector {
    out: String,
    pending_space: bool,
}

impl TextCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a raw text run
    pub(crate) fn push(&mut self, run: &str) {
        for ch in run.chars() {
            if is_separator(ch) {
                self.pending_space = true;
            } else {
                if self.pending_space && !self.out.is_empty() {
                    self.out.push(' ');
                }
                self.pending_space = false;
                self.out.push(ch);
            }
        }
    }

    /// Record an element boundary
    pub(crate) fn boundary(&mut self) {
        self.pending_space = true;
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == '\u{a0}' || ch == '\u{200b}' || ch == '\u{feff}'
}

/// Collapse all whitespace in `value` to single spaces and trim
pub(crate) fn collapse(value: &str) -> String {
    let mut collector = TextCollector::new();
    collector.push(value);
    collector.finish()
}

/// Decode a character reference such as `&amp;` or `&#x41;`
///
/// Unknown named references are returned verbatim.
pub(crate) fn decode_entity(raw: &str) -> String {
    let body = raw
        .strip_prefix('&')
        .unwrap_or(raw)
        .trim_end_matches(';');

    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map_or_else(|| raw.to_string(), String::from);
    }

    let decoded = match body {
        "nbsp" | "ensp" | "emsp" | "thinsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "copy" => "\u{a9}",
        _ => return raw.to_string(),
    };
    decoded.to_string()
}

/// Decode every character reference embedded in a text run
pub(crate) fn decode_entities_in(run: &str) -> String {
    let mut out = String::with_capacity(run.len());
    let mut rest = run;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) if end <= 32 && !tail[1..end].contains(['&', ' ', '<']) => {
                out.push_str(&decode_entity(&tail[..=end]));
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
