fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A soft failure that does not abort the run but should be visible to operators.
#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub month: &'a str,
    pub item: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

pub fn render(event: &WarnEvent<'_>) -> String {
    format!(
        "BINGSYNC_WARN code={} stage={} action={} month={} item={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.month),
        sanitize_value(event.item),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: &WarnEvent<'_>) {
    tracing::warn!(code = event.code, "{}", render(event));
}
