/// Pulls the SQL out of a model reply.
///
/// Replies often wrap the query in a ```sql fence, sometimes behind a line of
/// prose. The content of the first fenced block wins; unfenced replies are
/// used as they are. A single trailing `;` is dropped because the validator
/// refuses statement separators outright.
pub fn extract_sql(reply: &str) -> String {
    let trimmed = reply.trim();
    let body = match trimmed.find("```") {
        Some(start) => {
            let after_fence = &trimmed[start + 3..];
            // Skip the info string (`sql`, `sqlite`, ...) on the opening line.
            let content = match after_fence.find('\n') {
                Some(newline) => &after_fence[newline + 1..],
                None => "",
            };
            match content.find("```") {
                Some(end) => &content[..end],
                None => content,
            }
        }
        None => trimmed,
    };

    let body = body.trim();
    body.strip_suffix(';').unwrap_or(body).trim_end().to_string()
}
