use ammonia;

/// Sanitize user-authored text (quiz titles, class names, question text)
/// before it is persisted.
///
/// Whitelist-based: safe inline tags survive, <script>/<iframe> and event
/// handler attributes are stripped. This is a fail-safe against Stored XSS
/// when quiz content is rendered by other clients.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input)
}
