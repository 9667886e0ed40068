//! Rendering of the application's `config.env`.

use crate::core::credential::SessionId;

/// Exact file contents: two lines, no trailing newline.
pub fn render_config_env(session: &SessionId) -> String {
    format!("VPS=true\nSESSION_ID={}", session.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_two_lines() {
        let session = SessionId::new("abc=123").expect("credential");
        let rendered = render_config_env(&session);
        assert_eq!(rendered, "VPS=true\nSESSION_ID=abc=123");
        assert_eq!(rendered.lines().count(), 2);
    }
}
