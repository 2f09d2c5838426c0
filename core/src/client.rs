//! Per-request client-side script accumulator.

use crate::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Script {
    External(String),
    Inline(String),
}

/// Scripts collected while a request is routed.
///
/// Scripts are keyed; the first registration for a key wins and later ones are
/// ignored, so two modules asking for the same library emit one tag. Output
/// order is registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientScripts {
    scripts: Vec<(String, Script)>,
}

impl ClientScripts {
    /// An empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scripts: Vec::new(),
        }
    }

    fn push(&mut self, key: String, script: Script) -> bool {
        if self.contains(&key) {
            tracing::trace!(key = %key, "Client script already registered");
            return false;
        }
        self.scripts.push((key, script));
        true
    }

    /// Register an external script. Returns `false` if `key` was already taken.
    pub fn add_script(&mut self, key: impl Into<String>, url: impl Into<String>) -> bool {
        self.push(key.into(), Script::External(url.into()))
    }

    /// Register an inline script. Returns `false` if `key` was already taken.
    pub fn add_inline(&mut self, key: impl Into<String>, code: impl Into<String>) -> bool {
        self.push(key.into(), Script::Inline(code.into()))
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.scripts.iter().any(|(k, _)| k == key)
    }

    /// Number of registered scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Render `<script>` tags in registration order.
    ///
    /// Inline code is emitted verbatim apart from `</` sequences, which would
    /// otherwise close the tag early.
    #[must_use]
    pub fn render(&self) -> String {
        self.scripts
            .iter()
            .map(|(_, script)| match script {
                Script::External(url) => {
                    format!(r#"<script src="{}"></script>"#, escape_html(url))
                },
                Script::Inline(code) => format!("<script>{}</script>", code.replace("</", r"<\/")),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
