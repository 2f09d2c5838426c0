//! Filesystem theme loading and the placeholder layout renderer.
//!
//! A loadable theme directory looks like:
//!
//! ```text
//! <theme>/
//!   theme.json             optional; its "config" object becomes LoadedTheme::config
//!   templates/layout.html  required
//!   public/                served under /static
//!   stylesheets/           served under /styles
//! ```

use serde_json::Value;
use std::sync::Arc;
use trellis_core::menu::MenuName;
use trellis_core::{
    BoxFuture, LoadedTheme, RequestContext, Renderer, ThemeDescriptor, ThemeError, ThemeLoader,
    escape_html,
};

/// Layout template path, relative to the theme directory.
pub const LAYOUT_TEMPLATE: &str = "templates/layout.html";

/// Loads themes from their directory on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsThemeLoader;

impl FsThemeLoader {
    async fn load_theme(descriptor: &ThemeDescriptor) -> Result<LoadedTheme, ThemeError> {
        let fail = |reason: String| ThemeError::Load {
            theme: descriptor.name.clone(),
            reason,
        };

        let metadata = tokio::fs::metadata(&descriptor.path)
            .await
            .map_err(|e| fail(format!("{}: {e}", descriptor.path.display())))?;
        if !metadata.is_dir() {
            return Err(fail(format!("{} is not a directory", descriptor.path.display())));
        }

        let layout = tokio::fs::read_to_string(descriptor.path.join(LAYOUT_TEMPLATE))
            .await
            .map_err(|e| fail(format!("{LAYOUT_TEMPLATE}: {e}")))?;

        let config = descriptor.about.get("config").cloned().unwrap_or(Value::Null);
        tracing::debug!(theme = %descriptor.name, "Theme loaded from disk");

        Ok(LoadedTheme::new(
            descriptor.clone(),
            config,
            Arc::new(LayoutRenderer::new(layout)),
        ))
    }
}

impl ThemeLoader for FsThemeLoader {
    fn load<'a>(
        &'a self,
        descriptor: &'a ThemeDescriptor,
    ) -> BoxFuture<'a, Result<LoadedTheme, ThemeError>> {
        Box::pin(Self::load_theme(descriptor))
    }
}

/// Fills a layout's placeholders from the request context.
///
/// | placeholder         | replaced with                                   |
/// |---------------------|-------------------------------------------------|
/// | `{{title}}`         | page title, escaped                             |
/// | `{{content}}`       | blocks of the `body` region                     |
/// | `{{region:<name>}}` | blocks of another region                        |
/// | `{{scripts}}`       | client script tags                              |
/// | `{{menu:<name>}}`   | a named menu as nested lists                    |
/// | `{{helper:<name>}}` | a helper value, escaped; non-strings as JSON    |
///
/// Anything else between braces is left untouched.
#[derive(Debug, Clone)]
pub struct LayoutRenderer {
    layout: String,
}

impl LayoutRenderer {
    /// Wrap a layout template.
    #[must_use]
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
        }
    }

    fn resolve(token: &str, request: &RequestContext) -> Option<String> {
        if let Some(name) = token.strip_prefix("menu:") {
            return Some(
                MenuName::parse(name)
                    .map(|menu| request.menus.get(menu).render_html())
                    .unwrap_or_default(),
            );
        }
        if let Some(name) = token.strip_prefix("helper:") {
            return Some(match request.helpers.get(name) {
                Some(Value::String(s)) => escape_html(s),
                Some(Value::Null) | None => String::new(),
                Some(other) => escape_html(&other.to_string()),
            });
        }
        if let Some(region) = token.strip_prefix("region:") {
            return Some(request.region(region));
        }
        match token {
            "title" => Some(escape_html(request.title.as_deref().unwrap_or_default())),
            "content" => Some(request.region("body")),
            "scripts" => Some(request.client.render()),
            _ => None,
        }
    }
}

impl Renderer for LayoutRenderer {
    fn render(&self, _theme: &LoadedTheme, request: &RequestContext) -> Result<String, ThemeError> {
        let mut out = String::with_capacity(self.layout.len());
        let mut rest = self.layout.as_str();

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                out.push_str(&rest[open..]);
                return Ok(out);
            };
            let token = after[..close].trim();
            match Self::resolve(token, request) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};
    use serde_json::json;
    use std::path::PathBuf;
    use trellis_core::{About, ThemeLayout};

    fn descriptor(path: PathBuf) -> ThemeDescriptor {
        ThemeDescriptor {
            name: "classic".into(),
            path,
            folder: "core".into(),
            about: About::default(),
            layout: ThemeLayout::Current,
        }
    }

    fn request() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new())
    }

    fn render(layout: &str, request: &RequestContext) -> String {
        let theme = LoadedTheme::new(
            descriptor(PathBuf::from("/t")),
            Value::Null,
            Arc::new(LayoutRenderer::new(layout)),
        );
        theme.render(request).unwrap()
    }

    #[test]
    fn fills_known_placeholders() {
        let mut ctx = request();
        ctx.title = Some("Tom & Jerry".into());
        ctx.add_block("body", "<p>hi</p>");
        ctx.add_block("aside", "<p>side</p>");
        ctx.client.add_script("app", "/static/app.js");
        ctx.menus.get_mut(MenuName::Primary).add("home", "Home", Some("/".into()), 0);
        ctx.helpers.insert("generation".into(), json!(3));
        ctx.helpers.insert("theme".into(), json!("classic"));

        let html = render(
            "<title>{{title}}</title>{{ menu:primary }}<main>{{content}}</main>\
             <aside>{{region:aside}}</aside>{{helper:theme}}/{{helper:generation}}{{scripts}}",
            &ctx,
        );

        assert_eq!(
            html,
            "<title>Tom &amp; Jerry</title>\
             <ul class=\"menu menu-primary\"><li><a href=\"/\">Home</a></li></ul>\
             <main><p>hi</p></main><aside><p>side</p></aside>classic/3\
             <script src=\"/static/app.js\"></script>"
        );
    }

    #[test]
    fn unknown_and_unterminated_placeholders_are_left_alone() {
        let ctx = request();
        assert_eq!(render("a {{nope}} b", &ctx), "a {{nope}} b");
        assert_eq!(render("a {{title", &ctx), "a {{title");
        assert_eq!(render("{{menu:footer}}|{{helper:missing}}", &ctx), "|");
    }

    #[tokio::test]
    async fn loads_layout_and_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join(LAYOUT_TEMPLATE), "<h1>{{title}}</h1>").unwrap();

        let mut desc = descriptor(dir.path().to_path_buf());
        desc.about.extra.insert("config".into(), json!({ "columns": 2 }));

        let theme = FsThemeLoader.load(&desc).await.unwrap();
        assert_eq!(theme.config, json!({ "columns": 2 }));

        let mut ctx = request();
        ctx.title = Some("Hello".into());
        assert_eq!(theme.render(&ctx).unwrap(), "<h1>Hello</h1>");
    }

    #[tokio::test]
    async fn missing_layout_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsThemeLoader
            .load(&descriptor(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(err, ThemeError::Load { ref theme, .. } if theme == "classic"));
    }

    #[tokio::test]
    async fn missing_directory_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsThemeLoader
            .load(&descriptor(dir.path().join("absent")))
            .await
            .unwrap_err();
        assert!(matches!(err, ThemeError::Load { .. }));
    }
}
