//! HTML templates, embedded at compile time.

use std::sync::LazyLock;

use minijinja::Environment;
use serde::Serialize;

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    for (name, source) in [
        ("base.html", include_str!("../templates/base.html")),
        ("index.html", include_str!("../templates/index.html")),
        ("401.html", include_str!("../templates/401.html")),
        ("403.html", include_str!("../templates/403.html")),
        ("404.html", include_str!("../templates/404.html")),
        ("408.html", include_str!("../templates/408.html")),
        ("418.html", include_str!("../templates/418.html")),
        ("error_http.html", include_str!("../templates/error_http.html")),
        ("error_internal.html", include_str!("../templates/error_internal.html")),
    ] {
        env.add_template(name, source)
            .unwrap_or_else(|e| panic!("template `{name}` does not parse: {e}"));
    }
    env
});

/// Renders the embedded template `name` with `ctx`.
pub fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, minijinja::Error> {
    TEMPLATES.get_template(name)?.render(ctx)
}

/// Whether an embedded template called `name` exists.
pub fn exists(name: &str) -> bool {
    TEMPLATES.get_template(name).is_ok()
}

#[cfg(test)]
mod tests {
    use minijinja::context;

    use super::*;

    #[test]
    fn error_page_shows_code_and_type() {
        let html = render(
            "error_http.html",
            context! { code => 405, error_type => "MethodNotAllowed", description => "nope" },
        )
        .unwrap();
        assert!(html.contains("<h1>405 MethodNotAllowed</h1>"));
        assert!(html.contains("nope"));
    }

    #[test]
    fn descriptions_are_escaped() {
        let html = render(
            "error_internal.html",
            context! { code => 500, error_type => "Boom", description => "<script>" },
        )
        .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn dedicated_pages_exist() {
        for code in ["401", "403", "404", "408", "418"] {
            assert!(exists(&format!("{code}.html")), "{code}");
        }
        assert!(!exists("500.html"));
    }
}
