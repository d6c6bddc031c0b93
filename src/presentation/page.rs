//! Standalone HTML page assembly around a rendered fragment.

use crate::application::render::RenderResult;
use crate::domain::assets::AssetManifest;

/// Built-in document shown when the host shell has no content yet.
pub const WELCOME_DOCUMENT: &str = r#"# Welcome!

## Markdown Example
- **Bold Text**
- *Italic Text*
- [Link Example](https://example.com)

## LaTeX Example
Inline formula $E = mc^2$

Block formula:

$$\int_0^\infty x^2 dx$$

Matrix:

$$
\begin{bmatrix}
a & b \\
c & d
\end{bmatrix}
$$

## Code Example
```python
def hello_world():
    print("Hello, World!")
```

## Gauss's Law

$$
\nabla \cdot \mathbf{E} = \frac{\rho}{\varepsilon_0}
$$
"#;

/// Wrap a rendered fragment in a complete HTML document, linking every
/// stylesheet descriptor in the manifest at its local category path.
pub fn standalone_page(
    title: &str,
    result: &RenderResult,
    manifest: &AssetManifest,
    asset_root_href: &str,
) -> String {
    let mut links = String::new();
    for descriptor in manifest.descriptors() {
        let path = descriptor.local_path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("css") {
            continue;
        }
        let href = format!(
            "{}/{}",
            asset_root_href.trim_end_matches('/'),
            path.to_string_lossy().replace('\\', "/")
        );
        links.push_str(&format!("    <link rel=\"stylesheet\" href=\"{href}\">\n"));
    }

    let escaped_title = ammonia::clean_text(title);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{escaped_title}</title>\n\
         {links}\
         <style>\n\
         body {{ font-family: Arial, sans-serif; margin: 20px; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ddd; padding: 8px; }}\n\
         th {{ background-color: #f2f2f2; }}\n\
         pre {{ background-color: #f5f5f5; padding: 15px; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         {fragment}\n\
         </body>\n\
         </html>\n",
        fragment = result.html_fragment
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{assets::default_manifest, document::Revision};

    fn result(html: &str) -> RenderResult {
        RenderResult {
            revision: Revision::new(1),
            html_fragment: html.to_string(),
            highlight_applied: true,
            math_applied: true,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn page_links_only_stylesheet_assets() {
        let page = standalone_page(
            "notes.md",
            &result("<p>hi</p>"),
            &default_manifest(),
            "assets",
        );

        assert!(page.contains("assets/css/highlight.default.min.css"));
        assert!(page.contains("assets/katex/katex.min.css"));
        assert!(!page.contains("KaTeX_Main-Regular.woff2"));
        assert!(page.contains("<p>hi</p>"));
    }

    #[test]
    fn page_escapes_the_title() {
        let page = standalone_page(
            "<script>x</script>",
            &result("<p>hi</p>"),
            &default_manifest(),
            "assets",
        );

        assert!(!page.contains("<script>x</script>"));
    }

    #[test]
    fn welcome_document_exercises_every_stage() {
        assert!(WELCOME_DOCUMENT.contains("$$"));
        assert!(WELCOME_DOCUMENT.contains("```python"));
        assert!(WELCOME_DOCUMENT.contains("# Welcome!"));
    }
}
