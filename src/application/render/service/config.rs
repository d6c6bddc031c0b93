use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

/// Comrak options for the structural stage. Dollar-math must stay enabled so
/// literal math delimiters reach the typesetting stage as math nodes instead
/// of being escaped away by the transform.
pub(crate) fn structural_options(hard_breaks: bool) -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.math_dollars = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.hardbreaks = hard_breaks;
    render.r#unsafe = true;
    render.gfm_quirks = true;

    options
}

/// Sanitiser applied to the structural output before the highlight and math
/// stages substitute their fragments. The math container grammar
/// (`data-math-*`) and the code placeholder markup must survive cleaning.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
        "dl",
        "dt",
        "dd",
        "del",
        "mark",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "aria-hidden",
        "aria-label",
        "role",
        "data-role",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("span", &["data-math-state", "data-math-source"]);
    builder.add_tag_attributes("div", &["data-math-state", "data-math-source"]);
    builder.add_tag_attributes("code", &["data-language", "class"]);
    builder.add_tag_attributes("pre", &["class", "data-language"]);
    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes("img", &["title", "width", "height", "alt", "loading"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled", "class"]);

    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_preserves_math_containers() {
        let sanitizer = build_sanitizer();
        let html = sanitizer
            .clean(
                "<span data-role=\"math-inline\" data-math-state=\"pending\" \
                 data-math-source=\"x^2\">x^2</span>",
            )
            .to_string();

        assert!(html.contains("data-math-state=\"pending\""));
        assert!(html.contains("data-math-source=\"x^2\""));
    }

    #[test]
    fn sanitizer_strips_scripts() {
        let sanitizer = build_sanitizer();
        let html = sanitizer
            .clean("<p>ok</p><script>alert(1)</script>")
            .to_string();

        assert!(html.contains("<p>ok</p>"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn hard_breaks_toggle_reaches_render_options() {
        assert!(structural_options(true).render.hardbreaks);
        assert!(!structural_options(false).render.hardbreaks);
    }
}
