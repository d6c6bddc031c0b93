//! Math typesetting over the rendered fragment.
//!
//! Math regions live in the HTML itself as containers carrying their TeX
//! source in an attribute. `clear` rewinds every container to its pending
//! form and `typeset` derives KaTeX output for pending containers, so the
//! clear-then-typeset pair can run any number of times over the same
//! fragment without doubling output.

use std::{cell::RefCell, rc::Rc};

use katex::{OptsBuilder, OutputType};
use lol_html::{
    RewriteStrSettings, element,
    html_content::{ContentType, Element},
    rewrite_str,
};

use crate::application::render::types::RenderError;

pub(crate) const MATH_STATE_ATTR: &str = "data-math-state";
pub(crate) const MATH_SOURCE_ATTR: &str = "data-math-source";

const STATE_PENDING: &str = "pending";
const STATE_TYPESET: &str = "typeset";
const STATE_FAILED: &str = "failed";

const INLINE_SELECTOR: &str = "span[data-math-state]";
const BLOCK_SELECTOR: &str = "div[data-math-state]";

/// Structural representation of a math region before typesetting: the source
/// is preserved both as an attribute and as escaped visible text.
pub(crate) fn pending_container(literal: &str, display_mode: bool) -> String {
    let source = escape_attribute(literal);
    let visible = ammonia::clean_text(literal);
    if display_mode {
        format!(
            "<div data-role=\"math-block\" data-math-state=\"pending\" \
             data-math-source=\"{source}\">{visible}</div>"
        )
    } else {
        format!(
            "<span data-role=\"math-inline\" data-math-state=\"pending\" \
             data-math-source=\"{source}\">{visible}</span>"
        )
    }
}

pub(crate) fn contains_math_regions(html: &str) -> bool {
    html.contains(MATH_STATE_ATTR)
}

/// Rewind every math container to its pending form, discarding previously
/// derived output. Containers without a stored source are left untouched.
pub(crate) fn clear(html: &str) -> Result<String, RenderError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(INLINE_SELECTOR, clear_element),
                element!(BLOCK_SELECTOR, clear_element),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })
}

fn clear_element(el: &mut Element) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(raw_source) = el.get_attribute(MATH_SOURCE_ATTR) else {
        return Ok(());
    };
    let source = unescape_attribute(&raw_source);
    el.set_attribute(MATH_STATE_ATTR, STATE_PENDING)?;
    el.set_inner_content(&source, ContentType::Text);
    Ok(())
}

pub(crate) struct TypesetOutcome {
    pub(crate) html: String,
    pub(crate) warnings: Vec<String>,
}

/// Derive KaTeX output for every pending container. A formula KaTeX rejects
/// degrades to escaped literal code plus a warning; the pass never fails for
/// one bad formula.
pub(crate) fn typeset(html: &str) -> Result<TypesetOutcome, RenderError> {
    let warnings = Rc::new(RefCell::new(Vec::new()));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(INLINE_SELECTOR, {
                    let warnings = Rc::clone(&warnings);
                    move |el| typeset_element(el, false, &warnings)
                }),
                element!(BLOCK_SELECTOR, {
                    let warnings = Rc::clone(&warnings);
                    move |el| typeset_element(el, true, &warnings)
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })?;

    Ok(TypesetOutcome {
        html: rewritten,
        warnings: warnings.take(),
    })
}

fn typeset_element(
    el: &mut Element,
    display_mode: bool,
    warnings: &RefCell<Vec<String>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if el.get_attribute(MATH_STATE_ATTR).as_deref() != Some(STATE_PENDING) {
        return Ok(());
    }
    let Some(raw_source) = el.get_attribute(MATH_SOURCE_ATTR) else {
        return Ok(());
    };

    let source = unescape_attribute(&raw_source);
    match render_math_html(&source, display_mode) {
        Ok(markup) => {
            el.set_attribute(MATH_STATE_ATTR, STATE_TYPESET)?;
            el.set_inner_content(&markup, ContentType::Html);
        }
        Err(err) => {
            warnings
                .borrow_mut()
                .push(format!("math typesetting failed for `{source}`: {err}"));
            el.set_attribute(MATH_STATE_ATTR, STATE_FAILED)?;
            let fallback = format!("<code>{}</code>", ammonia::clean_text(&source));
            el.set_inner_content(&fallback, ContentType::Html);
        }
    }
    Ok(())
}

/// Render one KaTeX expression to HTML.
pub(crate) fn render_math_html(literal: &str, display_mode: bool) -> Result<String, RenderError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Html);

    let opts = builder.build().map_err(|err| RenderError::Math {
        message: format!("failed to build KaTeX options: {err}"),
    })?;

    katex::render_with_opts(literal, opts).map_err(|err| RenderError::Math {
        message: err.to_string(),
    })
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn unescape_attribute(value: &str) -> String {
    // `&amp;` last, so double-encoded sequences decode one level only.
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
