use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};

use super::math;

/// One fenced code region lifted out of the structural output. The literal
/// stays here so the highlight stage can re-render it after sanitisation.
#[derive(Debug, Clone)]
pub(crate) struct CodeFragment {
    pub(crate) placeholder: String,
    pub(crate) language: Option<String>,
    pub(crate) literal: String,
}

#[derive(Default)]
pub(crate) struct RewriteOutcome {
    pub(crate) code_fragments: Vec<CodeFragment>,
    code_counter: usize,
}

/// Walk the parsed document, replacing fenced code blocks with placeholders
/// and math nodes with pending containers. Everything else is left for the
/// structural formatter.
pub(crate) fn rewrite_ast<'a>(root: &'a AstNode<'a>) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();
    visit_nodes(root, &mut outcome);
    outcome
}

fn visit_nodes<'a>(node: &'a AstNode<'a>, outcome: &mut RewriteOutcome) {
    rewrite_math_node(node);
    rewrite_code_block(node, outcome);

    let mut child = node.first_child();
    while let Some(next) = child {
        visit_nodes(next, outcome);
        child = next.next_sibling();
    }
}

fn rewrite_math_node<'a>(node: &'a AstNode<'a>) {
    let math_data = {
        let data = node.data.borrow();
        if let NodeValue::Math(math_node) = &data.value {
            Some((math_node.literal.clone(), math_node.display_math))
        } else {
            None
        }
    };

    let Some((literal, display_mode)) = math_data else {
        return;
    };

    let container = math::pending_container(&literal, display_mode);
    let mut data = node.data.borrow_mut();
    if display_mode {
        data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: container,
        });
    } else {
        data.value = NodeValue::HtmlInline(container);
    }
}

fn rewrite_code_block<'a>(node: &'a AstNode<'a>, outcome: &mut RewriteOutcome) {
    let block_data = {
        let data = node.data.borrow();
        if let NodeValue::CodeBlock(block) = &data.value {
            // Indented code blocks keep comrak's default rendering; only
            // fenced regions participate in the highlight stage.
            block
                .fenced
                .then(|| (block.info.trim().to_string(), block.literal.clone()))
        } else {
            None
        }
    };

    let Some((info, literal)) = block_data else {
        return;
    };

    let language = info
        .split_whitespace()
        .next()
        .map(|token| token.to_string());

    let placeholder = format!("__CODE_FENCE_PLACEHOLDER_{}__", outcome.code_counter);
    outcome.code_counter += 1;
    outcome.code_fragments.push(CodeFragment {
        placeholder: placeholder.clone(),
        language,
        literal,
    });

    let mut data = node.data.borrow_mut();
    data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
        block_type: 0,
        literal: format!("<div>{placeholder}</div>"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use comrak::{Arena, format_html, parse_document};

    use crate::application::render::service::config::structural_options;

    fn render(markdown: &str) -> (String, RewriteOutcome) {
        let options = structural_options(false);
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &options);
        let outcome = rewrite_ast(root);

        let mut html = String::new();
        format_html(root, &options, &mut html).expect("format html");
        (html, outcome)
    }

    #[test]
    fn inline_math_becomes_pending_container() {
        let (html, outcome) = render("Euler: $e^{i\\pi}$");

        assert!(outcome.code_fragments.is_empty());
        assert!(html.contains("data-math-state=\"pending\""));
        assert!(html.contains("data-math-source=\"e^{i\\pi}\""));
    }

    #[test]
    fn fenced_code_becomes_placeholder_fragment() {
        let (html, outcome) = render("```python\nprint(\"hi\")\n```");

        assert_eq!(outcome.code_fragments.len(), 1);
        let fragment = &outcome.code_fragments[0];
        assert_eq!(fragment.language.as_deref(), Some("python"));
        assert_eq!(fragment.literal, "print(\"hi\")\n");
        assert!(html.contains(&format!("<div>{}</div>", fragment.placeholder)));
        assert!(!html.contains("print("));
    }

    #[test]
    fn dollars_inside_code_fence_are_not_math() {
        let (html, outcome) = render("```\n$$not math$$\n```");

        assert_eq!(outcome.code_fragments.len(), 1);
        assert!(!html.contains("data-math-state"));
    }

    #[test]
    fn indented_code_is_left_to_the_formatter() {
        let (html, outcome) = render("    indented code\n");

        assert!(outcome.code_fragments.is_empty());
        assert!(html.contains("indented code"));
    }
}
