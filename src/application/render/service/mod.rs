mod config;
mod highlight;
mod math;
mod rewrite;

use comrak::{Arena, format_html, parse_document};
use syntect::{html::ClassStyle, parsing::SyntaxSet};
use tracing::warn;

use crate::application::render::types::{RenderError, RenderResult, RenderService};
use crate::domain::{assets::StageAvailability, document::DocumentSnapshot};

use rewrite::{CodeFragment, rewrite_ast};

/// Pipeline construction parameters. Availability comes from the caller,
/// usually projected from a provisioning report; there is no process-wide
/// singleton behind this.
#[derive(Debug, Clone, Copy)]
pub struct RenderPipelineConfig {
    /// Treat single newlines as hard line breaks, matching the editor's
    /// live-preview behaviour.
    pub hard_breaks: bool,
    pub availability: StageAvailability,
}

impl Default for RenderPipelineConfig {
    fn default() -> Self {
        Self {
            hard_breaks: true,
            availability: StageAvailability::full(),
        }
    }
}

/// Comrak-based rendering pipeline with Syntect highlighting, KaTeX
/// typesetting and Ammonia sanitisation.
///
/// The three sub-stages run in fixed order for a snapshot: structural
/// transform, then code highlighting, then math typesetting. Highlighting
/// never runs before the structural output exists, and typesetting never
/// starts before highlighting has completed or been skipped, so code fences
/// are settled before any dollar sequence could be misread as math.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    sanitizer: ammonia::Builder<'static>,
    availability: StageAvailability,
}

impl ComrakRenderService {
    pub fn new(pipeline_config: RenderPipelineConfig) -> Self {
        Self {
            options: config::structural_options(pipeline_config.hard_breaks),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
            sanitizer: config::build_sanitizer(),
            availability: pipeline_config.availability,
        }
    }

    /// Re-run the math stage over an already-rendered fragment: previously
    /// typeset output is cleared before typesetting, so repeating this over
    /// the same fragment yields identical output.
    pub fn retypeset_fragment(&self, html: &str) -> Result<(String, Vec<String>), RenderError> {
        let cleared = math::clear(html)?;
        let outcome = math::typeset(&cleared)?;
        Ok((outcome.html, outcome.warnings))
    }

    fn structural_stage(&self, text: &str, warnings: &mut Vec<String>) -> StructuralOutput {
        match self.transform(text) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    target = "application::render::service",
                    error = %err,
                    "Structural transform failed; rendering literal fallback"
                );
                warnings.push(format!("structural transform failed: {err}"));
                StructuralOutput {
                    html: format!("<pre><code>{}</code></pre>\n", ammonia::clean_text(text)),
                    code_fragments: Vec::new(),
                }
            }
        }
    }

    fn transform(&self, text: &str) -> Result<StructuralOutput, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, text, &self.options);
        let outcome = rewrite_ast(root);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        let html = self.sanitizer.clean(&html).to_string();
        Ok(StructuralOutput {
            html,
            code_fragments: outcome.code_fragments,
        })
    }

    fn highlight_stage(
        &self,
        structural: StructuralOutput,
        warnings: &mut Vec<String>,
    ) -> (String, bool) {
        let StructuralOutput {
            mut html,
            code_fragments,
        } = structural;

        let applied = self.availability.highlighting;
        if !applied && !code_fragments.is_empty() {
            warnings.push("code highlighting skipped: highlighting assets unavailable".to_string());
        }

        // Every placeholder is substituted exactly once, whether or not the
        // stage applies, so none can leak into delivered output.
        for fragment in &code_fragments {
            let replacement = if applied {
                match highlight::highlight_code(
                    fragment.language.as_deref(),
                    &fragment.literal,
                    &self.syntax_set,
                    &self.class_style,
                ) {
                    Ok(markup) => markup,
                    Err(err) => {
                        warnings.push(format!(
                            "highlighting failed for `{}`: {err}",
                            fragment.language.as_deref().unwrap_or("text")
                        ));
                        highlight::plain_code_block(fragment.language.as_deref(), &fragment.literal)
                    }
                }
            } else {
                highlight::plain_code_block(fragment.language.as_deref(), &fragment.literal)
            };

            html = html.replace(&format!("<div>{}</div>", fragment.placeholder), &replacement);
        }

        (html, applied)
    }

    fn math_stage(&self, html: String, warnings: &mut Vec<String>) -> (String, bool) {
        if !self.availability.math {
            if math::contains_math_regions(&html) {
                warnings.push("math typesetting skipped: math assets unavailable".to_string());
            }
            return (html, false);
        }

        let cleared = match math::clear(&html) {
            Ok(cleared) => cleared,
            Err(err) => {
                warn!(
                    target = "application::render::service",
                    error = %err,
                    "Math clearing failed; leaving fragment untypeset"
                );
                warnings.push(format!("math typesetting failed: {err}"));
                return (html, false);
            }
        };

        match math::typeset(&cleared) {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                (outcome.html, true)
            }
            Err(err) => {
                warn!(
                    target = "application::render::service",
                    error = %err,
                    "Math typesetting failed; leaving fragment untypeset"
                );
                warnings.push(format!("math typesetting failed: {err}"));
                (cleared, false)
            }
        }
    }
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new(RenderPipelineConfig::default())
    }
}

impl RenderService for ComrakRenderService {
    fn render(&self, snapshot: &DocumentSnapshot) -> RenderResult {
        let mut warnings = Vec::new();

        let structural = self.structural_stage(&snapshot.text, &mut warnings);
        let (html, highlight_applied) = self.highlight_stage(structural, &mut warnings);
        let (html, math_applied) = self.math_stage(html, &mut warnings);

        RenderResult {
            revision: snapshot.revision,
            html_fragment: html,
            highlight_applied,
            math_applied,
            warnings,
        }
    }
}

struct StructuralOutput {
    html: String,
    code_fragments: Vec<CodeFragment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::Revision;

    fn snapshot(text: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(text, Revision::new(1))
    }

    #[test]
    fn full_pipeline_renders_all_stages() {
        let service = ComrakRenderService::default();
        let result = service.render(&snapshot(
            "# Title\n\nInline $x^2$ and:\n\n```rust\nfn main() {}\n```",
        ));

        assert!(result.highlight_applied);
        assert!(result.math_applied);
        assert!(result.warnings.is_empty());
        assert!(result.html_fragment.contains("<h1>"));
        assert!(result.html_fragment.contains("syntax-lang-rust"));
        assert!(result.html_fragment.contains("data-math-state=\"typeset\""));
        assert!(!result.html_fragment.contains("__CODE_FENCE_PLACEHOLDER"));
    }

    #[test]
    fn degraded_availability_skips_stages_with_warnings() {
        let service = ComrakRenderService::new(RenderPipelineConfig {
            hard_breaks: true,
            availability: StageAvailability::none(),
        });
        let result = service.render(&snapshot("$x^2$\n\n```rust\nfn main() {}\n```"));

        assert!(!result.highlight_applied);
        assert!(!result.math_applied);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.html_fragment.contains("data-math-state=\"pending\""));
        assert!(result.html_fragment.contains("<pre class=\"syntax-highlight\""));
        assert!(!result.html_fragment.contains("__CODE_FENCE_PLACEHOLDER"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let service = ComrakRenderService::default();
        let input = snapshot("# Hi\n\n$$\\int_0^\\infty x^2 dx$$");

        let first = service.render(&input);
        let second = service.render(&input);
        assert_eq!(first, second);
    }

    #[test]
    fn retypeset_of_rendered_fragment_is_stable() {
        let service = ComrakRenderService::default();
        let result = service.render(&snapshot("One formula: $$x^3$$"));

        let (again, warnings) = service
            .retypeset_fragment(&result.html_fragment)
            .expect("retypeset");
        assert!(warnings.is_empty());
        assert_eq!(again, result.html_fragment);
    }

    #[test]
    fn hard_breaks_follow_configuration() {
        let soft = ComrakRenderService::new(RenderPipelineConfig {
            hard_breaks: false,
            availability: StageAvailability::full(),
        });
        let hard = ComrakRenderService::new(RenderPipelineConfig {
            hard_breaks: true,
            availability: StageAvailability::full(),
        });

        let text = snapshot("first\nsecond");
        assert!(!soft.render(&text).html_fragment.contains("<br"));
        assert!(hard.render(&text).html_fragment.contains("<br"));
    }
}
