//! CHTL generator tests

#[cfg(test)]
mod generator_tests {
    use chtl_compiler::ast::{Node, NodeKind};
    use chtl_compiler::chtl::{Parser, ParserConfig};
    use chtl_compiler::generator::{GeneratedUnit, GeneratorConfig, HtmlGenerator};
    use chtl_compiler::namespace::{NamespaceRegistry, GLOBAL};
    use chtl_compiler::parse_util::DiagnosticCode;
    use chtl_compiler::selector_automation::SelectorAutomation;

    fn generate(source: &str) -> GeneratedUnit {
        let (mut document, diagnostics) =
            Parser::new(source, ParserConfig::default()).parse();
        assert!(diagnostics.is_empty(), "parse problems: {:?}", diagnostics);
        let mut registry = NamespaceRegistry::new();
        let ns_diagnostics = registry.collect_document(&document, "test.chtl", GLOBAL);
        assert!(ns_diagnostics.is_empty(), "namespace problems: {:?}", ns_diagnostics);
        SelectorAutomation::default().process(&mut document);
        HtmlGenerator::new(&registry, GeneratorConfig::default()).generate(&document)
    }

    mod elements {
        use super::*;

        #[test]
        fn simple_element_with_attribute_and_text() {
            let unit = generate("div { id: box; \"hello\" }");
            assert_eq!(unit.html, "<div id=\"box\">hello</div>");
            assert!(unit.css.is_empty());
            assert!(unit.scripts.is_empty());
        }

        #[test]
        fn attributes_emit_in_insertion_order() {
            let unit = generate("div { b: 1; a: 2; }");
            assert_eq!(unit.html, "<div b=\"1\" a=\"2\"></div>");
        }

        #[test]
        fn nested_elements_emit_inline() {
            let unit = generate("div { span { \"x\" } }");
            assert_eq!(unit.html, "<div><span>x</span></div>");
        }

        #[test]
        fn void_elements_self_close() {
            let unit = generate("div { br { } }");
            assert_eq!(unit.html, "<div><br /></div>");
        }

        #[test]
        fn text_is_html_escaped() {
            let unit = generate("div { \"a < b & c\" }");
            assert_eq!(unit.html, "<div>a &lt; b &amp; c</div>");
        }

        #[test]
        fn attribute_values_are_escaped() {
            let unit = generate("div { title: \"say \\\"hi\\\"\"; }");
            assert_eq!(unit.html, "<div title=\"say &quot;hi&quot;\"></div>");
        }
    }

    mod styles {
        use super::*;

        #[test]
        fn class_automation_and_css_collection() {
            let unit = generate("div { style { .card { color: red; } } \"hi\" }");
            assert_eq!(unit.html, "<div class=\"card\">hi</div>");
            assert_eq!(unit.css, ".card { color: red; }");
        }

        #[test]
        fn direct_declarations_become_inline_style() {
            let unit = generate("div { style { color: red; margin: 0; } }");
            assert_eq!(unit.html, "<div style=\"color: red; margin: 0\"></div>");
        }

        #[test]
        fn ampersand_resolves_to_injected_class() {
            let unit = generate("div { style { .card { color: red; } &:hover { color: blue; } } }");
            assert!(unit.css.contains(".card:hover { color: blue; }"));
        }

        #[test]
        fn global_style_rules_pass_to_css() {
            let unit = generate("style { .page { margin: 0; } }\ndiv { }");
            // Top-level style blocks parsed by the CHTL parser feed the
            // CSS stream directly.
            assert!(unit.css.contains(".page { margin: 0; }"));
        }
    }

    mod templates {
        use super::*;

        #[test]
        fn element_template_expands_with_substitution() {
            let unit = generate(
                "[Template] @Element Card { div { \"$ {label}\" } }\nbody { @Element Card(label=\"x\"); }",
            );
            assert!(unit.html.contains("<body><div>x</div></body>"), "html: {}", unit.html);
        }

        #[test]
        fn unknown_template_is_diagnosed() {
            let unit = generate("body { @Element Ghost; }");
            assert!(unit
                .diagnostics
                .iter()
                .any(|d| d.code == DiagnosticCode::UndefinedTemplate));
        }

        #[test]
        fn var_group_substitutes_values() {
            let unit = generate(
                "[Template] @Var Palette { primary = #336699; }\ndiv { style { color: Palette(primary); } }",
            );
            assert!(unit.html.contains("color: #336699"));
        }

        #[test]
        fn unknown_var_key_is_diagnosed() {
            let unit = generate(
                "[Template] @Var Palette { primary = red; }\ndiv { style { color: Palette(missing); } }",
            );
            assert!(unit
                .diagnostics
                .iter()
                .any(|d| d.code == DiagnosticCode::UndefinedVariable));
        }

        #[test]
        fn custom_style_specialisation_merges_overrides() {
            let unit = generate(
                "[Custom] @Style Base { color: blue; margin: 4px; }\n\
                 div { style { @Style Base { color: red; delete margin; } } }",
            );
            assert_eq!(unit.html, "<div style=\"color: red\"></div>");
        }

        #[test]
        fn style_inheritance_chains_merge() {
            let unit = generate(
                "[Custom] @Style A { color: blue; padding: 1px; }\n\
                 [Custom] @Style B { inherit A; color: green; }\n\
                 div { style { @Style B; } }",
            );
            assert!(unit.html.contains("padding: 1px"));
            assert!(unit.html.contains("color: green"));
        }

        #[test]
        fn delete_inherit_severs_the_chain() {
            let unit = generate(
                "[Custom] @Style A { color: blue; }\n\
                 [Custom] @Style B { inherit A; delete inherit; margin: 0; }\n\
                 div { style { @Style B; } }",
            );
            assert!(!unit.html.contains("color"));
            assert!(unit.html.contains("margin: 0"));
        }
    }

    mod origins_and_comments {
        use super::*;

        #[test]
        fn anonymous_origin_emits_in_place() {
            let unit = generate("div { [Origin] @Html { <b>raw</b> } }");
            assert!(unit.html.contains("<b>raw</b>"));
        }

        #[test]
        fn named_origin_emits_at_reference_site() {
            let unit = generate(
                "[Origin] @Html banner { <header>B</header> }\ndiv { [Origin] @Html banner; }",
            );
            assert!(unit.html.contains("<header>B</header>"));
            // The declaration itself emits nothing at its own site.
            assert_eq!(unit.html.matches("<header>B</header>").count(), 1);
        }

        #[test]
        fn style_origin_feeds_css_channel() {
            let unit = generate("[Origin] @Style { .x { a: b; } }\ndiv { }");
            assert!(unit.css.contains(".x { a: b; }"));
        }

        #[test]
        fn javascript_origin_feeds_script_channel() {
            let unit = generate("[Origin] @JavaScript { var x = 1; }\ndiv { }");
            assert_eq!(unit.scripts.len(), 1);
            assert!(unit.scripts[0].1.contains("var x = 1;"));
        }

        #[test]
        fn generator_comments_survive_generation() {
            let unit = generate("-- build marker\ndiv { }");
            assert!(unit.html.contains("<!-- build marker -->"));
        }

        #[test]
        fn generator_comments_can_be_suppressed() {
            let (document, _) = Parser::new("-- gone\ndiv { }", ParserConfig::default()).parse();
            let registry = NamespaceRegistry::new();
            let config = GeneratorConfig {
                emit_generator_comments: false,
                ..GeneratorConfig::default()
            };
            let unit = HtmlGenerator::new(&registry, config).generate(&document);
            assert!(!unit.html.contains("gone"));
        }

        #[test]
        fn use_html5_emits_doctype() {
            let unit = generate("use html5;\nhtml { body { } }");
            assert!(unit.html.starts_with("<!DOCTYPE html>"));
        }
    }

    mod scripts {
        use super::*;
        use chtl_compiler::ast::ScriptKind;

        #[test]
        fn local_scripts_are_collected_not_emitted() {
            let unit = generate("div { script { var x = 1; } }");
            assert_eq!(unit.html, "<div></div>");
            assert_eq!(unit.scripts.len(), 1);
            assert_eq!(unit.scripts[0].0, ScriptKind::Plain);
        }

        #[test]
        fn chtl_js_scripts_keep_their_classification() {
            let unit = generate("div { script { {{.a}} -> x(); } }");
            assert_eq!(unit.scripts[0].0, ScriptKind::ChtlJs);
        }
    }

    mod properties {
        use super::*;

        /// Generating twice from the same tree yields identical bytes.
        #[test]
        fn generation_is_idempotent() {
            let source = "[Template] @Element C { div { \"t\" } }\nbody { @Element C; p { \"x\" } }";
            let (mut document, _) = Parser::new(source, ParserConfig::default()).parse();
            let mut registry = NamespaceRegistry::new();
            registry.collect_document(&document, "t.chtl", GLOBAL);
            SelectorAutomation::default().process(&mut document);
            let generator = HtmlGenerator::new(&registry, GeneratorConfig::default());
            let first = generator.generate(&document);
            let second = generator.generate(&document);
            assert_eq!(first.html, second.html);
            assert_eq!(first.css, second.css);
        }

        /// parse . print . parse is a fixpoint for the plain subset.
        #[test]
        fn printed_ast_reparses_to_the_same_shape() {
            let source = "div { id: box; class: a; span { \"text\" } style { .x { color: red; } } }";
            let (document, _) = Parser::new(source, ParserConfig::default()).parse();
            let printed = print_chtl(&document);
            let (reparsed, diagnostics) =
                Parser::new(&printed, ParserConfig::default()).parse();
            assert!(diagnostics.is_empty(), "reparse problems on {:?}: {:?}", printed, diagnostics);
            assert_eq!(shape(&document), shape(&reparsed));
        }
    }

    /// Minimal CHTL printer for the round-trip property (plain subset:
    /// elements, attributes, text, style blocks and rules).
    fn print_chtl(node: &Node) -> String {
        let mut out = String::new();
        print_into(node, &mut out);
        out
    }

    fn print_into(node: &Node, out: &mut String) {
        match node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    print_into(child, out);
                    out.push('\n');
                }
            }
            NodeKind::Element => {
                out.push_str(&node.value);
                out.push_str(" { ");
                for (name, value) in &node.attributes {
                    out.push_str(&format!("{}: \"{}\"; ", name, value));
                }
                for child in &node.children {
                    print_into(child, out);
                    out.push(' ');
                }
                out.push('}');
            }
            NodeKind::Text => {
                out.push_str(&format!("\"{}\";", node.value));
            }
            NodeKind::Style => {
                out.push_str("style { ");
                for (name, value) in &node.attributes {
                    out.push_str(&format!("{}: {}; ", name, value));
                }
                for child in &node.children {
                    print_into(child, out);
                    out.push(' ');
                }
                out.push('}');
            }
            NodeKind::StyleRule => {
                out.push_str(&node.value);
                out.push_str(" { ");
                for (name, value) in &node.attributes {
                    out.push_str(&format!("{}: {}; ", name, value));
                }
                out.push('}');
            }
            _ => {}
        }
    }

    /// Span-free structural projection used for tree comparison.
    fn shape(node: &Node) -> String {
        let attributes: Vec<String> = node
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let children: Vec<String> = node.children.iter().map(shape).collect();
        format!(
            "({:?} {:?} [{}] [{}])",
            node.kind,
            node.value,
            attributes.join(","),
            children.join(",")
        )
    }
}
