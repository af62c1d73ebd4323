//! CHTL parser tests

#[cfg(test)]
mod chtl_parser_tests {
    use chtl_compiler::ast::{DeclKind, DeleteKind, Node, NodeKind, OriginKind};
    use chtl_compiler::chtl::{Parser, ParserConfig};
    use chtl_compiler::parse_util::Diagnostic;

    fn parse(source: &str) -> (Node, Vec<Diagnostic>) {
        Parser::new(source, ParserConfig::default()).parse()
    }

    fn parse_ok(source: &str) -> Node {
        let (document, diagnostics) = parse(source);
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            diagnostics
        );
        document
    }

    mod elements {
        use super::*;

        #[test]
        fn should_parse_element_with_attributes_and_text() {
            let document = parse_ok("div { id: box; \"hello\" }");
            assert_eq!(document.children.len(), 1);
            let element = &document.children[0];
            assert_eq!(element.kind, NodeKind::Element);
            assert_eq!(element.value, "div");
            assert_eq!(element.attribute("id"), Some("box"));
            assert_eq!(element.children.len(), 1);
            assert_eq!(element.children[0].kind, NodeKind::Text);
            assert_eq!(element.children[0].value, "hello");
        }

        #[test]
        fn should_parse_nested_elements() {
            let document = parse_ok("div { span { \"in\" } }");
            let outer = &document.children[0];
            assert_eq!(outer.children[0].kind, NodeKind::Element);
            assert_eq!(outer.children[0].value, "span");
        }

        #[test]
        fn attribute_order_is_preserved() {
            let document = parse_ok("div { b: 1; a: 2; c: 3; }");
            let keys: Vec<&String> = document.children[0].attributes.keys().collect();
            assert_eq!(keys, vec!["b", "a", "c"]);
        }

        #[test]
        fn unquoted_values_join_sensibly() {
            let document = parse_ok("div { style { margin: 0 10px 5px auto; color: #fff; } }");
            let style = &document.children[0].children[0];
            assert_eq!(style.attribute("margin"), Some("0 10px 5px auto"));
            assert_eq!(style.attribute("color"), Some("#fff"));
        }

        #[test]
        fn text_block_collects_literals() {
            let document = parse_ok("div { text { \"a\" \"b\" } }");
            let text = &document.children[0].children[0];
            assert_eq!(text.kind, NodeKind::Text);
            assert_eq!(text.value, "a b");
        }
    }

    mod style_blocks {
        use super::*;

        #[test]
        fn selector_rules_become_children() {
            let document = parse_ok("div { style { .card { color: red; } } }");
            let style = &document.children[0].children[0];
            assert_eq!(style.kind, NodeKind::Style);
            let rule = &style.children[0];
            assert_eq!(rule.kind, NodeKind::StyleRule);
            assert_eq!(rule.value, ".card");
            assert_eq!(rule.attribute("color"), Some("red"));
        }

        #[test]
        fn pseudo_selectors_join_without_spaces() {
            let document = parse_ok("div { style { &:hover { color: red; } } }");
            let rule = &document.children[0].children[0].children[0];
            assert_eq!(rule.value, "&:hover");
        }

        #[test]
        fn descendant_selectors_keep_spaces() {
            let document = parse_ok("div { style { .a .b { x: y; } } }");
            let rule = &document.children[0].children[0].children[0];
            assert_eq!(rule.value, ".a .b");
        }

        #[test]
        fn style_reference_with_specialisation() {
            let document =
                parse_ok("div { style { @Style Base { color: red; delete margin; } } }");
            let style = &document.children[0].children[0];
            let reference = &style.children[0];
            assert_eq!(reference.kind, NodeKind::CustomRef(DeclKind::Style));
            assert_eq!(reference.value, "Base");
            assert_eq!(reference.attribute("color"), Some("red"));
            assert!(reference
                .children
                .iter()
                .any(|c| c.kind == NodeKind::Delete(DeleteKind::Property) && c.value == "margin"));
        }

        #[test]
        fn plain_style_reference_is_template_ref() {
            let document = parse_ok("div { style { @Style Base; } }");
            let reference = &document.children[0].children[0].children[0];
            assert_eq!(reference.kind, NodeKind::TemplateRef(DeclKind::Style));
        }
    }

    mod declarations {
        use super::*;

        #[test]
        fn template_element_declaration() {
            let document = parse_ok("[Template] @Element Card { div { \"x\" } }");
            let template = &document.children[0];
            assert_eq!(template.kind, NodeKind::Template(DeclKind::Element));
            assert_eq!(template.value, "Card");
            assert_eq!(template.children[0].kind, NodeKind::Element);
        }

        #[test]
        fn template_var_declaration() {
            let document = parse_ok("[Template] @Var G { key = value; other: 12px; }");
            let template = &document.children[0];
            assert_eq!(template.kind, NodeKind::Template(DeclKind::Var));
            assert_eq!(template.attribute("key"), Some("value"));
            assert_eq!(template.attribute("other"), Some("12px"));
        }

        #[test]
        fn custom_style_declaration_with_inherit() {
            let document = parse_ok("[Custom] @Style B { inherit A; margin: 0; }");
            let custom = &document.children[0];
            assert_eq!(custom.kind, NodeKind::Custom(DeclKind::Style));
            assert!(custom
                .children
                .iter()
                .any(|c| c.kind == NodeKind::Inherit && c.value == "A"));
            assert_eq!(custom.attribute("margin"), Some("0"));
        }

        #[test]
        fn origin_declaration_keeps_verbatim_body() {
            let document = parse_ok("[Origin] @Html banner { <b>raw & verbatim</b> }");
            let origin = &document.children[0];
            assert_eq!(origin.kind, NodeKind::Origin(OriginKind::Html));
            assert_eq!(origin.attribute("name"), Some("banner"));
            assert!(origin.value.contains("<b>raw & verbatim</b>"));
        }

        #[test]
        fn origin_reference_is_a_statement() {
            let document = parse_ok("div { [Origin] @Html banner; }");
            let reference = &document.children[0].children[0];
            assert_eq!(reference.kind, NodeKind::OriginRef(OriginKind::Html));
            assert_eq!(reference.value, "banner");
        }

        #[test]
        fn namespace_with_nested_declarations() {
            let document = parse_ok("[Namespace] ui.widgets { [Template] @Element C { div { } } }");
            let namespace = &document.children[0];
            assert_eq!(namespace.kind, NodeKind::Namespace);
            assert_eq!(namespace.value, "ui.widgets");
            assert_eq!(
                namespace.children[0].kind,
                NodeKind::Template(DeclKind::Element)
            );
        }

        #[test]
        fn import_with_from_and_alias() {
            let document = parse_ok("[Import] util from \"./lib/util.chtl\" as u;");
            let import = &document.children[0];
            assert_eq!(import.kind, NodeKind::Import);
            assert_eq!(import.value, "util");
            assert_eq!(import.attribute("from"), Some("./lib/util.chtl"));
            assert_eq!(import.attribute("as"), Some("u"));
        }

        #[test]
        fn configuration_block() {
            let document = parse_ok("[Configuration] { DEBUG = true; INDENT = 4; }");
            let configuration = &document.children[0];
            assert_eq!(configuration.kind, NodeKind::Configuration);
            assert_eq!(configuration.attribute("DEBUG"), Some("true"));
        }

        #[test]
        fn use_statement_sets_target() {
            let document = parse_ok("use html5;\ndiv { }");
            let configuration = &document.children[0];
            assert_eq!(configuration.kind, NodeKind::Configuration);
            assert_eq!(configuration.attribute("use"), Some("html5"));
        }
    }

    mod references {
        use super::*;

        #[test]
        fn element_reference_with_arguments() {
            let document = parse_ok("body { @Element Card(label=\"x\", width=10px); }");
            let reference = &document.children[0].children[0];
            assert_eq!(reference.kind, NodeKind::TemplateRef(DeclKind::Element));
            assert_eq!(reference.value, "Card");
            assert_eq!(reference.attribute("label"), Some("x"));
            assert_eq!(reference.attribute("width"), Some("10px"));
        }

        #[test]
        fn reference_with_from_clause() {
            let document = parse_ok("body { @Element Chip from ui.widgets; }");
            let reference = &document.children[0].children[0];
            assert_eq!(reference.attribute("from"), Some("ui.widgets"));
        }

        #[test]
        fn script_block_captures_raw_body() {
            let document = parse_ok("div { script { var x = {a: 1}; } }");
            let script = &document.children[0].children[0];
            assert!(matches!(script.kind, NodeKind::Script(_)));
            assert_eq!(script.value.trim(), "var x = {a: 1};");
        }

        #[test]
        fn delete_and_except_statements() {
            let document = parse_ok("div { except span, [Custom] @Element Box; }");
            let except = &document.children[0].children[0];
            assert_eq!(except.kind, NodeKind::Except);
            assert!(except.value.contains("span"));
            assert!(except.value.contains("[Custom]"));
        }
    }

    mod comments {
        use super::*;
        use chtl_compiler::ast::CommentKind;

        #[test]
        fn generator_comments_become_nodes() {
            let document = parse_ok("-- keep me\ndiv { }");
            assert_eq!(
                document.children[0].kind,
                NodeKind::Comment(CommentKind::Generator)
            );
            assert_eq!(document.children[0].value, "keep me");
        }

        #[test]
        fn line_comments_are_dropped() {
            let document = parse_ok("// gone\ndiv { }");
            assert_eq!(document.children.len(), 1);
            assert_eq!(document.children[0].kind, NodeKind::Element);
        }
    }

    mod recovery {
        use super::*;

        #[test]
        fn recovers_at_sync_token_and_marks_invalid() {
            let (document, diagnostics) = parse("div { ?; id: box; }");
            assert!(!diagnostics.is_empty());
            let element = &document.children[0];
            assert!(element.children.iter().any(|c| c.kind == NodeKind::Invalid));
            assert_eq!(element.attribute("id"), Some("box"));
        }

        #[test]
        fn strict_mode_stops_at_first_error() {
            let config = ParserConfig { recover: false, ..ParserConfig::default() };
            let (_, diagnostics) = Parser::new("div { ?; }\nspan { ?; }", config).parse();
            assert_eq!(diagnostics.len(), 1);
        }

        #[test]
        fn later_declarations_survive_earlier_errors() {
            let (document, diagnostics) = parse("div { ? }\n[Template] @Element C { div { } }");
            assert!(!diagnostics.is_empty());
            assert!(document
                .children
                .iter()
                .any(|c| c.kind == NodeKind::Template(DeclKind::Element)));
        }
    }
}
