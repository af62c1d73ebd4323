//! CHTL-JS parser tests

#[cfg(test)]
mod chtl_js_parser_tests {
    use chtl_compiler::chtl_js::ast::{JsNode, SelectorQuery};
    use chtl_compiler::chtl_js::Parser;

    fn parse(source: &str) -> Vec<JsNode> {
        let (program, diagnostics) = Parser::new(source).parse();
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            diagnostics
        );
        match program {
            JsNode::Program(parts) => parts,
            other => panic!("expected a program, got {:?}", other),
        }
    }

    mod selectors {
        use super::*;

        #[test]
        fn classifies_class_id_tag_and_compound() {
            for (source, expected) in [
                ("{{.card}}", SelectorQuery::Class),
                ("{{#app}}", SelectorQuery::Id),
                ("{{button}}", SelectorQuery::Tag),
                ("{{.list .item}}", SelectorQuery::Compound),
                ("{{&}}", SelectorQuery::Reference),
            ] {
                let parts = parse(source);
                match &parts[0] {
                    JsNode::EnhancedSelector(node) => assert_eq!(node.query, expected),
                    other => panic!("expected a selector for {}, got {:?}", source, other),
                }
            }
        }

        #[test]
        fn indexed_selector_keeps_index() {
            let parts = parse("{{.item}}[2]");
            match &parts[0] {
                JsNode::EnhancedSelector(node) => assert_eq!(node.index, Some(2)),
                other => panic!("expected a selector, got {:?}", other),
            }
        }
    }

    mod listen_blocks {
        use super::*;

        #[test]
        fn arrow_listen_attaches_to_selector() {
            let parts = parse("{{.btn}} -> listen { click: function() {}, hover: onHover };");
            let listen = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Listen(node) => Some(node),
                    _ => None,
                })
                .expect("listen node");
            assert!(listen.target.is_some());
            assert_eq!(listen.handlers.len(), 2);
            assert_eq!(listen.handlers[0].event, "click");
            assert_eq!(listen.handlers[0].handler, "function() {}");
            assert_eq!(listen.handlers[1].event, "hover");
            assert_eq!(listen.handlers[1].handler, "onHover");
        }

        #[test]
        fn handler_bodies_keep_nested_commas() {
            let parts = parse("{{.a}} -> listen { click: function(a, b) { go(a, b); } };");
            let listen = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Listen(node) => Some(node),
                    _ => None,
                })
                .unwrap();
            assert_eq!(listen.handlers[0].handler, "function(a, b) { go(a, b); }");
        }
    }

    mod event_bindings {
        use super::*;

        #[test]
        fn binds_raw_identifier_target() {
            let parts = parse("btn &-> click { doThing(); }");
            let binding = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::EventBinding(node) => Some(node),
                    _ => None,
                })
                .expect("event binding");
            assert_eq!(binding.event, "click");
            assert_eq!(binding.body, "doThing();");
            match binding.target.as_ref() {
                JsNode::Raw(text) => assert_eq!(text, "btn"),
                other => panic!("expected raw target, got {:?}", other),
            }
        }

        #[test]
        fn binds_selector_target() {
            let parts = parse("{{#save}} &-> click { save(); }");
            let binding = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::EventBinding(node) => Some(node),
                    _ => None,
                })
                .unwrap();
            assert!(matches!(
                binding.target.as_ref(),
                JsNode::EnhancedSelector(_)
            ));
        }
    }

    mod structured_blocks {
        use super::*;

        #[test]
        fn delegate_separates_target_from_handlers() {
            let parts = parse("{{.list}} -> delegate { target: '.item', click: onClick };");
            let delegate = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Delegate(node) => Some(node),
                    _ => None,
                })
                .expect("delegate node");
            assert!(delegate.parent.is_some());
            assert_eq!(delegate.target, "'.item'");
            assert_eq!(delegate.handlers.len(), 1);
        }

        #[test]
        fn animate_collects_options_and_keyframes() {
            let parts = parse(
                "animate { target: {{.box}}, duration: 1000, easing: 'ease', \
                 begin { opacity: 0 }, when[0] { at: 0.5; opacity: 0.7 }, \
                 end { opacity: 1 }, loop: 2 };",
            );
            let animate = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Animate(node) => Some(node),
                    _ => None,
                })
                .expect("animate node");
            assert!(animate.options.iter().any(|(k, _)| k == "duration"));
            assert_eq!(animate.begin.len(), 1);
            assert_eq!(animate.end.len(), 1);
            assert_eq!(animate.keyframes.len(), 1);
            assert_eq!(animate.keyframes[0].at.as_deref(), Some("0.5"));
            assert_eq!(animate.keyframes[0].props.len(), 1);
        }

        #[test]
        fn vir_captures_listen_block() {
            let parts = parse("vir handlers = listen { click: f };");
            let vir = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Vir(node) => Some(node),
                    _ => None,
                })
                .expect("vir node");
            assert_eq!(vir.name, "handlers");
            assert!(matches!(vir.block.as_ref(), JsNode::Listen(_)));
        }

        #[test]
        fn module_accepts_list_and_chained_forms() {
            let parts = parse("module { load: \"a.js\", load: \"b.js\" }");
            let module = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Module(node) => Some(node),
                    _ => None,
                })
                .unwrap();
            assert_eq!(module.loads, vec!["a.js", "b.js"]);

            let parts = parse("module { load: a.cjjs, b.cjjs, c.cjjs }");
            let module = parts
                .iter()
                .find_map(|p| match p {
                    JsNode::Module(node) => Some(node),
                    _ => None,
                })
                .unwrap();
            assert_eq!(module.loads, vec!["a.cjjs", "b.cjjs", "c.cjjs"]);
        }
    }

    mod raw_preservation {
        use super::*;

        #[test]
        fn untouched_javascript_survives_verbatim() {
            let parts = parse("var x = 5;\nfunction go() { return x; }\n");
            assert_eq!(parts.len(), 1);
            match &parts[0] {
                JsNode::Raw(text) => {
                    assert!(text.contains("var x = 5;"));
                    assert!(text.contains("function go() { return x; }"));
                }
                other => panic!("expected raw, got {:?}", other),
            }
        }

        #[test]
        fn raw_surrounds_extension_constructs() {
            let parts = parse("var a = 1; {{#app}} -> hide(); var b = 2;");
            assert!(matches!(parts[0], JsNode::Raw(_)));
            assert!(matches!(parts[1], JsNode::EnhancedSelector(_)));
            assert!(matches!(parts[2], JsNode::ArrowAccess));
            match parts.last().unwrap() {
                JsNode::Raw(text) => assert!(text.contains("var b = 2;")),
                other => panic!("expected trailing raw, got {:?}", other),
            }
        }
    }
}
