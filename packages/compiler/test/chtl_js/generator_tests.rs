//! CHTL-JS generator tests

#[cfg(test)]
mod chtl_js_generator_tests {
    use chtl_compiler::chtl_js::{JsGenerator, JsGeneratorConfig, ModuleFormat, Parser};

    fn generate(source: &str) -> String {
        let (program, diagnostics) = Parser::new(source).parse();
        assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
        JsGenerator::default().generate(&program)
    }

    fn generate_with(source: &str, config: JsGeneratorConfig) -> String {
        let (program, _) = Parser::new(source).parse();
        JsGenerator::new(config).generate(&program)
    }

    mod prelude {
        use super::*;

        #[test]
        fn runtime_helpers_come_first() {
            let out = generate("var x = 1;");
            let selector_at = out.find("var CHTLSelector").unwrap();
            let delegation_at = out.find("var CHTLEventDelegation").unwrap();
            let animation_at = out.find("var CHTLAnimation").unwrap();
            let virtuals_at = out.find("var CHTLVirtualObjects").unwrap();
            let user_at = out.find("var x = 1;").unwrap();
            assert!(selector_at < delegation_at);
            assert!(delegation_at < animation_at);
            assert!(animation_at < virtuals_at);
            assert!(virtuals_at < user_at);
        }

        #[test]
        fn output_is_wrapped_in_strict_iife() {
            let out = generate("var x = 1;");
            assert!(out.starts_with("(function() {"));
            assert!(out.contains("'use strict';"));
            assert!(out.trim_end().ends_with("})();"));
        }

        #[test]
        fn iife_wrap_can_be_disabled() {
            let out = generate_with(
                "var x = 1;",
                JsGeneratorConfig { wrap_iife: false, ..JsGeneratorConfig::default() },
            );
            assert!(!out.starts_with("(function()"));
        }

        #[test]
        fn loader_shim_only_appears_with_module_blocks() {
            assert!(!generate("var x = 1;").contains("CHTLModuleLoader"));
            assert!(generate("module { load: a.js }").contains("CHTLModuleLoader"));
        }
    }

    mod selectors {
        use super::*;

        #[test]
        fn selector_queries_translate_to_helper_calls() {
            assert!(generate("{{.card}} -> hide();").contains("CHTLSelector.byClass('.card')"));
            assert!(generate("{{#app}} -> hide();").contains("CHTLSelector.byId('#app')"));
            assert!(generate("{{div}} -> hide();").contains("CHTLSelector.byTag('div')"));
            assert!(generate("{{.a .b}} -> hide();").contains("CHTLSelector.query('.a .b')"));
            assert!(generate("{{&}} -> hide();").contains("CHTLSelector.current()"));
        }

        #[test]
        fn arrow_flattens_to_member_access() {
            let out = generate("{{#app}} -> hide();");
            assert!(out.contains("CHTLSelector.byId('#app')."));
            assert!(out.contains("hide();"));
        }

        #[test]
        fn indexed_selector_appends_subscript() {
            let out = generate("{{.item}}[2] -> show();");
            assert!(out.contains("CHTLSelector.byClass('.item')[2]"));
        }

        #[test]
        fn repeated_selectors_are_hoisted_once() {
            let out = generate("{{.btn}} -> a(); {{.btn}} -> b();");
            assert!(out.contains("var _chtl_sel_0 = CHTLSelector.byClass('.btn');"));
            assert!(out.contains("_chtl_sel_0.a();"));
            assert!(out.contains("_chtl_sel_0.b();"));
            // The direct call appears only in the hoist declaration.
            assert_eq!(out.matches("CHTLSelector.byClass('.btn')").count(), 1);
        }

        #[test]
        fn single_use_selectors_stay_inline() {
            let out = generate("{{.once}} -> go();");
            assert!(!out.contains("_chtl_sel_"));
        }
    }

    mod bindings {
        use super::*;

        #[test]
        fn listen_expands_to_add_event_listener_calls() {
            let out = generate("{{.btn}} -> listen { click: function(){}, focus: onFocus };");
            assert!(out
                .contains("CHTLSelector.byClass('.btn').addEventListener('click', function(){});"));
            assert!(out.contains("CHTLSelector.byClass('.btn').addEventListener('focus', onFocus);"));
        }

        #[test]
        fn event_binding_wraps_body_in_handler() {
            let out = generate("btn &-> click { go(); }");
            assert!(out.contains("btn.addEventListener('click', function(event) { go(); });"));
        }

        #[test]
        fn delegate_routes_through_runtime() {
            let out = generate("{{.list}} -> delegate { target: '.item', click: onClick };");
            assert!(out.contains(
                "CHTLEventDelegation.delegate(CHTLSelector.byClass('.list'), '.item', 'click', onClick);"
            ));
        }

        #[test]
        fn standalone_delegate_defaults_to_document() {
            let out = generate("delegate { target: '.x', click: f };");
            assert!(out.contains("CHTLEventDelegation.delegate(document, '.x', 'click', f);"));
        }
    }

    mod animate_and_vir {
        use super::*;

        #[test]
        fn animate_builds_an_options_object() {
            let out = generate(
                "animate { target: {{.box}}, duration: 500, when[0] { at: 0.5; opacity: 0.7 } };",
            );
            assert!(out.contains("CHTLAnimation.animate({"));
            assert!(out.contains("target: CHTLSelector.byClass('.box')"));
            assert!(out.contains("duration: 500"));
            assert!(out.contains("keyframes: [{at: 0.5, props: {opacity: 0.7}}]"));
        }

        #[test]
        fn animate_camel_cases_css_properties() {
            let out = generate("animate { target: {{.box}}, when[0] { at: 1; background-color: red } };");
            assert!(out.contains("backgroundColor: 'red'"));
        }

        #[test]
        fn vir_stores_block_in_virtual_objects() {
            let out = generate("vir handlers = listen { click: f };");
            assert!(out.contains("CHTLVirtualObjects.handlers = {click: f};"));
        }
    }

    mod modules {
        use super::*;

        #[test]
        fn script_injection_emits_loader_calls_in_order() {
            let out = generate("module { load: a.js, b.js };");
            let a = out.find("CHTLModuleLoader.load('a.js'").unwrap();
            let b = out.find("CHTLModuleLoader.load('b.js'").unwrap();
            assert!(a < b);
        }

        #[test]
        fn commonjs_format_emits_requires() {
            let out = generate_with(
                "module { load: \"lib/helper.js\" };",
                JsGeneratorConfig {
                    module_format: ModuleFormat::CommonJs,
                    ..JsGeneratorConfig::default()
                },
            );
            assert!(out.contains("var helper = require('lib/helper.js');"));
        }

        #[test]
        fn esm_format_emits_imports() {
            let out = generate_with(
                "module { load: \"lib/helper.js\" };",
                JsGeneratorConfig {
                    module_format: ModuleFormat::EsModule,
                    ..JsGeneratorConfig::default()
                },
            );
            assert!(out.contains("import 'lib/helper.js';"));
        }
    }

    mod idempotence {
        use super::*;

        #[test]
        fn generating_twice_is_byte_identical() {
            let (program, _) = Parser::new("{{.a}} -> listen { click: f }; var x = 1;").parse();
            let generator = JsGenerator::default();
            assert_eq!(generator.generate(&program), generator.generate(&program));
        }
    }
}
