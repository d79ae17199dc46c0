use kahlua_core::prelude::*;
use kahlua_core::{FactoryLoader, MergeStrategy, OutputFormat, CONTEXT_BINDING};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture(path: &str) -> String {
    format!("{}/{}", FIXTURES, path)
}

fn repeat_plugin() -> PluginDescriptor {
    PluginDescriptor::new()
        .with_document("Resources", json!({}))
        .with_command("repeat", |_ctx, args| {
            let n = args.first().and_then(Value::as_u64).unwrap_or(0) as usize;
            let item = args.get(1).cloned().unwrap_or(Value::Null);
            Ok(Value::Array(vec![item; n]))
        })
}

/// A plugin that appends `<point>:<name>` to a shared log for every hook.
fn logging_plugin(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> PluginDescriptor {
    let mut plugin = PluginDescriptor::named(name).with_document("Resources", json!({}));
    for point in HookPoint::ALL {
        let log = Arc::clone(log);
        plugin = plugin.with_hook(point, move |_ctx, view| {
            let keys = view
                .get("Resources")
                .and_then(Value::as_object)
                .map(|r| r.len())
                .unwrap_or(0);
            log.lock().unwrap().push(format!("{}:{}:{}", point, name, keys));
            Ok(())
        });
    }
    plugin
}

#[test]
fn repeat_command_end_to_end() {
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.Test = $.repeat(3, #{a:1})");

    let text = kahlua.generate().unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
        document["Resources"]["Test"],
        json!([{ "a": 1 }, { "a": 1 }, { "a": 1 }])
    );
}

#[test]
fn object_notation_fragment_from_file() {
    let mut kahlua = Kahlua::new();
    kahlua
        .use_descriptor(PluginDescriptor::new().with_document("Resources", json!({})))
        .unwrap();
    kahlua.load(fixture("templates/object_notation.rhai")).unwrap();

    let text = kahlua.generate().unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document, json!({ "Resources": { "MyResource": { "Value": 100 } } }));
    assert_eq!(kahlua.fragments()[0].label(), fixture("templates/object_notation.rhai"));
}

#[test]
fn dsl_collisions_follow_registration_order() {
    let named = |name: &'static str| {
        PluginDescriptor::named(name)
            .with_document("Resources", json!({}))
            .with_command("who", move |_ctx, _args| Ok(json!(name)))
    };

    for (order, expected) in [(["a", "b"], "b"), (["b", "a"], "a")] {
        let mut kahlua = Kahlua::new();
        for name in order {
            kahlua.use_descriptor(named(name)).unwrap();
        }
        kahlua.add("Resources.Who = $.who();");

        let document = kahlua.generate_document().unwrap();
        assert_eq!(document["Resources"]["Who"], json!(expected));
    }
}

#[test]
fn default_sections_are_a_union_with_last_plugin_winning() {
    let mut kahlua = Kahlua::new();
    kahlua
        .use_descriptor(
            PluginDescriptor::named("first")
                .with_document("AWSTemplateFormatVersion", json!("2010-09-09"))
                .with_document("Resources", json!({ "Default": "first" })),
        )
        .unwrap();
    kahlua
        .use_descriptor(
            PluginDescriptor::named("second")
                .with_document("Resources", json!({ "Default": "second" }))
                .with_document("Outputs", json!({})),
        )
        .unwrap();

    let document = kahlua.generate_document().unwrap();
    let keys: Vec<&String> = document.keys().collect();
    assert_eq!(keys, ["AWSTemplateFormatVersion", "Resources", "Outputs"]);
    assert_eq!(document["Resources"], json!({ "Default": "second" }));
}

#[test]
fn hooks_fire_in_registration_order_and_finish_last() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(logging_plugin("a", &log)).unwrap();
    kahlua.use_descriptor(logging_plugin("b", &log)).unwrap();
    kahlua.add("Resources.One = 1;");
    kahlua.add("Resources.Two = 2;");

    kahlua.generate_document().unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "init:a:0",
            "init:b:0",
            "beforeEach:a:0",
            "beforeEach:b:0",
            "afterEach:a:1",
            "afterEach:b:1",
            "beforeEach:a:0",
            "beforeEach:b:0",
            "afterEach:a:1",
            "afterEach:b:1",
            "finish:a:2",
            "finish:b:2",
        ]
    );
}

#[test]
fn empty_fragment_leaves_document_unchanged() {
    let mut kahlua = Kahlua::new();
    kahlua
        .use_descriptor(PluginDescriptor::new().with_document("Resources", json!({ "Keep": true })))
        .unwrap();
    kahlua.add("let unused = 1;");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"], json!({ "Keep": true }));
}

#[test]
fn disjoint_keys_from_two_fragments_are_merged() {
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.First = 1;");
    kahlua.add("Resources.Second = 2;");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"], json!({ "First": 1, "Second": 2 }));
}

#[test]
fn later_fragment_wins_on_same_key() {
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.Same = #{ from: \"first\", only_first: true };");
    kahlua.add("Resources.Same = #{ from: \"second\" };");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"]["Same"], json!({ "from": "second" }));
}

#[test]
fn deep_merge_keeps_nested_keys() {
    let config = KahluaConfig::default().with_merge_strategy(MergeStrategy::Deep);
    let mut kahlua = Kahlua::with_config(config);
    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.Same = #{ from: \"first\", only_first: true };");
    kahlua.add("Resources.Same = #{ from: \"second\" };");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(
        document["Resources"]["Same"],
        json!({ "from": "second", "only_first": true })
    );
}

#[test]
fn init_hook_state_is_visible_to_commands() {
    let options_plugin = |options: &Value| -> Result<PluginDescriptor> {
        let value = options.get("value").cloned().unwrap_or(Value::Null);
        Ok(PluginDescriptor::new()
            .with_document("Resources", json!({}))
            .with_hook(HookPoint::Init, move |ctx, _doc| {
                ctx.set("kahlua-dsl-options", "value", value.clone());
                Ok(())
            })
            .with_command("configured", |ctx, args| {
                if let Some(arg) = args.first() {
                    return Ok(arg.clone());
                }
                Ok(ctx
                    .get("kahlua-dsl-options", "value")
                    .cloned()
                    .unwrap_or(json!(100)))
            })
            .with_hook(HookPoint::Finish, |ctx, _doc| {
                ctx.clear_namespace("kahlua-dsl-options");
                Ok(())
            }))
    };
    let loader = FactoryLoader::new().with_factory("options", options_plugin);
    let mut kahlua = Kahlua::new().with_loader(loader);
    kahlua.use_plugin("options", json!({ "value": 1000 })).unwrap();
    kahlua.add("Resources.FromInit = $.configured(); Resources.Explicit = $.configured(5);");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"]["FromInit"], json!(1000));
    assert_eq!(document["Resources"]["Explicit"], json!(5));
}

#[test]
fn script_plugin_shares_this_with_hooks() {
    let mut kahlua = Kahlua::new();
    kahlua
        .use_plugin(&fixture("plugins/my-example"), json!({ "value": 1000 }))
        .unwrap();
    kahlua.load(fixture("templates/example_plugin_usage.rhai")).unwrap();

    let text = kahlua.generate().unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document["Resources"]["Example"]["Properties"]["Value"], json!(1000));
}

#[test]
fn script_plugin_falls_back_without_options() {
    let mut kahlua = Kahlua::new();
    kahlua.use_plugin(&fixture("plugins/my-example"), Value::Null).unwrap();
    kahlua.load(fixture("templates/example_plugin_usage.rhai")).unwrap();

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"]["Example"]["Properties"]["Value"], json!(100));
}

#[test]
fn script_plugin_identifiers_resolve_to_one_name() {
    let config = KahluaConfig::default().with_plugin_path(fixture("plugins"));
    let mut kahlua = Kahlua::with_config(config);

    kahlua.use_plugin("kahlua-dsl-my-example", Value::Null).unwrap();
    kahlua.use_plugin("my-example", json!({ "value": 10 })).unwrap();
    kahlua
        .use_plugin(
            &fixture("plugins/kahlua-dsl-my-example/kahlua-dsl-my-example.rhai"),
            Value::Null,
        )
        .unwrap();
    kahlua.use_plugin(&fixture("plugins/kahlua-dsl-my-example"), Value::Null).unwrap();

    assert_eq!(kahlua.plugin_names(), vec!["kahlua-dsl-my-example"; 4]);
}

#[test]
fn failing_fragment_aborts_without_finish() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(logging_plugin("a", &log)).unwrap();
    kahlua.add("Resources.Good = 1;");
    kahlua.add("Resources.Partial = 1; $.undefined_command();");
    kahlua.add("Resources.Never = 1;");

    let err = kahlua.generate().unwrap_err();
    assert!(err.is_evaluation());
    assert!(matches!(err, KahluaError::Evaluation { index: 1, .. }));

    let log = log.lock().unwrap();
    assert!(!log.iter().any(|entry| entry.starts_with("finish")));
    assert_eq!(log.iter().filter(|entry| entry.starts_with("beforeEach")).count(), 2);
}

#[test]
fn runs_do_not_share_context_state() {
    let plugin = PluginDescriptor::named("counter")
        .with_document("Resources", json!({}))
        .with_command("next", |ctx, _args| {
            let next = ctx.get("counter", "n").and_then(Value::as_i64).unwrap_or(0) + 1;
            ctx.set("counter", "n", json!(next));
            Ok(json!(next))
        });
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(plugin).unwrap();
    kahlua.add("Resources.A = $.next();");
    kahlua.add("Resources.B = $.next();");

    let first = kahlua.generate_document().unwrap();
    let second = kahlua.generate_document().unwrap();
    assert_eq!(first["Resources"], json!({ "A": 1, "B": 2 }));
    assert_eq!(first, second);
}

#[test]
fn before_each_can_seed_the_working_view() {
    let plugin = PluginDescriptor::new()
        .with_document("Resources", json!({}))
        .with_hook(HookPoint::BeforeEach, |_ctx, view| {
            view.insert("Resources".into(), json!({ "Seeded": true }));
            Ok(())
        });
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(plugin).unwrap();
    kahlua.add("Resources.Saw = Resources.Seeded;");

    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"], json!({ "Saw": true, "Seeded": true }));
}

#[test]
fn failing_hook_reports_plugin() {
    let plugin = PluginDescriptor::named("strict")
        .with_document("Resources", json!({}))
        .with_hook(HookPoint::AfterEach, |_ctx, view| {
            if view["Resources"].get("Forbidden").is_some() {
                return Err(KahluaError::Configuration("Forbidden resource".into()));
            }
            Ok(())
        });
    let mut kahlua = Kahlua::new();
    kahlua.use_descriptor(plugin).unwrap();
    kahlua.add("Resources.Forbidden = 1;");

    let err = kahlua.generate_document().unwrap_err();
    assert!(matches!(
        err,
        KahluaError::Hook { ref plugin, point: HookPoint::AfterEach, .. } if plugin == "strict"
    ));
}

#[test]
fn yaml_output() {
    let config = KahluaConfig::default().with_output_format(OutputFormat::Yaml);
    let mut kahlua = Kahlua::with_config(config);
    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.Test = $.repeat(2, \"x\");");

    let text = kahlua.generate().unwrap();
    let document: Value = serde_yaml_ng::from_str(&text).unwrap();
    assert_eq!(document, json!({ "Resources": { "Test": ["x", "x"] } }));
}

#[test]
fn unusable_plugins_are_rejected_at_registration() {
    let mut kahlua = Kahlua::new();

    let shadowing = PluginDescriptor::named("shadowing")
        .with_document("Resources", json!({}))
        .with_document(CONTEXT_BINDING, json!({}));
    let err = kahlua.use_descriptor(shadowing).unwrap_err();
    assert!(err.is_configuration());

    let keyword = PluginDescriptor::named("keyword")
        .with_document("Resources", json!({}))
        .with_command("print", |_ctx, _args| Ok(Value::Null));
    let err = kahlua.use_descriptor(keyword).unwrap_err();
    assert!(err.is_configuration());

    assert!(kahlua.plugin_names().is_empty());

    kahlua.use_descriptor(repeat_plugin()).unwrap();
    kahlua.add("Resources.A = 1;");
    let document = kahlua.generate_document().unwrap();
    assert_eq!(document["Resources"], json!({ "A": 1 }));
}
