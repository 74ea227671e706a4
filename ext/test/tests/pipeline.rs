//! End-to-end behaviour of pipelines over a `TestDocument`

use sift::{one_shot, CompiledRule, LifetimeEvent, RegistryBuilder, SelectorConfig};
use sift_test::prelude::*;
use std::rc::Rc;

/// `<body>` with one `div.thread` per id.
fn document(ids: &[&str]) -> (Rc<TestDocument>, Vec<TestNode>) {
    let doc = Rc::new(TestDocument::new("body"));
    let threads = ids
        .iter()
        .map(|id| {
            let node = doc.create_element("div");
            doc.set_attribute(&node, "id", id);
            doc.add_class(&node, "thread");
            doc.append_child(&doc.root(), &node);
            node
        })
        .collect();
    (doc, threads)
}

fn element(doc: &TestDocument, tag: &str, id: &str, class: &str) -> TestNode {
    let node = doc.create_element(tag);
    doc.set_attribute(&node, "id", id);
    doc.set_attribute(&node, "class", class);
    node
}

fn compile(selector: &Selector<TestNode>) -> Pipeline<TestDocument> {
    Pipeline::compile(selector).unwrap()
}

fn record(doc: &Rc<TestDocument>, selector: &Selector<TestNode>) -> Recorder {
    let runtime = Runtime::new(Rc::clone(doc));
    Recorder::record(&compile(selector).select(&runtime, doc.root()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lifetime containment
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn ending_the_seed_ends_every_descendant_before_returning() {
    let doc = Rc::new(TestDocument::new("body"));
    let list = element(&doc, "ul", "list", "list");
    doc.append_child(&doc.root(), &list);
    let a = element(&doc, "li", "a", "item open");
    let b = element(&doc, "li", "b", "item open");
    doc.append_child(&list, &a);
    doc.append_child(&list, &b);

    let pipeline = compile(
        &Selector::new()
            .descend(".list")
            .descend(".item")
            .watch_rule(".open"),
    );
    let runtime = Runtime::new(Rc::clone(&doc));
    let (trigger, end) = one_shot();
    let recorder =
        Recorder::record(&pipeline.select_from(&runtime, LifetimeEvent::new(doc.root(), end)));
    assert_eq!(recorder.take(), ["open li#a", "open li#b"]);

    trigger.fire();
    assert_eq!(recorder.live(), 0);
    assert_eq!(recorder.take(), ["close li#a", "close li#b"]);
    assert_eq!(doc.observer_count(), 0);

    // Nothing derived from the ended seed reacts any more.
    doc.remove_class(&a, "open");
    doc.add_class(&a, "open");
    doc.append_child(&list, &element(&doc, "li", "c", "item open"));
    doc.flush();
    assert!(recorder.take().is_empty());
}

#[test]
fn removing_an_ancestor_closes_watch_openings() {
    let doc = Rc::new(TestDocument::new("body"));
    let list = element(&doc, "ul", "list", "list");
    let item = element(&doc, "li", "a", "item open");
    doc.append_child(&doc.root(), &list);
    doc.append_child(&list, &item);

    let recorder = record(
        &doc,
        &Selector::new()
            .descend(".list")
            .descend(".item")
            .watch_rule(".open"),
    );
    assert_eq!(recorder.take(), ["open li#a"]);

    doc.remove(&list);
    doc.flush();
    assert_eq!(recorder.take(), ["close li#a"]);
    assert_eq!(recorder.live(), 0);
}

#[test]
fn stopping_releases_every_observation() {
    let (doc, threads) = document(&["t1", "t2"]);
    doc.add_class(&threads[0], "open");
    let mut recorder = record(&doc, &Selector::new().descend(".thread").watch_rule(".open"));
    assert_eq!(recorder.take(), ["open div#t1"]);
    assert!(doc.observer_count() > 0);

    recorder.stop();
    assert_eq!(recorder.take(), ["close div#t1"]);
    assert_eq!(doc.observer_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Watch
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn watch_emits_on_rising_edges_only() {
    let (doc, threads) = document(&["t1"]);
    let recorder = record(
        &doc,
        &Selector::new().descend(".thread").watch(
            "flag",
            Some(vec!["data-v".to_string()]),
            |node: &TestNode| node.attribute("data-v").as_deref() == Some("t"),
        ),
    );

    let mut steps = Vec::new();
    for value in ["f", "f", "t", "t", "f", "t"] {
        doc.set_attribute(&threads[0], "data-v", value);
        doc.flush();
        steps.push(recorder.take());
    }
    assert_eq!(
        steps,
        vec![
            vec![],
            vec![],
            vec!["open div#t1"],
            vec![],
            vec!["close div#t1"],
            vec!["open div#t1"],
        ]
    );
    assert_eq!(recorder.live(), 1);
}

#[test]
fn three_toggles_alternate_strictly() {
    let (doc, threads) = document(&["t1"]);
    let recorder = record(
        &doc,
        &Selector::new().descend(".thread").watch(
            "open",
            Some(vec!["class".to_string()]),
            |node: &TestNode| node.has_class("open"),
        ),
    );

    let mut log = Vec::new();
    for _ in 0..3 {
        doc.add_class(&threads[0], "open");
        doc.flush();
        log.extend(recorder.take());
        doc.remove_class(&threads[0], "open");
        doc.flush();
        log.extend(recorder.take());
    }
    assert_eq!(
        log,
        [
            "open div#t1",
            "close div#t1",
            "open div#t1",
            "close div#t1",
            "open div#t1",
            "close div#t1"
        ]
    );
    assert_eq!(recorder.live(), 0);
}

#[test]
fn watch_treats_a_detached_node_as_not_matching() {
    let (doc, threads) = document(&["t1"]);
    let span = element(&doc, "span", "s1", "open");
    doc.append_child(&threads[0], &span);

    let recorder = record(
        &doc,
        &Selector::new()
            .descend(".thread")
            .map("first child", |node: &TestNode| node.children().first().cloned())
            .watch_rule(".open"),
    );
    assert_eq!(recorder.take(), ["open span#s1"]);

    doc.remove(&span);
    doc.flush();
    assert!(recorder.take().is_empty());

    doc.add_class(&span, "seen");
    doc.flush();
    assert_eq!(recorder.take(), ["close span#s1"]);
}

#[test]
fn watch_on_a_detached_root_waits_for_attachment() {
    let doc = Rc::new(TestDocument::new("body"));
    let loose = element(&doc, "div", "d1", "open");
    let runtime = Runtime::new(Rc::clone(&doc));
    let pipeline = compile(&Selector::new().watch_rule(".open"));
    let recorder = Recorder::record(&pipeline.select(&runtime, loose.clone()));
    assert!(recorder.take().is_empty());

    doc.add_class(&loose, "seen");
    doc.flush();
    assert!(recorder.take().is_empty());

    doc.append_child(&doc.root(), &loose);
    doc.remove_class(&loose, "seen");
    doc.flush();
    assert_eq!(recorder.take(), ["open div#d1"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn and_or_over_document_nodes() {
    let doc = TestDocument::new("body");
    let both = doc.create_element("DIV");
    doc.set_attribute(&both, "data-x", "");
    let tag_only = doc.create_element("div");
    let attr_only = doc.create_element("span");
    doc.set_attribute(&attr_only, "data-x", "1");
    let neither = doc.create_element("span");

    let and = CompiledRule::<TestNode>::compile("div[data-x]").unwrap();
    let or = CompiledRule::<TestNode>::compile("div, [data-x]").unwrap();

    let results: Vec<(bool, bool)> = [&both, &tag_only, &attr_only, &neither]
        .iter()
        .map(|node| (and.matches(node), or.matches(node)))
        .collect();
    assert_eq!(
        results,
        [(true, true), (false, true), (false, true), (false, false)]
    );
}

#[test]
fn minimal_attribute_set() {
    let rule = CompiledRule::<TestNode>::compile(".foo[data-y]").unwrap();
    assert_eq!(rule.relevant_attributes(), ["class", "data-y"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Map, Filter, Union
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn map_drop_leaves_the_input_end_with_the_caller() {
    let doc = Rc::new(TestDocument::new("body"));
    let pipeline = compile(&Selector::new().map("nothing", |_: &TestNode| None));
    let runtime = Runtime::new(Rc::clone(&doc));
    let (trigger, end) = one_shot();
    let seed = LifetimeEvent::new(doc.root(), end.clone());

    let recorder = Recorder::record(&pipeline.select_from(&runtime, seed));
    assert!(recorder.take().is_empty());
    assert!(recorder.is_ended());

    assert!(!end.is_fired());
    trigger.fire();
    assert!(end.is_fired());
}

#[test]
fn union_alternatives_are_independent() {
    let (doc, threads) = document(&["t1"]);
    doc.add_class(&threads[0], "open");
    doc.set_attribute(&threads[0], "data-unread", "");

    let recorder = record(
        &doc,
        &Selector::new().descend(".thread").union(vec![
            Selector::new().watch_rule(".open"),
            Selector::new().watch_rule("[data-unread]"),
        ]),
    );
    assert_eq!(recorder.take(), ["open div#t1", "open div#t1"]);
    assert_eq!(recorder.live(), 2);

    doc.remove_attribute(&threads[0], "data-unread");
    doc.flush();
    assert_eq!(recorder.take(), ["close div#t1"]);
    assert_eq!(recorder.live(), 1);
}

#[test]
fn one_pipeline_serves_many_roots() {
    let doc = Rc::new(TestDocument::new("body"));
    let left = element(&doc, "section", "left", "");
    let right = element(&doc, "section", "right", "");
    doc.append_child(&doc.root(), &left);
    doc.append_child(&doc.root(), &right);
    doc.append_child(&left, &element(&doc, "div", "l1", "thread"));
    doc.append_child(&right, &element(&doc, "div", "r1", "thread"));

    let pipeline = compile(&Selector::new().descend(".thread"));
    let runtime = Runtime::new(Rc::clone(&doc));
    let on_left = Recorder::record(&pipeline.select(&runtime, left.clone()));
    let on_right = Recorder::record(&pipeline.select(&runtime, right));
    assert_eq!(on_left.take(), ["open div#l1"]);
    assert_eq!(on_right.take(), ["open div#r1"]);

    doc.append_child(&left, &element(&doc, "div", "l2", "thread"));
    doc.flush();
    assert_eq!(on_left.take(), ["open div#l2"]);
    assert!(on_right.take().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn bad_selector_never_activates() {
    let (doc, _threads) = document(&["t1"]);
    let err = Pipeline::<TestDocument>::compile(
        &Selector::new().descend(".thread").union(vec![
            Selector::new().watch_rule(".open"),
            Selector::new().descend("a > b"),
        ]),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "step 1 (Union(2 alternatives)): step 0 (Descend(a > b)): unsupported combinator `>` in rule \"a > b\""
    );
    assert_eq!(doc.observer_count(), 0);
}

#[test]
fn failing_predicate_is_reported_once_and_siblings_continue() {
    let (doc, threads) = document(&["t1", "t2"]);
    let sink = RecordingSink::new();
    let runtime = Runtime::new(Rc::clone(&doc)).with_diagnostics(sink.clone());
    let pipeline = compile(&Selector::new().descend(".thread").try_watch(
        "picky",
        None,
        |node: &TestNode| {
            if node.attribute("id").as_deref() == Some("t1") {
                Err("t1 cannot be evaluated".into())
            } else {
                Ok(node.has_class("open"))
            }
        },
    ));
    let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));
    assert_eq!(sink.messages(), ["Watch(picky) failed: t1 cannot be evaluated"]);

    doc.add_class(&threads[0], "open");
    doc.add_class(&threads[1], "open");
    doc.flush();
    assert_eq!(recorder.take(), ["open div#t2"]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn failing_map_drops_only_that_event() {
    let (doc, _threads) = document(&["t1", "t2"]);
    let sink = RecordingSink::new();
    let runtime = Runtime::new(Rc::clone(&doc)).with_diagnostics(sink.clone());
    let pipeline = compile(&Selector::new().descend(".thread").try_map(
        "second only",
        |node: &TestNode| match node.attribute("id").as_deref() {
            Some("t2") => Ok(Some(node.clone())),
            _ => Err("not the second".into()),
        },
    ));
    let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));
    assert_eq!(recorder.take(), ["open div#t2"]);
    assert_eq!(sink.steps(), ["Map(second only)"]);
}

#[test]
fn host_observation_failure_ends_that_branch() {
    let (doc, threads) = document(&["t1", "t2"]);
    doc.fail_observations_on(&threads[0]);
    let sink = RecordingSink::new();
    let runtime = Runtime::new(Rc::clone(&doc)).with_diagnostics(sink.clone());
    let pipeline = compile(&Selector::new().descend(".thread").watch_rule(".open"));
    let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));

    doc.add_class(&threads[0], "open");
    doc.add_class(&threads[1], "open");
    doc.flush();
    assert_eq!(recorder.take(), ["open div#t2"]);
    assert_eq!(sink.steps(), ["Watch(.open)"]);
    assert!(sink.messages()[0].contains("observation refused for div#t1"));
}

#[test]
fn child_list_failure_ends_the_stream() {
    let doc = Rc::new(TestDocument::new("body"));
    doc.fail_observations_on(&doc.root());
    let sink = RecordingSink::new();
    let runtime = Runtime::new(Rc::clone(&doc)).with_diagnostics(sink.clone());
    let recorder =
        Recorder::record(&compile(&Selector::new().descend("div")).select(&runtime, doc.root()));
    assert!(recorder.is_ended());
    assert_eq!(sink.steps(), ["children of body"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config-driven selectors
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn registry_selector_runs_like_a_built_one() {
    let (doc, threads) = document(&["t1", "t2"]);
    doc.set_attribute(&threads[1], "hidden", "");
    doc.append_child(&threads[0], &element(&doc, "span", "s1", ""));

    let registry = register(RegistryBuilder::new()).build();
    let config = SelectorConfig::from_json(
        r#"[".thread", { "$filter": "visible" }, { "$map": "first-child" }, { "$log": "first" }]"#,
    )
    .unwrap();
    let pipeline = registry.load_pipeline::<TestDocument>(&config).unwrap();
    let runtime = Runtime::new(Rc::clone(&doc));
    let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));
    assert_eq!(recorder.take(), ["open span#s1"]);

    doc.remove(&threads[0]);
    doc.flush();
    assert_eq!(recorder.take(), ["close span#s1"]);
}
