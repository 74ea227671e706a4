//! sift-test: reference host for exercising sift pipelines
//!
//! Provides an in-memory [`TestDocument`] that implements [`Host`](sift::Host)
//! with batched mutation delivery, a [`Recorder`] that logs open/close
//! transitions, a [`RecordingSink`] for branch failures, and a set of named
//! built-in functions for config-driven selectors.
//!
//! # Example
//!
//! ```
//! use sift_test::prelude::*;
//! use std::rc::Rc;
//!
//! let doc = Rc::new(TestDocument::new("body"));
//! let thread = doc.create_element("div");
//! doc.set_attribute(&thread, "id", "t1");
//! doc.add_class(&thread, "thread");
//! doc.append_child(&doc.root(), &thread);
//!
//! let pipeline = Pipeline::<TestDocument>::compile(
//!     &Selector::new().descend(".thread").watch_rule(".open"),
//! )
//! .unwrap();
//! let runtime = Runtime::new(Rc::clone(&doc));
//! let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));
//! assert!(recorder.take().is_empty());
//!
//! doc.add_class(&thread, "open");
//! doc.flush();
//! assert_eq!(recorder.take(), ["open div#t1"]);
//! ```

use sift::{Element, RegistryBuilder};

mod recorder;


pub use document::{TestDocument, TestNode};
pub use recorder::{Recorder, RecordingSink};

/// Register the built-in functions used by fixtures and the CLI.
///
/// | Name | Kind | Behaviour |
/// |------|------|-----------|
/// | `visible` | predicate | no `hidden` attribute |
/// | `open` | predicate | has class `open` |
/// | `broken` | predicate | always fails |
/// | `parent` | transform | the parent node, if any |
/// | `first-child` | transform | the first child, if any |
/// | `broken` | transform | always fails |
#[must_use]
pub fn register(builder: RegistryBuilder<TestNode>) -> RegistryBuilder<TestNode> {
    builder
        .predicate("visible", |node: &TestNode| !node.has_attribute("hidden"))
        .predicate("open", |node: &TestNode| node.has_class("open"))
        .try_predicate("broken", |node: &TestNode| {
            Err(format!("cannot evaluate {}", node.label()).into())
        })
        .transform("parent", TestNode::parent)
        .transform("first-child", |node: &TestNode| node.children().first().cloned())
        .try_transform("broken", |node: &TestNode| {
            Err(format!("cannot transform {}", node.label()).into())
        })
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{register, Recorder, RecordingSink, TestDocument, TestNode};
    pub use sift::prelude::*;
}
