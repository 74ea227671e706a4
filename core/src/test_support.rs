use crate::Element;
use std::fmt;
use std::rc::Rc;

struct LeafData {
    tag: String,
    attributes: Vec<(String, String)>,
}

/// A detached node for unit tests: tag, attributes, identity.
#[derive(Clone)]
pub(crate) struct Leaf(Rc<LeafData>);

impl Leaf {
    pub(crate) fn new(tag: &str) -> Self {
        Self(Rc::new(LeafData {
            tag: tag.to_string(),
            attributes: Vec::new(),
        }))
    }

    pub(crate) fn with(self, name: &str, value: &str) -> Self {
        let mut attributes = self.0.attributes.clone();
        attributes.push((name.to_string(), value.to_string()));
        Self(Rc::new(LeafData {
            tag: self.0.tag.clone(),
            attributes,
        }))
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0.tag)
    }
}

impl Element for Leaf {
    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
