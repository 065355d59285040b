//! A tiny scriptable DOM for tests.
//!
//! Selectors support type, `#id`, `.class` and `*` compounds, the descendant
//! combinator and comma-separated lists. Behaviour is attached as Rust hooks
//! keyed by selector instead of JavaScript.

use crate::handle::ElementInfo;
use std::collections::HashMap;
use std::rc::Rc;

/// Mutation run when an event reaches a matching element.
pub type Hook = Rc<dyn Fn(&mut MemoryDocument)>;
/// Stand-in for a JavaScript custom test, keyed by its source text.
pub type Predicate = Rc<dyn Fn(&MemoryDocument) -> Result<bool, String>>;

/// Index of an element in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    id: String,
    classes: Vec<String>,
    text: String,
    value: Option<String>,
    inline_handlers: Vec<String>,
    property_handlers: Vec<String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Self {
        let mut compound = Self::default();
        let mut rest = text;
        let head_end = rest.find(['#', '.']).unwrap_or(rest.len());
        let head = &rest[..head_end];
        if !head.is_empty() && head != "*" {
            compound.tag = Some(head.to_ascii_lowercase());
        }
        rest = &rest[head_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = body[..end].to_owned();
            if marker == '#' {
                compound.id = Some(name);
            } else {
                compound.classes.push(name);
            }
            rest = &body[end..];
        }
        compound
    }

    fn matches(&self, element: &Element) -> bool {
        self.tag.as_ref().is_none_or(|tag| *tag == element.tag)
            && self.id.as_ref().is_none_or(|id| *id == element.id)
            && self.classes.iter().all(|class| element.classes.contains(class))
    }
}

/// In-memory document: a `body` root plus whatever tests append to it.
#[derive(Clone)]
pub struct MemoryDocument {
    elements: Vec<Element>,
    scripts: Vec<String>,
    degradation: Option<String>,
    click_hooks: Vec<(String, Hook)>,
    key_hooks: Vec<(String, Hook)>,
    predicates: HashMap<String, Predicate>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            elements: vec![Element {
                tag: "body".to_owned(),
                ..Element::default()
            }],
            scripts: Vec::new(),
            degradation: None,
            click_hooks: Vec::new(),
            key_hooks: Vec::new(),
            predicates: HashMap::new(),
        }
    }

    pub const fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Appends an element described as `tag#id.class.class` under `parent`.
    pub fn append(&mut self, parent: ElementId, descriptor: &str, text: &str) -> ElementId {
        let compound = Compound::parse(descriptor);
        let tag = compound.tag.unwrap_or_else(|| "div".to_owned());
        let value = matches!(tag.as_str(), "input" | "textarea" | "select").then(String::new);
        let index = self.elements.len();
        self.elements.push(Element {
            tag,
            id: compound.id.unwrap_or_default(),
            classes: compound.classes,
            text: text.to_owned(),
            value,
            parent: Some(parent.0),
            ..Element::default()
        });
        self.elements[parent.0].children.push(index);
        ElementId(index)
    }

    /// Detaches `id` and its subtree from the tree.
    pub fn remove(&mut self, id: ElementId) {
        if let Some(parent) = self.elements[id.0].parent.take() {
            self.elements[parent].children.retain(|child| *child != id.0);
        }
    }

    pub fn set_text(&mut self, id: ElementId, text: &str) {
        text.clone_into(&mut self.elements[id.0].text);
    }

    pub fn value(&self, id: ElementId) -> Option<&str> {
        self.elements[id.0].value.as_deref()
    }

    pub fn set_value(&mut self, id: ElementId, value: &str) {
        self.elements[id.0].value = Some(value.to_owned());
    }

    /// Marks an `on<event>` attribute as present in the markup.
    pub fn add_inline_handler(&mut self, id: ElementId, event: &str) {
        self.elements[id.0].inline_handlers.push(format!("on{event}"));
    }

    /// Marks an `on<event>` property as holding a function.
    pub fn add_property_handler(&mut self, id: ElementId, event: &str) {
        self.elements[id.0].property_handlers.push(format!("on{event}"));
    }

    pub fn add_script(&mut self, source: &str) {
        self.scripts.push(source.to_owned());
    }

    /// Marks the document as having failed initialization.
    pub fn degrade(&mut self, reason: &str) {
        self.degradation = Some(reason.to_owned());
    }

    pub fn degradation(&self) -> Option<&str> {
        self.degradation.as_deref()
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn on_click(&mut self, selector: &str, hook: impl Fn(&mut Self) + 'static) {
        self.click_hooks.push((selector.to_owned(), Rc::new(hook)));
    }

    /// Runs on `keydown` for a matching element, with no key filter.
    pub fn on_key(&mut self, selector: &str, hook: impl Fn(&mut Self) + 'static) {
        self.key_hooks.push((selector.to_owned(), Rc::new(hook)));
    }

    /// Registers the outcome of a custom test whose source is `source`.
    pub fn on_predicate(&mut self, source: &str, predicate: impl Fn(&Self) -> Result<bool, String> + 'static) {
        self.predicates.insert(source.to_owned(), Rc::new(predicate));
    }

    pub(crate) fn predicate(&self, source: &str) -> Option<Predicate> {
        self.predicates.get(source).cloned()
    }

    fn is_attached(&self, index: usize) -> bool {
        let mut current = index;
        while let Some(parent) = self.elements[current].parent {
            current = parent;
        }
        current == 0
    }

    fn descendants(&self, index: usize, out: &mut Vec<usize>) {
        for &child in &self.elements[index].children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn matches_chain(&self, index: usize, chain: &[Compound]) -> bool {
        let Some((last, ancestors)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&self.elements[index]) {
            return false;
        }
        let mut remaining = ancestors;
        let mut current = self.elements[index].parent;
        while let Some((next, rest)) = remaining.split_last() {
            let Some(ancestor) = current else {
                return false;
            };
            if next.matches(&self.elements[ancestor]) {
                remaining = rest;
            }
            current = self.elements[ancestor].parent;
        }
        true
    }

    fn select_within(&self, scope: usize, selector: &str) -> Vec<ElementId> {
        let chains: Vec<Vec<Compound>> = selector
            .split(',')
            .map(|part| part.split_whitespace().map(Compound::parse).collect::<Vec<_>>())
            .filter(|chain| !chain.is_empty())
            .collect();
        let mut candidates = Vec::new();
        self.descendants(scope, &mut candidates);
        candidates
            .into_iter()
            .filter(|index| chains.iter().any(|chain| self.matches_chain(*index, chain)))
            .map(ElementId)
            .collect()
    }

    /// Every attached element matching `selector`, in document order.
    pub fn find_all(&self, selector: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        let root_matches = selector.split(',').any(|part| {
            let mut compounds = part.split_whitespace();
            matches!(
                (compounds.next(), compounds.next()),
                (Some(only), None) if Compound::parse(only).matches(&self.elements[0])
            )
        });
        if root_matches {
            found.push(self.root());
        }
        found.extend(self.select_within(0, selector));
        found
    }

    pub fn find(&self, selector: &str) -> Option<ElementId> {
        self.find_all(selector).into_iter().next()
    }

    /// Matches of `item_selector` inside `container`.
    pub fn count_within(&self, container: ElementId, item_selector: &str) -> usize {
        if !self.is_attached(container.0) {
            return 0;
        }
        self.select_within(container.0, item_selector).len()
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut text = self.elements[id.0].text.clone();
        for &child in &self.elements[id.0].children {
            text.push_str(&self.text_content(ElementId(child)));
        }
        text
    }

    pub fn info(&self, id: ElementId) -> ElementInfo {
        let element = &self.elements[id.0];
        ElementInfo {
            tag: element.tag.clone(),
            id: element.id.clone(),
            class_name: element.classes.join(" "),
            text_content: self.text_content(id),
            value: element.value.clone(),
            inline_handlers: element.inline_handlers.clone(),
            property_handlers: element.property_handlers.clone(),
        }
    }

    fn hooks_for(&self, hooks: &[(String, Hook)], target: ElementId) -> Vec<Hook> {
        hooks
            .iter()
            .filter(|(selector, _)| self.find_all(selector).contains(&target))
            .map(|(_, hook)| Rc::clone(hook))
            .collect()
    }

    /// Runs every click hook whose selector matches `target`.
    pub fn dispatch_click(&mut self, target: ElementId) {
        for hook in self.hooks_for(&self.click_hooks, target) {
            hook(self);
        }
    }

    /// Runs every key hook whose selector matches `target`.
    pub fn dispatch_key(&mut self, target: ElementId) {
        for hook in self.hooks_for(&self.key_hooks, target) {
            hook(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> (MemoryDocument, ElementId) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let main = doc.append(root, "main.app", "");
        let list = doc.append(main, "ul#todo-list", "");
        doc.append(list, "li.item", "milk");
        doc.append(list, "li.item.done", "eggs");
        doc.append(root, "p.item", "outside");
        (doc, list)
    }

    #[test]
    fn compound_and_descendant_selectors() {
        let (doc, list) = list();
        assert_eq!(doc.find("#todo-list"), Some(list));
        assert_eq!(doc.find_all("li.item").len(), 2);
        assert_eq!(doc.find_all(".app li").len(), 2);
        assert_eq!(doc.find_all(".item").len(), 3);
        assert_eq!(doc.find_all("li.done, p").len(), 2);
        assert!(doc.find("section li").is_none());
        assert_eq!(doc.find("body"), Some(doc.root()));
    }

    #[test]
    fn removed_elements_stop_matching() {
        let (mut doc, list) = list();
        let first = doc.find("li");
        assert!(first.is_some());
        if let Some(first) = first {
            doc.remove(first);
        }
        assert_eq!(doc.count_within(list, "li"), 1);
        assert_eq!(doc.text_content(list), "eggs");
    }

    #[test]
    fn click_hooks_mutate_the_document() {
        let (mut doc, list) = list();
        doc.append(doc.root(), "button#clear", "Clear");
        doc.on_click("#clear", |document| {
            for item in document.find_all("#todo-list li") {
                document.remove(item);
            }
        });
        if let Some(button) = doc.find("#clear") {
            doc.dispatch_click(button);
        }
        assert_eq!(doc.count_within(list, "li"), 0);
    }
}
