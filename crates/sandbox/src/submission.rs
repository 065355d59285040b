//! Submission sources and the single document they are composed into.

use core::cell::RefCell;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink as _};
use html5ever::{LocalName, ParseOpts, QualName, parse_document};
use log::warn;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Attribute marking markup the sandbox injects; such scripts are hidden
/// from [`crate::SandboxHandle::script_sources`].
pub const INTERNAL_MARKER: &str = "data-assay";

/// Records uncaught errors so a failing initialization marks the handle degraded.
pub const ERROR_RECORDER: &str = concat!(
    "<script data-assay=\"recorder\">",
    "window.__assayErrors = [];",
    "window.addEventListener('error', function (event) {",
    " window.__assayErrors.push(String(event.message || event.type));",
    "});",
    "window.addEventListener('unhandledrejection', function (event) {",
    " window.__assayErrors.push('unhandled rejection: ' + String(event.reason));",
    "});",
    "</script>"
);

/// The learner's three source files. Never modified once scoring starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Submission {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    /// Same markup and script with a different stylesheet.
    #[must_use]
    pub fn with_css(&self, css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            ..self.clone()
        }
    }

    /// Same stylesheet and script with different markup.
    #[must_use]
    pub fn with_html(&self, html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..self.clone()
        }
    }
}

/// The submission's markup as parsed by html5ever, which always supplies
/// `<head>` and `<body>` even for a bare fragment.
struct ParsedMarkup {
    head: Option<Handle>,
    body: Option<Handle>,
}

fn child_element(parent: &Handle, local: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| matches!(&child.data, NodeData::Element { name, .. } if &*name.local == local))
        .map(Rc::clone)
}

impl ParsedMarkup {
    fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        let root = child_element(&dom.document, "html");
        Self {
            head: root.as_ref().and_then(|root| child_element(root, "head")),
            body: root.as_ref().and_then(|root| child_element(root, "body")),
        }
    }
}

fn serialize_node(node: &Handle, scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..SerializeOpts::default()
    };
    if let Err(err) = serialize(&mut bytes, &SerializableHandle::from(Rc::clone(node)), opts) {
        warn!("failed to serialize submission markup: {err}");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Appends `<script>` holding `source` to `body`, in the body's namespace.
fn append_script(body: &Handle, source: &str) {
    let NodeData::Element { name, .. } = &body.data else {
        return;
    };
    let script = Node::new(NodeData::Element {
        name: QualName::new(None, name.ns.clone(), LocalName::from("script")),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    });
    let text = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(format!("\n{source}\n"))),
    });
    text.parent.set(Some(Rc::downgrade(&script)));
    script.children.borrow_mut().push(text);
    script.parent.set(Some(Rc::downgrade(body)));
    body.children.borrow_mut().push(script);
}

/// Builds the document loaded into the sandbox.
///
/// The head holds [`ERROR_RECORDER`], then everything from the submission's
/// own head (title, meta, linked and inline styles), then the stylesheet
/// inlined. The body is the submission's body, attributes included, with the
/// script appended last.
pub fn compose_document(submission: &Submission) -> String {
    let css = submission.css.replace("</style", "<\\/style");
    let js = submission.js.replace("</script", "<\\/script");
    let markup = ParsedMarkup::parse(&submission.html);
    let head = markup
        .head
        .map(|head| serialize_node(&head, TraversalScope::ChildrenOnly(None)))
        .unwrap_or_default();
    let body = markup.body.map_or_else(
        || format!("<body>\n<script>\n{js}\n</script>\n</body>"),
        |body| {
            append_script(&body, &js);
            serialize_node(&body, TraversalScope::IncludeNode)
        },
    );
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{ERROR_RECORDER}\n{head}\n<style>\n{css}\n</style>\n</head>\n{body}\n</html>\n"
    )
}
