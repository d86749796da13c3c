//! Graph protocol objects.
//!
//! Each message may carry a predecessor (history that must be applied
//! first) and children (detail scoped to this message). A deck message's
//! children describe that deck's slides; a slide message's children
//! describe that slide's sheets.
//!
//! ```text
//!        predecessor ◄── message ──► children
//!   visit order:  1         2          3..n
//! ```
//!
//! Messages are stored as a flat node list and traversed with an explicit
//! stack, so long predecessor chains cannot exhaust the stack.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ParticipantRole, WireFormat, WireObject};

bitflags! {
    /// Deck disposition flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeckDisposition: u32 {
        const REMOTE = 1;
        const WHITEBOARD = 1 << 1;
        const STUDENT_SUBMISSION = 1 << 2;
        const QUICK_POLL = 1 << 3;
    }
}

impl Default for DeckDisposition {
    fn default() -> Self {
        Self::empty()
    }
}

impl DeckDisposition {
    /// A real slide deck, as opposed to a whiteboard/submission/poll deck.
    pub fn is_presentation(self) -> bool {
        !self.intersects(
            DeckDisposition::WHITEBOARD
                | DeckDisposition::STUDENT_SUBMISSION
                | DeckDisposition::QUICK_POLL,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSlideRef {
    pub deck: Uuid,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphBody {
    /// Pure container; carries only children.
    Group,
    Role(ParticipantRole),
    Deck {
        guid: Uuid,
        name: String,
        disposition: DeckDisposition,
        slide_count: Option<u32>,
        titles: Option<Vec<String>>,
    },
    /// Scopes children to slide `index` of the enclosing deck.
    Slide { index: u32, background: Option<u32>, zoom: f32, association: Option<GraphSlideRef> },
    /// Instructor traversal to an explicit slide.
    Navigate { deck: Uuid, index: u32, scroll: (f64, f64) },
    StrokeAdded { stroke: Uuid, ink: Vec<u8>, color: u32, translucent: bool },
    StrokesDeleted { strokes: Vec<Uuid> },
    SlideCleared,
    DeckCleared,
    TextSheet { id: Uuid, text: String, x: f32, y: f32, size: f32, color: u32 },
    ImageSheet { id: Uuid, image: Vec<u8>, x: f32, y: f32, width: f32, height: f32 },
    SheetRemoved { id: Uuid, image: bool },
    Scroll { position: f64, extent: f64 },
    Poll { id: Uuid, choices: Vec<String>, votes: Vec<u32> },
}

/// One message of a graph. Links index into the owning [`GraphMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub body: GraphBody,
    pub predecessor: Option<u32>,
    pub children: Vec<u32>,
}

impl GraphNode {
    fn links(&self) -> impl Iterator<Item = u32> + '_ {
        self.predecessor.into_iter().chain(self.children.iter().copied())
    }
}

/// A message with its predecessor and children, stored flat.
///
/// Node 0 is the root. Every link points to a later node and no node has
/// two parents, so decoding, walking, cloning and dropping never recurse
/// however deep the recorded chain is. Decoding rejects node lists that
/// break either rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GraphNode>", into = "Vec<GraphNode>")]
pub struct GraphMessage {
    nodes: Vec<GraphNode>,
}

impl TryFrom<Vec<GraphNode>> for GraphMessage {
    type Error = String;

    fn try_from(nodes: Vec<GraphNode>) -> Result<Self, String> {
        if nodes.is_empty() {
            return Err("graph message without a root".into());
        }
        let mut linked = vec![false; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for link in node.links() {
                let target = link as usize;
                if target <= i || target >= nodes.len() {
                    return Err(format!("node {i} links to node {link} of {}", nodes.len()));
                }
                if std::mem::replace(&mut linked[target], true) {
                    return Err(format!("node {link} has more than one parent"));
                }
            }
        }
        Ok(Self { nodes })
    }
}

impl From<GraphMessage> for Vec<GraphNode> {
    fn from(msg: GraphMessage) -> Self {
        msg.nodes
    }
}

impl GraphMessage {
    pub fn new(body: GraphBody) -> Self {
        Self { nodes: vec![GraphNode { body, predecessor: None, children: Vec::new() }] }
    }

    pub fn with_child(mut self, child: GraphMessage) -> Self {
        let at = self.append(child);
        self.nodes[0].children.push(at);
        self
    }

    /// Set the root's predecessor. A replaced predecessor stays stored
    /// but is no longer visited.
    pub fn with_predecessor(mut self, predecessor: GraphMessage) -> Self {
        let at = self.append(predecessor);
        self.nodes[0].predecessor = Some(at);
        self
    }

    /// Move `other`'s nodes to the end, returning its root's index.
    fn append(&mut self, other: GraphMessage) -> u32 {
        let base = self.nodes.len() as u32;
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            node.predecessor = node.predecessor.map(|p| p + base);
            for child in &mut node.children {
                *child += base;
            }
            node
        }));
        base
    }

    pub fn body(&self) -> &GraphBody {
        &self.nodes[0].body
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Whether any stored body matches.
    pub fn any(&self, mut pred: impl FnMut(&GraphBody) -> bool) -> bool {
        self.nodes.iter().any(|node| pred(&node.body))
    }

    /// Visit every body in causal order: predecessor chain, self, children.
    ///
    /// `visit` receives the context inherited from the enclosing message
    /// and returns the context handed to this message's children. A
    /// predecessor inherits the same context as its successor.
    pub fn walk<C, F>(&self, root: C, mut visit: F)
    where
        C: Clone,
        F: FnMut(&C, &GraphBody) -> C,
    {
        enum Step<C> {
            Expand(u32, C),
            Emit(u32, C),
        }

        let mut stack = vec![Step::Expand(0, root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Expand(at, ctx) => {
                    let Some(node) = self.nodes.get(at as usize) else { continue };
                    match node.predecessor {
                        Some(pred) => {
                            stack.push(Step::Emit(at, ctx.clone()));
                            stack.push(Step::Expand(pred, ctx));
                        }
                        None => stack.push(Step::Emit(at, ctx)),
                    }
                }
                Step::Emit(at, ctx) => {
                    let Some(node) = self.nodes.get(at as usize) else { continue };
                    let child_ctx = visit(&ctx, &node.body);
                    for &child in node.children.iter().rev() {
                        stack.push(Step::Expand(child, child_ctx.clone()));
                    }
                }
            }
        }
    }

    pub fn announced_role(&self) -> Option<ParticipantRole> {
        let mut role = None;
        self.walk((), |_, body| {
            if let (None, GraphBody::Role(r)) = (role, body) {
                role = Some(*r);
            }
        });
        role
    }
}

impl WireObject for GraphMessage {
    const FORMAT: WireFormat = WireFormat::GraphProtocol;

    fn type_name(&self) -> &'static str {
        match self.body() {
            GraphBody::Group => "GroupMessage",
            GraphBody::Role(_) => "RoleMessage",
            GraphBody::Deck { .. } => "DeckInformationMessage",
            GraphBody::Slide { .. } => "SlideInformationMessage",
            GraphBody::Navigate { .. } => "InstructorCurrentDeckTraversalChangedMessage",
            GraphBody::StrokeAdded { .. } => "InkSheetStrokesAddedMessage",
            GraphBody::StrokesDeleted { .. } => "InkSheetStrokesDeletingMessage",
            GraphBody::SlideCleared => "SheetsClearedMessage",
            GraphBody::DeckCleared => "DeckSheetsClearedMessage",
            GraphBody::TextSheet { .. } => "TextSheetMessage",
            GraphBody::ImageSheet { .. } => "ImageSheetMessage",
            GraphBody::SheetRemoved { .. } => "SheetRemovedMessage",
            GraphBody::Scroll { .. } => "ScrollPositionMessage",
            GraphBody::Poll { .. } => "QuickPollResultMessage",
        }
    }
}
