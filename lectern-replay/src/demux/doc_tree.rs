//! Document-tree protocol.
//!
//! Every slide-targeting object names an organization node, resolved
//! through the table built from `Document` objects. Misses synthesize a
//! whiteboard page so the segment keeps going.

use lectern_core::{
    AddressResolver, Argb, CanonicalEvent, Deck, DeckKind, ImageAnnotation, InkPayload,
    NavigationUpdate, QuickPoll, Resolution, ScrollParams, SlideKey, TextAnnotation,
};

use super::{DemuxContext, Translate};
use crate::catalog::CatalogEntry;
use crate::warning::ReplayWarning;
use crate::wire::doc_tree::PageKind;
use crate::wire::{DecodedMessage, DocTreeMessage};

#[derive(Default)]
pub struct DocTreeTranslator {
    resolver: AddressResolver,
}

impl DocTreeTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    fn resolve(&mut self, node: &str, ctx: &mut DemuxContext) -> SlideKey {
        match self.resolver.resolve(node) {
            Resolution::Known(key) => key,
            Resolution::Synthesized(key) => {
                ctx.warnings.push(ReplayWarning::SynthesizedPage { org_node: node.to_string() });
                key
            }
        }
    }

    fn translate_message(&mut self, msg: &DocTreeMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        match msg {
            DocTreeMessage::Participant { .. } => {}
            DocTreeMessage::Document { document, title, toc } => {
                for conflict in self.resolver.ingest_document(*document, toc) {
                    log::warn!(
                        "Organization node {} already bound to {}",
                        conflict.org_node,
                        conflict.kept
                    );
                    ctx.warnings.push(ReplayWarning::AddressConflict {
                        org_node: conflict.org_node,
                        kept: conflict.kept,
                        rejected: conflict.rejected,
                    });
                }
                let titles: Option<Vec<String>> = toc.iter().map(|e| e.title.clone()).collect();
                ctx.register_deck(Deck::new(*document, title.clone()).with_slides(toc.len() as u32, titles));
            }
            DocTreeMessage::Navigate { node, kind, background, zoom, scroll, overlay_of } => {
                let slide = self.resolve(node, ctx);
                let deck_kind = match kind {
                    PageKind::Document if slide.is_synthetic() => DeckKind::Whiteboard,
                    PageKind::Document => DeckKind::Presentation,
                    PageKind::Whiteboard => DeckKind::Whiteboard,
                    PageKind::Submission => DeckKind::StudentSubmission,
                    PageKind::Poll => DeckKind::QuickPoll,
                };
                let association = overlay_of.as_deref().map(|n| self.resolve(n, ctx));
                out.push(CanonicalEvent::NavigationUpdate(NavigationUpdate {
                    slide,
                    deck_kind,
                    background: background.map(Argb),
                    slide_size: *zoom,
                    scroll: ScrollParams { position: scroll.0, extent: scroll.1 },
                    association,
                }));
            }
            DocTreeMessage::InkAdded { node, stroke, ink, color, translucent } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::StrokeAdd {
                    stroke_id: *stroke,
                    slide,
                    ink: InkPayload { data: ink.clone(), color: Argb(*color), translucent: *translucent },
                });
            }
            DocTreeMessage::InkDeleted { node, stroke } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::StrokeDelete { stroke_id: *stroke, slide });
            }
            DocTreeMessage::ClearPage { node } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::EraseLayer { slide });
            }
            DocTreeMessage::ClearDocument { document } => {
                out.push(CanonicalEvent::EraseAllLayers { deck: *document });
            }
            DocTreeMessage::TextAdded { node, id, text, x, y, size, color } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::TextAnnotationAdd(TextAnnotation {
                    id: *id,
                    slide,
                    text: text.clone(),
                    origin: (*x, *y),
                    font_size: *size,
                    color: Argb(*color),
                }));
            }
            DocTreeMessage::TextDeleted { node, id } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::TextAnnotationDelete { id: *id, slide });
            }
            DocTreeMessage::ImageAdded { node, id, image, x, y, width, height } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::ImageAnnotationAdd(ImageAnnotation {
                    id: *id,
                    slide,
                    image: image.clone(),
                    origin: (*x, *y),
                    size: (*width, *height),
                }));
            }
            DocTreeMessage::ImageDeleted { node, id } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::ImageAnnotationDelete { id: *id, slide });
            }
            DocTreeMessage::Scroll { node, position, extent } => {
                let slide = self.resolve(node, ctx);
                out.push(CanonicalEvent::ScrollUpdate {
                    slide,
                    scroll: ScrollParams { position: *position, extent: *extent },
                });
            }
            DocTreeMessage::Poll { node, id, choices, votes } => {
                let slide = node.as_deref().map(|n| self.resolve(n, ctx));
                out.push(CanonicalEvent::QuickPollUpdate(QuickPoll {
                    poll_id: *id,
                    slide,
                    choices: choices.clone(),
                    votes: votes.clone(),
                }));
            }
        }
    }
}

impl Translate for DocTreeTranslator {
    fn translate(&mut self, msg: &DecodedMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        if let DecodedMessage::DocumentTree(m) = msg {
            self.translate_message(m, ctx, out);
        }
    }

    fn prime(&mut self, entry: &CatalogEntry) -> bool {
        match entry {
            CatalogEntry::Document { document, toc } => {
                let conflicts = self.resolver.ingest_document(*document, toc);
                log::debug!("Primed document {document}: {} nodes, {} conflicts", toc.len(), conflicts.len());
                true
            }
            CatalogEntry::NodeReference(node) => {
                self.resolver.resolve(node);
                true
            }
            CatalogEntry::Graph(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::TocEntry;
    use uuid::Uuid;

    fn document(doc: Uuid, pages: usize) -> DocTreeMessage {
        DocTreeMessage::Document {
            document: doc,
            title: "Lecture".into(),
            toc: (0..pages)
                .map(|i| TocEntry {
                    org_node: format!("node-{i}"),
                    resource: format!("page-{i}"),
                    title: Some(format!("Slide {i}")),
                })
                .collect(),
        }
    }

    fn run(t: &mut DocTreeTranslator, ctx: &mut DemuxContext, msg: DocTreeMessage) -> Vec<CanonicalEvent> {
        let mut out = Vec::new();
        t.translate(&DecodedMessage::DocumentTree(msg), ctx, &mut out);
        out
    }

    #[test]
    fn test_primed_document_resolves_silently() {
        let doc = Uuid::new_v4();
        let mut t = DocTreeTranslator::new();
        let mut ctx = DemuxContext::default();
        let DocTreeMessage::Document { toc, .. } = document(doc, 2) else { unreachable!() };
        assert!(t.prime(&CatalogEntry::Document { document: doc, toc }));
        assert!(t.prime(&CatalogEntry::NodeReference("wb-1".into())));

        let events = run(&mut t, &mut ctx, DocTreeMessage::navigate("node-1"));
        assert_eq!(events[0].slide(), Some(&SlideKey::page(doc, "page-1")));
        let wb = run(&mut t, &mut ctx, DocTreeMessage::navigate("wb-1"));
        assert!(wb[0].slide().unwrap().is_synthetic());
        // Priming neither warns nor registers decks.
        assert!(ctx.warnings.is_empty());
        assert!(ctx.decks.is_empty());
    }

    #[test]
    fn test_navigation_resolves_through_table() {
        let doc = Uuid::new_v4();
        let mut t = DocTreeTranslator::new();
        let mut ctx = DemuxContext::default();
        assert!(run(&mut t, &mut ctx, document(doc, 3)).is_empty());

        let events = run(&mut t, &mut ctx, DocTreeMessage::navigate("node-1"));
        assert_eq!(events[0].slide(), Some(&SlideKey::page(doc, "page-1")));
        assert!(ctx.warnings.is_empty());

        let deck = ctx.decks.get(&doc).unwrap();
        assert_eq!(deck.slide_count, Some(3));
        assert_eq!(deck.slide_titles.as_ref().unwrap()[2], "Slide 2");
    }

    #[test]
    fn test_unknown_node_becomes_whiteboard() {
        let mut t = DocTreeTranslator::new();
        let mut ctx = DemuxContext::default();
        let events = run(&mut t, &mut ctx, DocTreeMessage::navigate("wb-1"));
        match events.as_slice() {
            [CanonicalEvent::NavigationUpdate(nav)] => {
                assert!(nav.slide.is_synthetic());
                assert_eq!(nav.deck_kind, DeckKind::Whiteboard);
            }
            other => panic!("expected navigation, got {other:?}"),
        }
        assert_eq!(ctx.warnings, vec![ReplayWarning::SynthesizedPage { org_node: "wb-1".into() }]);

        // Ink on the same node resolves to the same synthetic page silently.
        let ink = run(
            &mut t,
            &mut ctx,
            DocTreeMessage::InkAdded {
                node: "wb-1".into(),
                stroke: Uuid::new_v4(),
                ink: vec![],
                color: 0,
                translucent: false,
            },
        );
        assert_eq!(ink[0].slide(), events[0].slide());
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_late_document_conflict_keeps_synthetic() {
        let doc = Uuid::new_v4();
        let mut t = DocTreeTranslator::new();
        let mut ctx = DemuxContext::default();
        run(&mut t, &mut ctx, DocTreeMessage::navigate("node-0"));
        run(&mut t, &mut ctx, document(doc, 1));
        assert!(matches!(ctx.warnings.last(), Some(ReplayWarning::AddressConflict { .. })));
        assert!(t.resolver().lookup("node-0").unwrap().is_synthetic());
    }

    #[test]
    fn test_overlay_association_resolved() {
        let doc = Uuid::new_v4();
        let mut t = DocTreeTranslator::new();
        let mut ctx = DemuxContext::default();
        run(&mut t, &mut ctx, document(doc, 2));
        let events = run(
            &mut t,
            &mut ctx,
            DocTreeMessage::Navigate {
                node: "sub-1".into(),
                kind: PageKind::Submission,
                background: None,
                zoom: 1.0,
                scroll: (0.0, 1.0),
                overlay_of: Some("node-1".into()),
            },
        );
        match events.as_slice() {
            [CanonicalEvent::NavigationUpdate(nav)] => {
                assert_eq!(nav.deck_kind, DeckKind::StudentSubmission);
                assert_eq!(nav.association, Some(SlideKey::page(doc, "page-1")));
            }
            other => panic!("expected navigation, got {other:?}"),
        }
    }
}
