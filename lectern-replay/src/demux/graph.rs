//! Graph protocol.
//!
//! Messages are walked predecessor → self → children. Deck and slide
//! messages scope their descendants; ink and sheet messages take their
//! target slide from that scope. Slide metadata (background, zoom,
//! association) is remembered so a later navigation can carry it.

use std::collections::HashMap;
use uuid::Uuid;

use lectern_core::{
    Argb, CanonicalEvent, Deck, DeckKind, ImageAnnotation, InkPayload, NavigationUpdate,
    QuickPoll, ScrollParams, SlideKey, TextAnnotation,
};

use super::{DemuxContext, Translate};
use crate::catalog::CatalogEntry;
use crate::wire::{DeckDisposition, DecodedMessage, GraphBody, GraphMessage};

/// Traversal scope handed from a message to its children.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    deck: Option<Uuid>,
    slide: Option<u32>,
}

impl Scope {
    fn slide_key(&self) -> Option<SlideKey> {
        match (self.deck, self.slide) {
            (Some(deck), Some(index)) => Some(SlideKey::indexed(deck, index)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct SlideInfo {
    background: Option<Argb>,
    zoom: f32,
    association: Option<SlideKey>,
}

#[derive(Default)]
pub struct GraphTranslator {
    dispositions: HashMap<Uuid, DeckDisposition>,
    slides: HashMap<SlideKey, SlideInfo>,
    last_nav: Option<NavigationUpdate>,
}

fn deck_kind(disposition: DeckDisposition) -> DeckKind {
    if disposition.contains(DeckDisposition::STUDENT_SUBMISSION) {
        DeckKind::StudentSubmission
    } else if disposition.contains(DeckDisposition::QUICK_POLL) {
        DeckKind::QuickPoll
    } else if disposition.contains(DeckDisposition::WHITEBOARD) {
        DeckKind::Whiteboard
    } else {
        DeckKind::Presentation
    }
}

fn unscoped(ctx: &mut DemuxContext, body: &GraphBody) {
    ctx.unscoped += 1;
    log::debug!("Graph message without enclosing slide: {body:?}");
}

impl GraphTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record deck dispositions and slide metadata; returns the scope
    /// for the body's children.
    fn remember(&mut self, scope: &Scope, body: &GraphBody) -> Scope {
        match body {
            GraphBody::Deck { guid, disposition, .. } => {
                self.dispositions.entry(*guid).or_insert(*disposition);
                Scope { deck: Some(*guid), slide: None }
            }
            GraphBody::Slide { index, background, zoom, association } => {
                let Some(deck) = scope.deck else { return *scope };
                self.slides.insert(
                    SlideKey::indexed(deck, *index),
                    SlideInfo {
                        background: background.map(Argb),
                        zoom: *zoom,
                        association: association.map(|a| SlideKey::indexed(a.deck, a.index)),
                    },
                );
                Scope { deck: Some(deck), slide: Some(*index) }
            }
            _ => *scope,
        }
    }

    fn visit(
        &mut self,
        scope: &Scope,
        body: &GraphBody,
        ctx: &mut DemuxContext,
        out: &mut Vec<CanonicalEvent>,
    ) -> Scope {
        match body {
            GraphBody::Group | GraphBody::Role(_) => {}
            GraphBody::Deck { guid, name, disposition, slide_count, titles } => {
                let inner = self.remember(scope, body);
                if disposition.is_presentation() {
                    let mut deck = Deck::new(*guid, name.clone());
                    if let Some(count) = slide_count {
                        deck = deck.with_slides(*count, titles.clone());
                    }
                    ctx.register_deck(deck);
                }
                return inner;
            }
            GraphBody::Slide { .. } => {
                if scope.deck.is_none() {
                    unscoped(ctx, body);
                }
                return self.remember(scope, body);
            }
            GraphBody::Navigate { deck, index, scroll } => {
                let slide = SlideKey::indexed(*deck, *index);
                let info = self.slides.get(&slide);
                let nav = NavigationUpdate {
                    deck_kind: deck_kind(self.dispositions.get(deck).copied().unwrap_or_default()),
                    background: info.and_then(|i| i.background),
                    slide_size: info.map_or(1.0, |i| i.zoom),
                    scroll: ScrollParams { position: scroll.0, extent: scroll.1 },
                    association: info.and_then(|i| i.association.clone()),
                    slide,
                };
                if self.last_nav.as_ref() != Some(&nav) {
                    self.last_nav = Some(nav.clone());
                    out.push(CanonicalEvent::NavigationUpdate(nav));
                }
            }
            GraphBody::DeckCleared => match scope.deck {
                Some(deck) => out.push(CanonicalEvent::EraseAllLayers { deck }),
                None => unscoped(ctx, body),
            },
            GraphBody::Poll { id, choices, votes } => {
                out.push(CanonicalEvent::QuickPollUpdate(QuickPoll {
                    poll_id: *id,
                    slide: scope.slide_key(),
                    choices: choices.clone(),
                    votes: votes.clone(),
                }));
            }
            slide_scoped => {
                let Some(slide) = scope.slide_key() else {
                    unscoped(ctx, body);
                    return *scope;
                };
                Self::slide_event(slide, slide_scoped, out);
            }
        }
        *scope
    }

    fn slide_event(slide: SlideKey, body: &GraphBody, out: &mut Vec<CanonicalEvent>) {
        match body {
            GraphBody::StrokeAdded { stroke, ink, color, translucent } => {
                out.push(CanonicalEvent::StrokeAdd {
                    stroke_id: *stroke,
                    slide,
                    ink: InkPayload { data: ink.clone(), color: Argb(*color), translucent: *translucent },
                });
            }
            GraphBody::StrokesDeleted { strokes } => {
                out.extend(strokes.iter().map(|id| CanonicalEvent::StrokeDelete {
                    stroke_id: *id,
                    slide: slide.clone(),
                }));
            }
            GraphBody::SlideCleared => out.push(CanonicalEvent::EraseLayer { slide }),
            GraphBody::TextSheet { id, text, x, y, size, color } => {
                out.push(CanonicalEvent::TextAnnotationAdd(TextAnnotation {
                    id: *id,
                    slide,
                    text: text.clone(),
                    origin: (*x, *y),
                    font_size: *size,
                    color: Argb(*color),
                }));
            }
            GraphBody::ImageSheet { id, image, x, y, width, height } => {
                out.push(CanonicalEvent::ImageAnnotationAdd(ImageAnnotation {
                    id: *id,
                    slide,
                    image: image.clone(),
                    origin: (*x, *y),
                    size: (*width, *height),
                }));
            }
            GraphBody::SheetRemoved { id, image: true } => {
                out.push(CanonicalEvent::ImageAnnotationDelete { id: *id, slide });
            }
            GraphBody::SheetRemoved { id, image: false } => {
                out.push(CanonicalEvent::TextAnnotationDelete { id: *id, slide });
            }
            GraphBody::Scroll { position, extent } => {
                out.push(CanonicalEvent::ScrollUpdate {
                    slide,
                    scroll: ScrollParams { position: *position, extent: *extent },
                });
            }
            _ => {}
        }
    }

    fn translate_graph(&mut self, msg: &GraphMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        msg.walk(Scope::default(), |scope, body| self.visit(scope, body, ctx, out));
    }
}

impl Translate for GraphTranslator {
    fn translate(&mut self, msg: &DecodedMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        if let DecodedMessage::Graph(m) = msg {
            self.translate_graph(m, ctx, out);
        }
    }

    fn prime(&mut self, entry: &CatalogEntry) -> bool {
        let CatalogEntry::Graph(msg) = entry else { return false };
        msg.walk(Scope::default(), |scope, body| self.remember(scope, body));
        true
    }
}
