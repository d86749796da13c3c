//! Index-addressed protocols (IndexNav and IndexCapability).
//!
//! Both formats carry `(deck, slide)` pairs directly, so translation is
//! 1:1 except for two stateful cases:
//! - heartbeats emit only when the page differs from the last emitted one;
//! - a background message for a page other than the current one is held
//!   until that page is navigated to.

use std::collections::HashMap;

use lectern_core::{
    Argb, CanonicalEvent, Deck, DeckKind, ImageAnnotation, InkPayload, NavigationUpdate,
    QuickPoll, ScrollParams, SlideKey, TextAnnotation,
};

use super::{DemuxContext, Translate};
use crate::wire::capability::{deck_type, AnnotationOp};
use crate::wire::index_nav::DeckType;
use crate::wire::{CapabilityBody, DecodedMessage, IndexNavMessage, NavPayload, SlideAddress, SlideRef};

pub struct IndexTranslator {
    filter_heartbeats: bool,
    last_nav: Option<NavigationUpdate>,
    pending_background: HashMap<SlideKey, Argb>,
}

fn key(slide: &SlideRef) -> SlideKey {
    SlideKey::indexed(slide.deck, slide.index)
}

fn address_key(address: &SlideAddress) -> SlideKey {
    SlideKey::indexed(address.deck, address.slide)
}

fn nav_from_payload(p: &NavPayload) -> NavigationUpdate {
    NavigationUpdate {
        slide: key(&p.slide),
        deck_kind: match p.deck_type {
            DeckType::Slides => DeckKind::Presentation,
            DeckType::Whiteboard => DeckKind::Whiteboard,
            DeckType::Submission => DeckKind::StudentSubmission,
            DeckType::Poll => DeckKind::QuickPoll,
        },
        background: p.background.map(Argb),
        slide_size: p.zoom,
        scroll: ScrollParams { position: p.scroll_position, extent: p.scroll_extent },
        association: p.association.as_ref().map(key),
    }
}

fn capability_deck_kind(code: u8) -> DeckKind {
    match code {
        deck_type::WHITEBOARD => DeckKind::Whiteboard,
        deck_type::SUBMISSION => DeckKind::StudentSubmission,
        deck_type::POLL => DeckKind::QuickPoll,
        _ => DeckKind::Presentation,
    }
}

impl IndexTranslator {
    pub fn new(filter_heartbeats: bool) -> Self {
        Self { filter_heartbeats, last_nav: None, pending_background: HashMap::new() }
    }

    fn navigate(&mut self, mut nav: NavigationUpdate, heartbeat: bool, out: &mut Vec<CanonicalEvent>) {
        if let Some(bg) = self.pending_background.remove(&nav.slide) {
            nav.background.get_or_insert(bg);
        }
        if heartbeat && self.filter_heartbeats {
            if let Some(last) = &self.last_nav {
                if last.slide == nav.slide {
                    return;
                }
            }
        }
        self.last_nav = Some(nav.clone());
        out.push(CanonicalEvent::NavigationUpdate(nav));
    }

    fn background(&mut self, slide: SlideKey, color: Argb, out: &mut Vec<CanonicalEvent>) {
        match &self.last_nav {
            Some(last) if last.slide == slide => {
                if last.background == Some(color) {
                    return;
                }
                let nav = NavigationUpdate { background: Some(color), ..last.clone() };
                self.last_nav = Some(nav.clone());
                out.push(CanonicalEvent::NavigationUpdate(nav));
            }
            _ => {
                self.pending_background.insert(slide, color);
            }
        }
    }

    fn translate_nav(&mut self, msg: &IndexNavMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        match msg.unwrap_envelopes() {
            IndexNavMessage::Role(_) | IndexNavMessage::Wrapped { .. } => {}
            IndexNavMessage::DeckInfo { deck, name, slide_count, titles } => {
                let titles = (!titles.is_empty()).then(|| titles.clone());
                ctx.register_deck(Deck::new(*deck, name.clone()).with_slides(*slide_count, titles));
            }
            IndexNavMessage::Navigate(p) => self.navigate(nav_from_payload(p), false, out),
            IndexNavMessage::PageUpdate(p) => self.navigate(nav_from_payload(p), true, out),
            IndexNavMessage::Scroll { slide, position, extent } => {
                out.push(CanonicalEvent::ScrollUpdate {
                    slide: key(slide),
                    scroll: ScrollParams { position: *position, extent: *extent },
                });
            }
            IndexNavMessage::InkAdded { slide, stroke, ink, color, highlighter } => {
                out.push(CanonicalEvent::StrokeAdd {
                    stroke_id: *stroke,
                    slide: key(slide),
                    ink: InkPayload { data: ink.clone(), color: Argb(*color), translucent: *highlighter },
                });
            }
            IndexNavMessage::InkDeleted { slide, stroke } => {
                out.push(CanonicalEvent::StrokeDelete { stroke_id: *stroke, slide: key(slide) });
            }
            IndexNavMessage::EraseSlide { slide } => {
                out.push(CanonicalEvent::EraseLayer { slide: key(slide) });
            }
            IndexNavMessage::EraseDeck { deck } => {
                out.push(CanonicalEvent::EraseAllLayers { deck: *deck });
            }
            IndexNavMessage::Background { slide, argb } => self.background(key(slide), Argb(*argb), out),
            IndexNavMessage::TextAdded { slide, id, text, x, y, size, color } => {
                out.push(CanonicalEvent::TextAnnotationAdd(TextAnnotation {
                    id: *id,
                    slide: key(slide),
                    text: text.clone(),
                    origin: (*x, *y),
                    font_size: *size,
                    color: Argb(*color),
                }));
            }
            IndexNavMessage::TextDeleted { slide, id } => {
                out.push(CanonicalEvent::TextAnnotationDelete { id: *id, slide: key(slide) });
            }
            IndexNavMessage::ImageAdded { slide, id, image, x, y, width, height } => {
                out.push(CanonicalEvent::ImageAnnotationAdd(ImageAnnotation {
                    id: *id,
                    slide: key(slide),
                    image: image.clone(),
                    origin: (*x, *y),
                    size: (*width, *height),
                }));
            }
            IndexNavMessage::ImageDeleted { slide, id } => {
                out.push(CanonicalEvent::ImageAnnotationDelete { id: *id, slide: key(slide) });
            }
            IndexNavMessage::Poll { slide, id, choices, votes } => {
                out.push(CanonicalEvent::QuickPollUpdate(QuickPoll {
                    poll_id: *id,
                    slide: slide.as_ref().map(key),
                    choices: choices.clone(),
                    votes: votes.clone(),
                }));
            }
        }
    }

    fn translate_capability(&mut self, body: &CapabilityBody, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        match body {
            CapabilityBody::Hello { .. } => {}
            CapabilityBody::DeckAdvertised { deck, title, slide_titles } => {
                let titles = (!slide_titles.is_empty()).then(|| slide_titles.clone());
                let count = slide_titles.len() as u32;
                let mut record = Deck::new(*deck, title.clone());
                if count > 0 {
                    record = record.with_slides(count, titles);
                }
                ctx.register_deck(record);
            }
            CapabilityBody::SlideChanged { address, deck_type, argb, zoom, scroll, overlay_of }
            | CapabilityBody::SlideStatus { address, deck_type, argb, zoom, scroll, overlay_of } => {
                let heartbeat = matches!(body, CapabilityBody::SlideStatus { .. });
                let nav = NavigationUpdate {
                    slide: address_key(address),
                    deck_kind: capability_deck_kind(*deck_type),
                    background: argb.map(Argb),
                    slide_size: *zoom,
                    scroll: ScrollParams { position: scroll.0, extent: scroll.1 },
                    association: overlay_of.as_ref().map(address_key),
                };
                self.navigate(nav, heartbeat, out);
            }
            CapabilityBody::Scrolled { address, offset, height } => {
                out.push(CanonicalEvent::ScrollUpdate {
                    slide: address_key(address),
                    scroll: ScrollParams { position: *offset, extent: *height },
                });
            }
            CapabilityBody::StrokeAdded { address, stroke_id, packet, argb, transparency } => {
                out.push(CanonicalEvent::StrokeAdd {
                    stroke_id: *stroke_id,
                    slide: address_key(address),
                    ink: InkPayload { data: packet.clone(), color: Argb(*argb), translucent: *transparency > 0 },
                });
            }
            CapabilityBody::StrokesRemoved { address, stroke_ids } => {
                let slide = address_key(address);
                out.extend(stroke_ids.iter().map(|id| CanonicalEvent::StrokeDelete {
                    stroke_id: *id,
                    slide: slide.clone(),
                }));
            }
            CapabilityBody::SlideCleared { address } => {
                out.push(CanonicalEvent::EraseLayer { slide: address_key(address) });
            }
            CapabilityBody::DeckCleared { deck } => {
                out.push(CanonicalEvent::EraseAllLayers { deck: *deck });
            }
            CapabilityBody::SlideBackground { address, argb } => {
                self.background(address_key(address), Argb(*argb), out);
            }
            CapabilityBody::Annotation { address, op } => {
                let slide = address_key(address);
                out.push(match op {
                    AnnotationOp::Text { id, text, x, y, size, argb } => {
                        CanonicalEvent::TextAnnotationAdd(TextAnnotation {
                            id: *id,
                            slide,
                            text: text.clone(),
                            origin: (*x, *y),
                            font_size: *size,
                            color: Argb(*argb),
                        })
                    }
                    AnnotationOp::Image { id, bytes, x, y, width, height } => {
                        CanonicalEvent::ImageAnnotationAdd(ImageAnnotation {
                            id: *id,
                            slide,
                            image: bytes.clone(),
                            origin: (*x, *y),
                            size: (*width, *height),
                        })
                    }
                    AnnotationOp::RemoveText { id } => CanonicalEvent::TextAnnotationDelete { id: *id, slide },
                    AnnotationOp::RemoveImage { id } => CanonicalEvent::ImageAnnotationDelete { id: *id, slide },
                });
            }
            CapabilityBody::PollResults { address, poll_id, choices, counts } => {
                out.push(CanonicalEvent::QuickPollUpdate(QuickPoll {
                    poll_id: *poll_id,
                    slide: address.as_ref().map(address_key),
                    choices: choices.clone(),
                    votes: counts.clone(),
                }));
            }
        }
    }
}

impl Translate for IndexTranslator {
    fn translate(&mut self, msg: &DecodedMessage, ctx: &mut DemuxContext, out: &mut Vec<CanonicalEvent>) {
        match msg {
            DecodedMessage::IndexNav(m) => self.translate_nav(m, ctx, out),
            DecodedMessage::IndexCapability(m) => self.translate_capability(&m.body, ctx, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{DemuxConfig, Demultiplexer};
    use crate::wire::{CapabilityMessage, WireFormat};
    use uuid::Uuid;

    fn demux() -> Demultiplexer {
        Demultiplexer::new(WireFormat::IndexNav, DemuxConfig::default())
    }

    fn nav_count(events: &[CanonicalEvent]) -> usize {
        events.iter().filter(|e| e.is_navigation()).count()
    }

    #[test]
    fn test_heartbeat_dedup() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        let mut events = Vec::new();
        for _ in 0..10 {
            let msg = IndexNavMessage::PageUpdate(NavPayload::slides(SlideRef::new(deck, 3)));
            events.extend(d.translate(&DecodedMessage::IndexNav(msg)));
        }
        assert_eq!(nav_count(&events), 1);

        let msg = IndexNavMessage::PageUpdate(NavPayload::slides(SlideRef::new(deck, 4)));
        assert_eq!(nav_count(&d.translate(&DecodedMessage::IndexNav(msg))), 1);
    }

    #[test]
    fn test_heartbeat_filter_disabled() {
        let deck = Uuid::new_v4();
        let mut d = Demultiplexer::new(WireFormat::IndexNav, DemuxConfig { filter_heartbeats: false });
        let mut events = Vec::new();
        for _ in 0..3 {
            let msg = IndexNavMessage::PageUpdate(NavPayload::slides(SlideRef::new(deck, 0)));
            events.extend(d.translate(&DecodedMessage::IndexNav(msg)));
        }
        assert_eq!(nav_count(&events), 3);
    }

    #[test]
    fn test_explicit_navigation_always_emits() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        let nav = IndexNavMessage::Navigate(NavPayload::slides(SlideRef::new(deck, 1)));
        assert_eq!(d.translate(&DecodedMessage::IndexNav(nav.clone())).len(), 1);
        assert_eq!(d.translate(&DecodedMessage::IndexNav(nav)).len(), 1);
    }

    #[test]
    fn test_wrapped_message_unwrapped() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        let msg = IndexNavMessage::Wrapped {
            sequence: 9,
            inner: Box::new(IndexNavMessage::EraseSlide { slide: SlideRef::new(deck, 2) }),
        };
        let events = d.translate(&DecodedMessage::IndexNav(msg));
        assert_eq!(events, vec![CanonicalEvent::EraseLayer { slide: SlideKey::indexed(deck, 2) }]);
    }

    #[test]
    fn test_background_for_current_page_reemits_navigation() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        d.translate(&DecodedMessage::IndexNav(IndexNavMessage::Navigate(NavPayload::slides(SlideRef::new(deck, 0)))));
        let events = d.translate(&DecodedMessage::IndexNav(IndexNavMessage::Background {
            slide: SlideRef::new(deck, 0),
            argb: 0xFF00_0000,
        }));
        match events.as_slice() {
            [CanonicalEvent::NavigationUpdate(nav)] => assert_eq!(nav.background, Some(Argb(0xFF00_0000))),
            other => panic!("expected one navigation, got {other:?}"),
        }
    }

    #[test]
    fn test_background_for_other_page_is_deferred() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        let events = d.translate(&DecodedMessage::IndexNav(IndexNavMessage::Background {
            slide: SlideRef::new(deck, 5),
            argb: 0xFF11_2233,
        }));
        assert!(events.is_empty());

        let events = d.translate(&DecodedMessage::IndexNav(IndexNavMessage::Navigate(NavPayload::slides(
            SlideRef::new(deck, 5),
        ))));
        match events.as_slice() {
            [CanonicalEvent::NavigationUpdate(nav)] => assert_eq!(nav.background, Some(Argb(0xFF11_2233))),
            other => panic!("expected one navigation, got {other:?}"),
        }
    }

    #[test]
    fn test_submission_association_carried() {
        let deck = Uuid::new_v4();
        let submissions = Uuid::new_v4();
        let mut payload = NavPayload::slides(SlideRef::new(submissions, 0));
        payload.deck_type = DeckType::Submission;
        payload.association = Some(SlideRef::new(deck, 7));
        let mut d = demux();
        let events = d.translate(&DecodedMessage::IndexNav(IndexNavMessage::Navigate(payload)));
        match events.as_slice() {
            [CanonicalEvent::NavigationUpdate(nav)] => {
                assert_eq!(nav.deck_kind, DeckKind::StudentSubmission);
                assert_eq!(nav.association, Some(SlideKey::indexed(deck, 7)));
            }
            other => panic!("expected one navigation, got {other:?}"),
        }
    }

    #[test]
    fn test_capability_batch_delete_and_heartbeat() {
        let deck = Uuid::new_v4();
        let mut d = Demultiplexer::new(WireFormat::IndexCapability, DemuxConfig::default());
        let address = SlideAddress { deck, slide: 1 };
        let status = CapabilityBody::SlideStatus {
            address,
            deck_type: deck_type::SLIDES,
            argb: None,
            zoom: 1.0,
            scroll: (0.0, 1.0),
            overlay_of: None,
        };
        let mut navs = 0;
        for seq in 0..5 {
            let msg = CapabilityMessage::new("presentation", seq, status.clone());
            navs += nav_count(&d.translate(&DecodedMessage::IndexCapability(msg)));
        }
        assert_eq!(navs, 1);

        let remove = CapabilityMessage::new(
            "ink",
            6,
            CapabilityBody::StrokesRemoved { address, stroke_ids: vec![Uuid::new_v4(), Uuid::new_v4()] },
        );
        let events = d.translate(&DecodedMessage::IndexCapability(remove));
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, CanonicalEvent::StrokeDelete { .. })));
    }

    #[test]
    fn test_deck_info_registers_deck() {
        let deck = Uuid::new_v4();
        let mut d = demux();
        d.translate(&DecodedMessage::IndexNav(IndexNavMessage::DeckInfo {
            deck,
            name: "Week 3".into(),
            slide_count: 20,
            titles: vec![],
        }));
        let record = d.decks().get(&deck).unwrap();
        assert_eq!(record.slide_count, Some(20));
        assert!(record.slide_titles.is_none());
    }
}
