//! Presentation state machine.
//!
//! ```text
//!  CanonicalEvent ──► PresentationState::apply() ──► Applied
//!                            │
//!                            ├── current slide   (NavigationUpdate only)
//!                            ├── ink per slide   (opaque │ translucent)
//!                            ├── annotations per slide
//!                            ├── scroll cache per slide
//!                            └── quick polls
//! ```
//!
//! One instance per logical source per segment. Mutation happens in
//! event-arrival order through `&mut self`; there is no shared access.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::event::{
    Argb, CanonicalEvent, DeckKind, ImageAnnotation, InkPayload, NavigationUpdate, QuickPoll,
    ScrollParams, TextAnnotation,
};
use crate::slide::SlideKey;

/// One stroke as held by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: Uuid,
    pub ink: InkPayload,
}

/// Ink on one slide, split by rendering pass, draw order preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideInk {
    pub opaque: Vec<Stroke>,
    pub translucent: Vec<Stroke>,
}

impl SlideInk {
    pub fn contains(&self, id: &Uuid) -> bool {
        self.opaque.iter().chain(&self.translucent).any(|s| s.id == *id)
    }

    fn remove(&mut self, id: &Uuid) -> bool {
        let before = self.opaque.len() + self.translucent.len();
        self.opaque.retain(|s| s.id != *id);
        self.translucent.retain(|s| s.id != *id);
        before != self.opaque.len() + self.translucent.len()
    }

    pub fn len(&self) -> usize {
        self.opaque.len() + self.translucent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A text or image annotation placed on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Text(TextAnnotation),
    Image(ImageAnnotation),
}

impl Annotation {
    pub fn id(&self) -> Uuid {
        match self {
            Annotation::Text(t) => t.id,
            Annotation::Image(i) => i.id,
        }
    }
}

/// Effect of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// Valid event with nothing to do (e.g. deleting an absent stroke).
    NoOp,
    /// Stroke id already present on the slide; the first stroke was kept.
    DuplicateStroke,
}

/// Everything a renderer needs to draw the current display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    pub slide: Option<SlideKey>,
    pub deck_kind: DeckKind,
    /// Slide whose image forms the background (the association for overlays).
    pub background_slide: Option<SlideKey>,
    pub background_color: Argb,
    pub slide_size: f32,
    pub scroll: ScrollParams,
    pub opaque_ink: Vec<InkPayload>,
    pub translucent_ink: Vec<InkPayload>,
    pub annotations: Vec<Annotation>,
    pub poll: Option<QuickPoll>,
}

/// What is displayed right now.
#[derive(Debug, Clone, Default)]
pub struct PresentationState {
    current: Option<NavigationUpdate>,
    background_color: Argb,
    slide_size: f32,
    ink: HashMap<SlideKey, SlideInk>,
    annotations: HashMap<SlideKey, Vec<Annotation>>,
    scroll: HashMap<SlideKey, ScrollParams>,
    polls: HashMap<Uuid, QuickPoll>,
}

impl PresentationState {
    pub fn new() -> Self {
        Self { slide_size: 1.0, ..Self::default() }
    }

    pub fn apply(&mut self, event: &CanonicalEvent) -> Applied {
        match event {
            CanonicalEvent::NavigationUpdate(nav) => {
                if let Some(bg) = nav.background {
                    self.background_color = bg;
                }
                self.slide_size = nav.slide_size;
                self.scroll.insert(nav.slide.clone(), nav.scroll);
                if self.current.as_ref() == Some(nav) {
                    return Applied::NoOp;
                }
                self.current = Some(nav.clone());
                Applied::Changed
            }
            CanonicalEvent::StrokeAdd { stroke_id, slide, ink } => {
                let layer = self.ink.entry(slide.clone()).or_default();
                if layer.contains(stroke_id) {
                    return Applied::DuplicateStroke;
                }
                let stroke = Stroke { id: *stroke_id, ink: ink.clone() };
                if ink.translucent {
                    layer.translucent.push(stroke);
                } else {
                    layer.opaque.push(stroke);
                }
                Applied::Changed
            }
            CanonicalEvent::StrokeDelete { stroke_id, slide } => {
                let removed = self.ink.get_mut(slide).is_some_and(|layer| layer.remove(stroke_id));
                if removed {
                    Applied::Changed
                } else {
                    Applied::NoOp
                }
            }
            CanonicalEvent::EraseLayer { slide } => match self.ink.remove(slide) {
                Some(layer) if !layer.is_empty() => Applied::Changed,
                _ => Applied::NoOp,
            },
            CanonicalEvent::EraseAllLayers { deck } => {
                let before = self.ink.len();
                self.ink.retain(|key, layer| key.deck() != Some(*deck) || layer.is_empty());
                if before == self.ink.len() {
                    Applied::NoOp
                } else {
                    Applied::Changed
                }
            }
            CanonicalEvent::TextAnnotationAdd(text) => {
                self.upsert_annotation(&text.slide, Annotation::Text(text.clone()))
            }
            CanonicalEvent::ImageAnnotationAdd(image) => {
                self.upsert_annotation(&image.slide, Annotation::Image(image.clone()))
            }
            CanonicalEvent::TextAnnotationDelete { id, slide }
            | CanonicalEvent::ImageAnnotationDelete { id, slide } => {
                self.remove_annotation(slide, id)
            }
            CanonicalEvent::QuickPollUpdate(poll) => {
                if self.polls.get(&poll.poll_id) == Some(poll) {
                    return Applied::NoOp;
                }
                self.polls.insert(poll.poll_id, poll.clone());
                Applied::Changed
            }
            CanonicalEvent::ScrollUpdate { slide, scroll } => {
                if self.scroll.get(slide) == Some(scroll) {
                    return Applied::NoOp;
                }
                self.scroll.insert(slide.clone(), *scroll);
                if let Some(nav) = self.current.as_mut().filter(|n| n.slide == *slide) {
                    nav.scroll = *scroll;
                }
                Applied::Changed
            }
        }
    }

    fn upsert_annotation(&mut self, slide: &SlideKey, annotation: Annotation) -> Applied {
        let list = self.annotations.entry(slide.clone()).or_default();
        match list.iter_mut().find(|a| a.id() == annotation.id()) {
            Some(existing) if *existing == annotation => Applied::NoOp,
            Some(existing) => {
                *existing = annotation;
                Applied::Changed
            }
            None => {
                list.push(annotation);
                Applied::Changed
            }
        }
    }

    fn remove_annotation(&mut self, slide: &SlideKey, id: &Uuid) -> Applied {
        let Some(list) = self.annotations.get_mut(slide) else {
            return Applied::NoOp;
        };
        let before = list.len();
        list.retain(|a| a.id() != *id);
        if list.len() == before {
            Applied::NoOp
        } else {
            Applied::Changed
        }
    }

    pub fn current_slide(&self) -> Option<&SlideKey> {
        self.current.as_ref().map(|n| &n.slide)
    }

    pub fn current_navigation(&self) -> Option<&NavigationUpdate> {
        self.current.as_ref()
    }

    pub fn background_color(&self) -> Argb {
        self.background_color
    }

    pub fn slide_size(&self) -> f32 {
        self.slide_size
    }

    pub fn ink(&self, slide: &SlideKey) -> Option<&SlideInk> {
        self.ink.get(slide)
    }

    pub fn annotations(&self, slide: &SlideKey) -> &[Annotation] {
        self.annotations.get(slide).map_or(&[], Vec::as_slice)
    }

    pub fn scroll(&self, slide: &SlideKey) -> ScrollParams {
        self.scroll.get(slide).copied().unwrap_or_default()
    }

    pub fn poll(&self, id: &Uuid) -> Option<&QuickPoll> {
        self.polls.get(id)
    }

    /// Build the render description of the current display.
    pub fn snapshot(&self) -> DisplaySnapshot {
        let Some(nav) = &self.current else {
            return DisplaySnapshot {
                slide: None,
                deck_kind: DeckKind::Presentation,
                background_slide: None,
                background_color: self.background_color,
                slide_size: self.slide_size,
                scroll: ScrollParams::default(),
                opaque_ink: Vec::new(),
                translucent_ink: Vec::new(),
                annotations: Vec::new(),
                poll: None,
            };
        };
        let slide = &nav.slide;
        let ink = self.ink.get(slide);
        let collect = |strokes: Option<&Vec<Stroke>>| -> Vec<InkPayload> {
            strokes.map(|s| s.iter().map(|s| s.ink.clone()).collect()).unwrap_or_default()
        };
        let poll = if nav.deck_kind == DeckKind::QuickPoll {
            let target = nav.association.as_ref().unwrap_or(slide);
            self.polls.values().find(|p| p.slide.as_ref() == Some(target)).cloned()
        } else {
            None
        };
        DisplaySnapshot {
            slide: Some(slide.clone()),
            deck_kind: nav.deck_kind,
            background_slide: Some(nav.association.clone().unwrap_or_else(|| slide.clone())),
            background_color: self.background_color,
            slide_size: self.slide_size,
            scroll: self.scroll(slide),
            opaque_ink: collect(ink.map(|i| &i.opaque)),
            translucent_ink: collect(ink.map(|i| &i.translucent)),
            annotations: self.annotations(slide).to_vec(),
            poll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink(translucent: bool) -> InkPayload {
        InkPayload { data: vec![1, 2, 3], color: Argb(0xFF00_00FF), translucent }
    }

    fn nav(slide: SlideKey) -> CanonicalEvent {
        CanonicalEvent::NavigationUpdate(NavigationUpdate::to(slide))
    }

    #[test]
    fn test_only_navigation_moves_current_slide() {
        let deck = Uuid::new_v4();
        let s1 = SlideKey::indexed(deck, 1);
        let s2 = SlideKey::indexed(deck, 2);
        let mut state = PresentationState::new();

        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: s2.clone(), ink: ink(false) });
        assert_eq!(state.current_slide(), None);

        state.apply(&nav(s1.clone()));
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: s2.clone(), ink: ink(false) });
        assert_eq!(state.current_slide(), Some(&s1));
        assert_eq!(state.ink(&s2).unwrap().len(), 2);
    }

    #[test]
    fn test_repeated_navigation_is_noop() {
        let s = SlideKey::indexed(Uuid::new_v4(), 0);
        let mut state = PresentationState::new();
        assert_eq!(state.apply(&nav(s.clone())), Applied::Changed);
        assert_eq!(state.apply(&nav(s)), Applied::NoOp);
    }

    #[test]
    fn test_ink_layers_separated() {
        let s = SlideKey::indexed(Uuid::new_v4(), 0);
        let mut state = PresentationState::new();
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: s.clone(), ink: ink(false) });
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: s.clone(), ink: ink(true) });
        let layer = state.ink(&s).unwrap();
        assert_eq!(layer.opaque.len(), 1);
        assert_eq!(layer.translucent.len(), 1);
    }

    #[test]
    fn test_duplicate_stroke_keeps_first() {
        let s = SlideKey::indexed(Uuid::new_v4(), 0);
        let id = Uuid::new_v4();
        let mut state = PresentationState::new();
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: id, slide: s.clone(), ink: ink(false) });
        let second = CanonicalEvent::StrokeAdd { stroke_id: id, slide: s.clone(), ink: ink(true) };
        assert_eq!(state.apply(&second), Applied::DuplicateStroke);
        assert_eq!(state.ink(&s).unwrap().opaque.len(), 1);
        assert!(state.ink(&s).unwrap().translucent.is_empty());
    }

    #[test]
    fn test_delete_and_erase() {
        let deck = Uuid::new_v4();
        let s0 = SlideKey::indexed(deck, 0);
        let s1 = SlideKey::indexed(deck, 1);
        let other = SlideKey::indexed(Uuid::new_v4(), 0);
        let id = Uuid::new_v4();
        let mut state = PresentationState::new();
        for slide in [&s0, &s1, &other] {
            state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: slide.clone(), ink: ink(false) });
        }
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: id, slide: s0.clone(), ink: ink(false) });

        let del = CanonicalEvent::StrokeDelete { stroke_id: id, slide: s0.clone() };
        assert_eq!(state.apply(&del), Applied::Changed);
        assert_eq!(state.apply(&del), Applied::NoOp);
        assert_eq!(state.ink(&s0).unwrap().len(), 1);

        let elsewhere = CanonicalEvent::StrokeDelete { stroke_id: id, slide: SlideKey::indexed(deck, 9) };
        assert_eq!(state.apply(&elsewhere), Applied::NoOp);

        assert_eq!(state.apply(&CanonicalEvent::EraseLayer { slide: s1.clone() }), Applied::Changed);
        assert!(state.ink(&s1).is_none());

        assert_eq!(state.apply(&CanonicalEvent::EraseAllLayers { deck }), Applied::Changed);
        assert!(state.ink(&s0).is_none());
        assert_eq!(state.ink(&other).unwrap().len(), 1);
    }

    #[test]
    fn test_annotation_upsert_and_delete() {
        let s = SlideKey::indexed(Uuid::new_v4(), 0);
        let id = Uuid::new_v4();
        let mut text = TextAnnotation {
            id,
            slide: s.clone(),
            text: "hello".into(),
            origin: (10.0, 10.0),
            font_size: 12.0,
            color: Argb::WHITE,
        };
        let mut state = PresentationState::new();
        state.apply(&CanonicalEvent::TextAnnotationAdd(text.clone()));
        text.text = "edited".into();
        assert_eq!(state.apply(&CanonicalEvent::TextAnnotationAdd(text.clone())), Applied::Changed);
        assert_eq!(state.annotations(&s).len(), 1);

        state.apply(&CanonicalEvent::TextAnnotationDelete { id, slide: s.clone() });
        assert!(state.annotations(&s).is_empty());
    }

    #[test]
    fn test_snapshot_uses_association_background() {
        let deck = Uuid::new_v4();
        let base = SlideKey::indexed(deck, 4);
        let submission = SlideKey::indexed(Uuid::new_v4(), 0);
        let mut state = PresentationState::new();
        state.apply(&CanonicalEvent::NavigationUpdate(NavigationUpdate {
            deck_kind: DeckKind::StudentSubmission,
            association: Some(base.clone()),
            background: Some(Argb(0xFF10_2030)),
            ..NavigationUpdate::to(submission.clone())
        }));
        state.apply(&CanonicalEvent::StrokeAdd { stroke_id: Uuid::new_v4(), slide: submission.clone(), ink: ink(true) });

        let snap = state.snapshot();
        assert_eq!(snap.slide, Some(submission));
        assert_eq!(snap.background_slide, Some(base));
        assert_eq!(snap.background_color, Argb(0xFF10_2030));
        assert_eq!(snap.translucent_ink.len(), 1);
    }

    #[test]
    fn test_scroll_update_follows_current_slide() {
        let s = SlideKey::indexed(Uuid::new_v4(), 0);
        let mut state = PresentationState::new();
        state.apply(&nav(s.clone()));
        let scroll = ScrollParams { position: 0.5, extent: 2.0 };
        state.apply(&CanonicalEvent::ScrollUpdate { slide: s.clone(), scroll });
        assert_eq!(state.scroll(&s), scroll);
        assert_eq!(state.current_navigation().unwrap().scroll, scroll);
        assert_eq!(state.snapshot().scroll, scroll);
    }
}
