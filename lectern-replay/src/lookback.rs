//! Initial-state buffer for segment lookback.
//!
//! Events decoded from frames before the segment start only seed the
//! display state. They are collected here and reduced to the minimum
//! set that reproduces the state at `start`:
//!
//! ```text
//!   buffered (arrival order)            emitted prefix
//!  ┌─────────────────────────────┐     ┌──────────────────────┐
//!  │ nav A  ink+1  text#7  nav B │     │ ink+1  text#7' nav B │
//!  │ text#7' ink-9  poll#2 ...   │ ──► │ poll#2'              │
//!  └─────────────────────────────┘     └──────────────────────┘
//!   latest nav only, latest text record per id, deletes need a
//!   buffered add, latest poll result per poll
//! ```
//!
//! Surviving events keep their relative arrival order.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use lectern_core::{CanonicalEvent, DeckKind, NavigationUpdate};

#[derive(Debug, Default)]
pub struct LookbackBuffer {
    events: Vec<CanonicalEvent>,
}

impl LookbackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CanonicalEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = CanonicalEvent>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Reduce the buffer to the prefix emitted at segment start.
    pub fn finish(self) -> Vec<CanonicalEvent> {
        let events = self.events;

        let mut last_nav = None;
        let mut last_text: HashMap<Uuid, usize> = HashMap::new();
        let mut last_poll: HashMap<Uuid, usize> = HashMap::new();
        let mut added: HashSet<Uuid> = HashSet::new();
        let mut orphan = vec![false; events.len()];

        for (i, event) in events.iter().enumerate() {
            match event {
                CanonicalEvent::NavigationUpdate(_) => last_nav = Some(i),
                CanonicalEvent::TextAnnotationAdd(t) => {
                    last_text.insert(t.id, i);
                }
                CanonicalEvent::TextAnnotationDelete { id, .. } => {
                    last_text.insert(*id, i);
                }
                CanonicalEvent::QuickPollUpdate(p) => {
                    last_poll.insert(p.poll_id, i);
                }
                CanonicalEvent::StrokeAdd { stroke_id, .. } => {
                    added.insert(*stroke_id);
                }
                CanonicalEvent::StrokeDelete { stroke_id, .. } => {
                    orphan[i] = !added.contains(stroke_id);
                }
                _ => {}
            }
        }

        let mut kept: Vec<CanonicalEvent> = Vec::with_capacity(events.len());
        for (i, event) in events.into_iter().enumerate() {
            let keep = match &event {
                CanonicalEvent::NavigationUpdate(_) => last_nav == Some(i),
                CanonicalEvent::TextAnnotationAdd(t) => last_text.get(&t.id) == Some(&i),
                // A surviving delete means nothing to show for that id.
                CanonicalEvent::TextAnnotationDelete { .. } => false,
                CanonicalEvent::QuickPollUpdate(p) => last_poll.get(&p.poll_id) == Some(&i),
                CanonicalEvent::StrokeDelete { .. } => !orphan[i],
                _ => true,
            };
            if keep {
                kept.push(event);
            }
        }

        if last_nav.is_none() {
            if let Some(slide) = kept.iter().rev().find_map(|e| e.slide()).cloned() {
                log::debug!("Lookback carries no navigation; synthesizing one to {slide}");
                let mut nav = NavigationUpdate::to(slide);
                if nav.slide.is_synthetic() {
                    nav.deck_kind = DeckKind::Whiteboard;
                }
                kept.insert(0, CanonicalEvent::NavigationUpdate(nav));
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{Argb, InkPayload, QuickPoll, SlideKey, TextAnnotation};

    fn slide(i: u32) -> SlideKey {
        SlideKey::indexed(Uuid::nil(), i)
    }

    fn nav(i: u32) -> CanonicalEvent {
        CanonicalEvent::NavigationUpdate(NavigationUpdate::to(slide(i)))
    }

    fn add(id: Uuid, s: u32) -> CanonicalEvent {
        CanonicalEvent::StrokeAdd {
            stroke_id: id,
            slide: slide(s),
            ink: InkPayload { data: vec![1], color: Argb(0), translucent: false },
        }
    }

    fn text(id: Uuid, s: &str) -> CanonicalEvent {
        CanonicalEvent::TextAnnotationAdd(TextAnnotation {
            id,
            slide: slide(0),
            text: s.into(),
            origin: (0.0, 0.0),
            font_size: 12.0,
            color: Argb(0),
        })
    }

    #[test]
    fn test_only_latest_navigation_kept() {
        let mut buf = LookbackBuffer::new();
        buf.extend([nav(1), nav(2), nav(3)]);
        assert_eq!(buf.finish(), vec![nav(3)]);
    }

    #[test]
    fn test_orphan_stroke_delete_dropped() {
        let kept = Uuid::new_v4();
        let orphan = Uuid::new_v4();
        let mut buf = LookbackBuffer::new();
        buf.push(nav(0));
        buf.push(CanonicalEvent::StrokeDelete { stroke_id: orphan, slide: slide(0) });
        buf.push(add(kept, 0));
        buf.push(CanonicalEvent::StrokeDelete { stroke_id: kept, slide: slide(0) });
        let out = buf.finish();
        assert_eq!(out.len(), 3);
        assert!(!out.iter().any(|e| matches!(e,
            CanonicalEvent::StrokeDelete { stroke_id, .. } if *stroke_id == orphan)));
    }

    #[test]
    fn test_text_keeps_latest_record() {
        let edited = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let mut buf = LookbackBuffer::new();
        buf.extend([
            nav(0),
            text(edited, "draft"),
            text(removed, "gone"),
            text(edited, "final"),
            CanonicalEvent::TextAnnotationDelete { id: removed, slide: slide(0) },
        ]);
        assert_eq!(buf.finish(), vec![nav(0), text(edited, "final")]);
    }

    #[test]
    fn test_poll_keeps_latest_tally() {
        let id = Uuid::new_v4();
        let poll = |votes: Vec<u32>| {
            CanonicalEvent::QuickPollUpdate(QuickPoll {
                poll_id: id,
                slide: None,
                choices: vec!["A".into(), "B".into()],
                votes,
            })
        };
        let mut buf = LookbackBuffer::new();
        buf.extend([poll(vec![1, 0]), poll(vec![3, 2])]);
        assert_eq!(buf.finish(), vec![poll(vec![3, 2])]);
    }

    #[test]
    fn test_synthetic_navigation_when_missing() {
        let mut buf = LookbackBuffer::new();
        buf.extend([add(Uuid::new_v4(), 2), add(Uuid::new_v4(), 5)]);
        let out = buf.finish();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], nav(5));
    }

    #[test]
    fn test_empty_buffer_empty_prefix() {
        assert!(LookbackBuffer::new().finish().is_empty());
    }
}
