//! # lectern-core — canonical presentation model
//!
//! Format-independent types shared by every consumer of a recorded
//! presentation stream:
//!
//! - [`event`]: `CanonicalEvent`, the closed vocabulary of semantic actions
//! - [`slide`]: `SlideKey` and the organization-node `AddressResolver`
//! - [`deck`]: guid-deduplicated `DeckRegistry`
//! - [`state`]: `PresentationState`, the "what is displayed" state machine
//! - [`time`]: tick-resolution `Timestamp` / `TickSpan`

pub mod deck;
pub mod event;
pub mod slide;
pub mod state;
pub mod time;

pub use deck::{Deck, DeckRegistry, Registration};
pub use event::{
    Argb, CanonicalEvent, DeckKind, ImageAnnotation, InkPayload, NavigationUpdate, QuickPoll,
    ScrollParams, TextAnnotation,
};
pub use slide::{AddressConflict, AddressResolver, Resolution, SlideKey, TocEntry};
pub use state::{Annotation, Applied, DisplaySnapshot, PresentationState, SlideInk, Stroke};
pub use time::{TickSpan, Timestamp, TICKS_PER_MILLI, TICKS_PER_SECOND};
