//! Tile change notifications.
//!
//! Each [`Tile`](super::Tile) owns an explicit observer list. Observers are
//! added after `initialize` and dropped on `recycle`, so a pooled tile never
//! carries subscriptions from its previous position.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::coord::TileId;

/// Stable index of a pooled tile instance.
///
/// The slot survives recycling; the identity does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSlot(pub usize);

impl fmt::Display for TileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What changed on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEventKind {
    HeightChanged,
    RasterChanged,
    VectorChanged,
    /// Raised at most once between two recycles.
    ReadyForMeshGeneration,
}

/// Notification raised by a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEvent {
    pub slot: TileSlot,
    pub tile: TileId,
    pub kind: TileEventKind,
}

/// Receiver of tile notifications.
pub trait TileObserver: Send {
    fn on_tile_event(&mut self, event: &TileEvent);
}

impl<F> TileObserver for F
where
    F: FnMut(&TileEvent) + Send,
{
    fn on_tile_event(&mut self, event: &TileEvent) {
        self(event)
    }
}

impl TileObserver for UnboundedSender<TileEvent> {
    fn on_tile_event(&mut self, event: &TileEvent) {
        // A closed receiver only means nobody is listening any more
        let _ = self.send(*event);
    }
}

/// Ordered list of observers.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn TileObserver>>,
}

impl ObserverList {
    pub fn subscribe(&mut self, observer: Box<dyn TileObserver>) {
        self.observers.push(observer);
    }

    pub fn notify(&mut self, event: &TileEvent) {
        for observer in &mut self.observers {
            observer.on_tile_event(event);
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}
