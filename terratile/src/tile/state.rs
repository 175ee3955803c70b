//! Per-channel data state.

use std::fmt;

/// One independently fetched data stream of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataChannel {
    /// Imagery draped over the terrain
    Raster,
    /// Terrain-RGB encoded elevation
    Height,
    /// Vector features (attached as-is)
    Vector,
}

impl DataChannel {
    pub const ALL: [DataChannel; 3] = [
        DataChannel::Raster,
        DataChannel::Height,
        DataChannel::Vector,
    ];

    /// Dense index for per-channel arrays.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        match self {
            DataChannel::Raster => 0,
            DataChannel::Height => 1,
            DataChannel::Vector => 2,
        }
    }

    /// File extension used by on-disk sources.
    pub fn extension(&self) -> &'static str {
        match self {
            DataChannel::Raster | DataChannel::Height => "png",
            DataChannel::Vector => "pbf",
        }
    }
}

impl fmt::Display for DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataChannel::Raster => "raster",
            DataChannel::Height => "height",
            DataChannel::Vector => "vector",
        };
        f.write_str(name)
    }
}

/// Loading state of a single channel.
///
/// `Unset → Fetching → Processing → {Finished | Error}`, with `Cancelled`
/// reachable from the two in-flight states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    #[default]
    Unset,
    Fetching,
    Processing,
    Finished,
    Error,
    Cancelled,
}

impl ChannelState {
    /// Data for this channel is still on its way.
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ChannelState::Fetching | ChannelState::Processing)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Unset => "unset",
            ChannelState::Fetching => "fetching",
            ChannelState::Processing => "processing",
            ChannelState::Finished => "finished",
            ChannelState::Error => "error",
            ChannelState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// States of all three channels of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStates([ChannelState; 3]);

impl ChannelStates {
    #[inline]
    pub fn get(&self, channel: DataChannel) -> ChannelState {
        self.0[channel.index()]
    }

    #[inline]
    pub(crate) fn set(&mut self, channel: DataChannel, state: ChannelState) {
        self.0[channel.index()] = state;
    }

    pub fn raster(&self) -> ChannelState {
        self.get(DataChannel::Raster)
    }

    pub fn height(&self) -> ChannelState {
        self.get(DataChannel::Height)
    }

    pub fn vector(&self) -> ChannelState {
        self.get(DataChannel::Vector)
    }

    /// Neither raster nor height is still loading.
    ///
    /// The vector channel is deliberately not part of this check.
    pub fn mesh_inputs_settled(&self) -> bool {
        !self.raster().is_in_flight() && !self.height().is_in_flight()
    }
}

/// Set of channels to request for each tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    pub raster: bool,
    pub height: bool,
    pub vector: bool,
}

impl ChannelSet {
    pub fn all() -> Self {
        Self {
            raster: true,
            height: true,
            vector: true,
        }
    }

    pub fn contains(&self, channel: DataChannel) -> bool {
        match channel {
            DataChannel::Raster => self.raster,
            DataChannel::Height => self.height,
            DataChannel::Vector => self.vector,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = DataChannel> + '_ {
        DataChannel::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::all()
    }
}
