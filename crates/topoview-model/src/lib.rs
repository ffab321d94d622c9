/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Portable wire model for topoview.
//!
//! Holds the node, metadata and delta types shared between the engine and
//! anything that produces or records topology updates. No runtime, no
//! logging; just data and its decoding rules.

pub mod delta;
pub mod metadata;
pub mod node;

pub use delta::{
    DecodedDelta, Delta, DeltaDecodeError, DeltaNode, DeltaSection, MalformedEntry, TopologyDelta,
};
pub use metadata::Metadata;
pub use node::{ControlDescriptor, Node};

/// Node identifier, unique within one topology.
pub type NodeId = String;

/// Name of a topology view (`containers`, `hosts`, `processes`...).
pub type TopologyId = String;
