//! Audio handoff subsystem

pub mod buffer;
pub mod packet;

pub use buffer::{create_shared_queue, HandoffQueue, SharedHandoffQueue};
pub use packet::FramePacket;
