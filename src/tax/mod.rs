//! Tax arithmetic

pub mod gst;
