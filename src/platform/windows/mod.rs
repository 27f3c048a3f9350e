pub(crate) mod com;
pub(crate) mod d3d11;
pub(crate) mod duplication;
pub(crate) mod gdi;
pub(crate) mod monitor;
pub(crate) mod readback;
pub(crate) mod wgc;
