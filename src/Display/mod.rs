pub mod accept;
pub mod collaborators;

pub use accept::Acceptor;
pub use collaborators::{Canvas, CutView, NoCut, Surfaces};
