mod phase;

pub use phase::ElectionPhase;
