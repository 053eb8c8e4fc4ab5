pub mod callback;
pub mod event;
pub mod state;
