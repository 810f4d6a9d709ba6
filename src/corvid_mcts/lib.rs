//! Parallel Monte-Carlo Tree Search over a chess position, driven by an
//! external batch predictor. The tree (`node`), the PUCT selection policy
//! (`puct`), and the worker-group coordination (`coordinator`, `worker`,
//! `driver`) are the three subsystems this crate covers; the chess rules
//! and the neural evaluator are external collaborators reached through the
//! `corvid_position::Position` and `corvid_predictor::Predictor` traits.

pub mod cache;
pub mod coordinator;
pub mod driver;
pub mod errors;
pub mod game;
pub mod node;
pub mod options;
pub mod puct;
pub mod self_play;
pub mod terminal;
pub mod time_control;
pub mod worker;

pub use driver::{search, SearchOutcome, SearchTree};
pub use errors::SearchError;
pub use options::Config;
pub use self_play::{play_self_play_game, SelfPlayRecord};
pub use time_control::TimeControl;
