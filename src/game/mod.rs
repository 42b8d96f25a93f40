//! The symbolic safety game: arena, encoders, and solvers.

pub mod adjlist;
pub mod backprop;
pub mod encoder;
pub mod solve;

pub use backprop::BackpropGraph;
pub use solve::{
    mtdfa_restrict_as_game, mtdfa_restrict_as_game_winning, mtdfa_restrict_as_game_winning3,
    mtdfa_strategy_to_mealy, mtdfa_to_backprop, mtdfa_winning_region, mtdfa_winning_region_lazy,
    mtdfa_winning_region_lazy3, mtdfa_winning_strategy,
};
