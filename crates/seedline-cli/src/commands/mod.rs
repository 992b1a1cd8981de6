pub mod collision_check;
pub mod frontier;
pub mod gate_check;
pub mod lookup;
pub mod merge;
pub mod tiling_check;
pub mod verify;
