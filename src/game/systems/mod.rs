pub mod physics;
pub mod collision;
pub mod asteroid;
pub mod projectile;
pub mod laser;
pub mod mine;
pub mod homing;
pub mod joust;
pub mod turret;
pub mod powerup;
pub mod ai;
pub mod lifecycle;
