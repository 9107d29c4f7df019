pub mod info;
pub mod liftover;
pub mod lookup;
pub mod maintenance;
pub mod sources;
pub mod update;
