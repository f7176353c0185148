pub mod inspect;
pub mod migrate;
pub mod status;
pub mod sync;
