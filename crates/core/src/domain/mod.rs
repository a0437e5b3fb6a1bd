pub mod message;
pub mod outlet;
pub mod product;
pub mod session;
pub mod slots;
pub mod tool;
pub mod turn;
