pub mod consensus;
pub mod participant;
pub mod signature;
pub mod vote_data;
