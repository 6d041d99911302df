pub mod carrier;
pub mod load;
pub mod negotiation;
