pub mod codec;
pub mod envelope;

pub use codec::{decode, encode};
