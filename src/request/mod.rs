mod descriptor;
mod key;

pub use descriptor::RequestDescriptor;
pub use key::RequestKey;
